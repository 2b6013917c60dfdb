//! Redis connection and detection-channel subscriber.

use bridge_common::errors::{Error, ResultExt};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::bridge::LabelSource;

/// Run `attempt` up to `max_retry` times, sleeping 1s, 2s, 3s, ... between
/// failures.
///
/// # Errors
/// Returns the last attempt's error, annotated, once every attempt failed.
pub fn retry_with_backoff<T>(
    max_retry: u32,
    mut sleep: impl FnMut(Duration),
    mut attempt: impl FnMut(u32) -> Result<T, Error>,
) -> Result<T, Error> {
    let mut last_err = None;

    for n in 1..=max_retry {
        match attempt(n) {
            Ok(value) => return Ok(value),
            Err(err) => {
                if n < max_retry {
                    let delay = u64::from(n);
                    warn!(
                        error = %err.chain_message(),
                        "failed on creating connection on redis, retrying in {delay} second"
                    );
                    sleep(Duration::from_secs(delay));
                }
                last_err = Some(err);
            }
        }
    }

    match last_err {
        Some(err) => Err(Error::wrap(err, "failed on creating connection on redis")),
        None => Err(Error::msg("failed on creating connection on redis")),
    }
}

/// Open a Redis connection and confirm it with `PING`, retrying on failure.
///
/// # Errors
/// Returns an error if the DSN is malformed or no attempt succeeds.
pub fn connect_with_retry(dsn: &str, max_retry: u32) -> Result<redis::Connection, Error> {
    let client = redis::Client::open(dsn).wrap_err("failed on parsing redis dsn")?;

    let conn = retry_with_backoff(max_retry, thread::sleep, |attempt| {
        debug!("Connecting to redis (attempt {attempt}/{max_retry})");
        let mut conn = client
            .get_connection()
            .wrap_err("failed on opening redis connection")?;
        redis::cmd("PING")
            .query::<String>(&mut conn)
            .wrap_err("failed on pinging redis")?;
        Ok(conn)
    })?;

    info!("Connected to redis");
    Ok(conn)
}

/// Labels published on a Redis channel.
///
/// The subscription lives on its own thread; payloads arrive over a channel
/// so the bridge loop never holds the pub/sub borrow.
pub struct RedisSubscriber {
    channel: String,
    messages: Receiver<Result<String, Error>>,
}

impl RedisSubscriber {
    /// Subscribe `conn` to `channel` and start forwarding payloads.
    ///
    /// # Errors
    /// Returns an error if the reader thread cannot start or `SUBSCRIBE` fails.
    pub fn spawn(mut conn: redis::Connection, channel: &str) -> Result<Self, Error> {
        let (tx, messages) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let name = channel.to_string();

        thread::Builder::new()
            .name("redis-subscriber".to_string())
            .spawn(move || {
                let mut pubsub = conn.as_pubsub();
                // `spawn` waits on `ready_rx` until one of these arrives.
                if let Err(err) = pubsub.subscribe(name.as_str()) {
                    ready_tx
                        .send(Err(Error::wrap(err, format!("failed on subscribing to '{name}'"))))
                        .ok();
                    return;
                }
                ready_tx.send(Ok(())).ok();

                loop {
                    let received = pubsub
                        .get_message()
                        .wrap_err("failed on reading redis pubsub message")
                        .and_then(|msg| {
                            msg.get_payload::<String>()
                                .wrap_err("failed on decoding redis payload")
                        });
                    let stop = received.is_err();
                    if tx.send(received).is_err() || stop {
                        break;
                    }
                }
            })
            .wrap_err("failed on spawning redis subscriber")?;

        ready_rx
            .recv()
            .wrap_err("redis subscriber exited before subscribing")??;

        info!("Subscribed to redis channel '{channel}'");
        Ok(Self {
            channel: channel.to_string(),
            messages,
        })
    }

    /// Subscribed channel name.
    pub fn channel(&self) -> &str {
        &self.channel
    }
}

impl LabelSource for RedisSubscriber {
    fn next_label(&mut self) -> Result<String, Error> {
        self.messages
            .recv()
            .wrap_err_with(|| format!("subscriber for '{}' stopped", self.channel))?
    }
}
