//! # Servo Bridge Binary
//!
//! Subscribes to object-detection labels on Redis and answers each
//! readiness poll from the servo controller with the mapped servo values.
//!
//! # Usage
//!
//! ```bash
//! bridge_serial --config config.toml
//!
//! # Verbose logging, JSON output
//! bridge_serial --config config.toml -v --json
//! ```

#![deny(warnings)]

use bridge_common::errors::{Error, ResultExt, report_error};
use bridge_serial::pubsub::{self, RedisSubscriber};
use bridge_serial::{Bridge, BridgeConfig, ServoMapping, serial};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

/// Redis object-detection to serial servo bridge
#[derive(Parser, Debug)]
#[command(name = "bridge_serial")]
#[command(version)]
#[command(about = "Drives servos over serial from Redis detection labels")]
#[command(long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();

    let config = BridgeConfig::load_validated(&args.config);
    let level = match &config {
        _ if args.verbose => Level::DEBUG,
        Ok(config) => config.shared.log_level.into(),
        Err(_) => Level::INFO,
    };
    setup_tracing(level, args.json);

    let result = match config {
        Ok(config) => run(config),
        Err(e) => Err(Error::wrap(
            e,
            format!("failed on loading {}", args.config.display()),
        )),
    };

    if let Err(e) = result {
        report_error(&e);
        std::process::exit(1);
    }
}

fn run(config: BridgeConfig) -> Result<(), Error> {
    info!(
        "Servo bridge v{} starting ({})",
        env!("CARGO_PKG_VERSION"),
        config.shared.service_name
    );

    let mapping = ServoMapping::load(&config.mapping).wrap_err("failed on loading mapping")?;

    let conn = pubsub::connect_with_retry(&config.redis.dsn, config.redis.max_retry)?;
    let subscriber = RedisSubscriber::spawn(conn, &config.redis.channel)?;
    let port = serial::open_port(&config.serial)?;

    let mut bridge = Bridge::new(port, subscriber, mapping, config.serial.read_buffer_size);

    let running = bridge.running_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })
    .wrap_err("failed on installing signal handler")?;

    bridge.run()?;

    info!("Servo bridge shutdown complete");
    Ok(())
}

/// Setup tracing subscriber; `RUST_LOG` directives are added on top of `level`.
fn setup_tracing(level: Level, json: bool) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
