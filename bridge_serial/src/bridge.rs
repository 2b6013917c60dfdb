//! Serial polling loop.
//!
//! The servo controller announces readiness by sending any bytes. Each
//! non-empty read is answered with the servo values for the next detection
//! label.
//!
//! ```text
//! read port ──► 0 bytes / error ──► Idle
//!     │
//!     ▼
//! shutdown requested? ──► Shutdown
//!     │
//!     ▼
//! next label ──► ServoMapping::reply_for ──► write port ──► Replied
//! ```

use bridge_common::errors::{Error, ResultExt};
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::mapping::ServoMapping;

/// Pause taken after each failed (non-timeout) read.
pub const DEFAULT_READ_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// While reads keep failing, only every this-many-th failure is logged.
const READ_ERROR_LOG_EVERY: u32 = 50;

/// Producer of detection labels, blocking until one is available.
pub trait LabelSource {
    /// Next label.
    ///
    /// # Errors
    /// Returns an error when the source can no longer produce labels.
    fn next_label(&mut self) -> Result<String, Error>;
}

/// Result of a single [`Bridge::step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Nothing read from the port.
    Idle,
    /// Shutdown was requested; the loop should stop.
    Shutdown,
    /// A reply line was written to the port.
    Replied(String),
}

/// Counters kept by the loop.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BridgeStats {
    /// Non-empty reads from the port.
    pub reads: u64,
    /// Failed reads, excluding timeouts.
    pub read_errors: u64,
    /// Reply lines written.
    pub replies: u64,
}

/// Serial port, label source and mapping driven by one loop.
pub struct Bridge<P, S> {
    port: P,
    source: S,
    mapping: ServoMapping,
    running: Arc<AtomicBool>,
    read_buf: Vec<u8>,
    stats: BridgeStats,
    read_error_backoff: Duration,
    consecutive_read_errors: u32,
}

impl<P: Read + Write, S: LabelSource> Bridge<P, S> {
    /// Create a bridge reading at most `read_buffer_size` bytes per poll.
    pub fn new(port: P, source: S, mapping: ServoMapping, read_buffer_size: usize) -> Self {
        Self {
            port,
            source,
            mapping,
            running: Arc::new(AtomicBool::new(true)),
            read_buf: vec![0; read_buffer_size.max(1)],
            stats: BridgeStats::default(),
            read_error_backoff: DEFAULT_READ_ERROR_BACKOFF,
            consecutive_read_errors: 0,
        }
    }

    /// Override the pause taken after a failed read.
    pub fn with_read_error_backoff(mut self, backoff: Duration) -> Self {
        self.read_error_backoff = backoff;
        self
    }

    /// Flag cleared to request shutdown, e.g. from a signal handler.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Loop counters.
    pub fn stats(&self) -> BridgeStats {
        self.stats
    }

    /// Poll the port once and answer it if it asked for data.
    ///
    /// # Errors
    /// Returns an error if the label source fails or the reply cannot be
    /// written. Read failures are logged and reported as [`StepOutcome::Idle`].
    pub fn step(&mut self) -> Result<StepOutcome, Error> {
        let read = match self.port.read(&mut self.read_buf) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                self.consecutive_read_errors = 0;
                return Ok(StepOutcome::Idle);
            }
            Err(e) => {
                self.stats.read_errors += 1;
                self.consecutive_read_errors += 1;
                let failures = self.consecutive_read_errors;
                if failures == 1 || failures % READ_ERROR_LOG_EVERY == 0 {
                    warn!(consecutive = failures, "failed on reading serial: {e}");
                }
                thread::sleep(self.read_error_backoff);
                return Ok(StepOutcome::Idle);
            }
        };
        self.consecutive_read_errors = 0;
        if read == 0 {
            return Ok(StepOutcome::Idle);
        }
        self.stats.reads += 1;

        if !self.running.load(Ordering::SeqCst) {
            return Ok(StepOutcome::Shutdown);
        }

        debug!("Waiting for message");
        let label = self
            .source
            .next_label()
            .wrap_err("failed on receiving message from redis")?;

        let reply = self.mapping.reply_for(&label);
        self.port
            .write_all(reply.as_bytes())
            .wrap_err("failed on writing to serial")?;
        self.port.flush().wrap_err("failed on flushing serial")?;

        self.stats.replies += 1;
        info!(label = %label, "Sent servo values: {}", reply.trim_end());
        Ok(StepOutcome::Replied(reply))
    }

    /// Poll until shutdown is requested or a step fails.
    ///
    /// # Errors
    /// Propagates the first error returned by [`Bridge::step`].
    pub fn run(&mut self) -> Result<(), Error> {
        info!("Bridge loop started");

        while self.running.load(Ordering::SeqCst) {
            if self.step()? == StepOutcome::Shutdown {
                break;
            }
        }

        info!(
            reads = self.stats.reads,
            read_errors = self.stats.read_errors,
            replies = self.stats.replies,
            "Bridge loop stopped"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_common::errors::{self, NOT_FOUND};
    use std::collections::{HashMap, VecDeque};

    /// Port returning scripted reads and recording writes.
    struct FakePort {
        reads: VecDeque<io::Result<Vec<u8>>>,
        written: Vec<u8>,
        fail_writes: bool,
    }

    impl FakePort {
        fn new(reads: Vec<io::Result<Vec<u8>>>) -> Self {
            Self {
                reads: reads.into(),
                written: Vec::new(),
                fail_writes: false,
            }
        }
    }

    impl Read for FakePort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.pop_front() {
                Some(Ok(bytes)) => {
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    Ok(n)
                }
                Some(Err(e)) => Err(e),
                None => Err(io::Error::new(io::ErrorKind::TimedOut, "timed out")),
            }
        }
    }

    impl Write for FakePort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail_writes {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "port gone"));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Labels(VecDeque<Result<String, Error>>);

    impl LabelSource for Labels {
        fn next_label(&mut self) -> Result<String, Error> {
            match self.0.pop_front() {
                Some(label) => label,
                None => Err(Error::wrap(&NOT_FOUND, "no more labels")),
            }
        }
    }

    fn labels(items: &[&str]) -> Labels {
        Labels(items.iter().map(|s| Ok(s.to_string())).collect())
    }

    fn mapping() -> ServoMapping {
        ServoMapping::new(
            HashMap::from([("cat".to_string(), "fist".to_string())]),
            HashMap::from([
                ("fiveFinger".to_string(), vec![0, 0, 0, 0, 0]),
                ("fist".to_string(), vec![180, 180, 180, 180, 180]),
            ]),
            "fiveFinger",
        )
    }

    #[test]
    fn test_empty_read_is_idle() {
        let port = FakePort::new(vec![Ok(Vec::new())]);
        let mut bridge = Bridge::new(port, labels(&["cat"]), mapping(), 16);
        assert_eq!(bridge.step().unwrap(), StepOutcome::Idle);
        assert_eq!(bridge.stats(), BridgeStats::default());
        assert!(bridge.port.written.is_empty());
    }

    #[test]
    fn test_ready_byte_gets_reply() {
        let port = FakePort::new(vec![Ok(b"r".to_vec())]);
        let mut bridge = Bridge::new(port, labels(&["cat"]), mapping(), 16);
        assert_eq!(
            bridge.step().unwrap(),
            StepOutcome::Replied("180 180 180 180 180 \n".to_string())
        );
        assert_eq!(bridge.port.written, b"180 180 180 180 180 \n");
        assert_eq!(bridge.stats().replies, 1);
    }

    #[test]
    fn test_read_error_is_logged_and_skipped() {
        let port = FakePort::new(vec![
            Err(io::Error::other("framing error")),
            Ok(b"r".to_vec()),
        ]);
        let mut bridge = Bridge::new(port, labels(&["toaster"]), mapping(), 16);
        assert_eq!(bridge.step().unwrap(), StepOutcome::Idle);
        assert_eq!(bridge.stats().read_errors, 1);
        assert_eq!(
            bridge.step().unwrap(),
            StepOutcome::Replied("0 0 0 0 0 \n".to_string())
        );
    }

    #[test]
    fn test_repeated_read_errors_back_off() {
        let port = FakePort::new(vec![
            Err(io::Error::other("device unplugged")),
            Err(io::Error::other("device unplugged")),
            Err(io::Error::other("device unplugged")),
            Ok(Vec::new()),
        ]);
        let backoff = Duration::from_millis(20);
        let mut bridge =
            Bridge::new(port, labels(&[]), mapping(), 16).with_read_error_backoff(backoff);

        let started = std::time::Instant::now();
        for _ in 0..3 {
            assert_eq!(bridge.step().unwrap(), StepOutcome::Idle);
        }
        assert!(started.elapsed() >= backoff * 3);
        assert_eq!(bridge.consecutive_read_errors, 3);
        assert_eq!(bridge.stats().read_errors, 3);

        assert_eq!(bridge.step().unwrap(), StepOutcome::Idle);
        assert_eq!(bridge.consecutive_read_errors, 0);
    }

    #[test]
    fn test_shutdown_checked_after_read() {
        let port = FakePort::new(vec![Ok(b"r".to_vec())]);
        let mut bridge = Bridge::new(port, labels(&["cat"]), mapping(), 16);
        bridge.running_flag().store(false, Ordering::SeqCst);
        assert_eq!(bridge.step().unwrap(), StepOutcome::Shutdown);
        assert!(bridge.port.written.is_empty());
    }

    #[test]
    fn test_source_failure_is_annotated() {
        let port = FakePort::new(vec![Ok(b"r".to_vec())]);
        let mut bridge = Bridge::new(port, labels(&[]), mapping(), 16);
        let err = bridge.step().unwrap_err();
        assert!(errors::is(&err, &NOT_FOUND));
        assert_eq!(
            err.chain_message(),
            "not found -- no more labels -- failed on receiving message from redis"
        );
    }

    #[test]
    fn test_write_failure_stops_run() {
        let mut port = FakePort::new(vec![Ok(b"r".to_vec())]);
        port.fail_writes = true;
        let mut bridge = Bridge::new(port, labels(&["cat"]), mapping(), 16);
        let err = bridge.run().unwrap_err();
        assert_eq!(err.to_string(), "failed on writing to serial");
        assert_eq!(err.chain_message(), "port gone -- failed on writing to serial");
    }

    #[test]
    fn test_run_answers_every_request_until_source_ends() {
        let port = FakePort::new(vec![
            Ok(b"r".to_vec()),
            Ok(Vec::new()),
            Ok(b"r".to_vec()),
            Ok(b"r".to_vec()),
        ]);
        let mut bridge = Bridge::new(port, labels(&["cat", "dog"]), mapping(), 16);
        let err = bridge.run().unwrap_err();
        assert!(errors::is(&err, &NOT_FOUND));
        assert_eq!(
            String::from_utf8(bridge.port.written.clone()).unwrap(),
            "180 180 180 180 180 \n0 0 0 0 0 \n"
        );
        assert_eq!(
            bridge.stats(),
            BridgeStats {
                reads: 3,
                read_errors: 0,
                replies: 2
            }
        );
    }
}
