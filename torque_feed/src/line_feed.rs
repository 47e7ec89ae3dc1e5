//! Threaded line reader turning any `BufRead` into a `SensorFeed`.
//!
//! A reader thread owns the source and pushes raw lines into a channel; the
//! consumer polls with a timeout. End of input or a read error closes the
//! channel, which the consumer sees as a disconnect.
use crossbeam_channel as xch;
use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use torque_traits::{FeedFault, SensorFeed};

use crate::decode::parse_torque_value;

enum LineEvent {
    Line(String),
    Failed(String),
}

pub struct LineFeed {
    rx: xch::Receiver<LineEvent>,
    cancelled: Arc<AtomicBool>,
    /// Set when the reader reported an error instead of a clean EOF.
    failure: Option<String>,
}

impl LineFeed {
    /// Spawns the reader thread. `name` is only used for logging.
    ///
    /// The thread is detached: it may be parked in a blocking read that cannot
    /// be interrupted, and exits on its next line, EOF, or read error once
    /// cancelled.
    pub fn spawn<R: BufRead + Send + 'static>(name: &str, mut source: R) -> Self {
        let (tx, rx) = xch::unbounded();
        let cancelled = Arc::new(AtomicBool::new(false));
        let cancelled_clone = cancelled.clone();
        let name = name.to_string();

        std::thread::spawn(move || {
            let mut buf = String::new();
            loop {
                if cancelled_clone.load(Ordering::Relaxed) {
                    tracing::debug!(feed = %name, "line reader cancelled");
                    break;
                }
                // `buf` keeps a partial line across read timeouts.
                match source.read_line(&mut buf) {
                    Ok(0) => {
                        if !buf.is_empty() {
                            let _ = tx.send(LineEvent::Line(std::mem::take(&mut buf)));
                        }
                        tracing::debug!(feed = %name, "line reader reached end of input");
                        break;
                    }
                    Ok(_) => {
                        if tx.send(LineEvent::Line(std::mem::take(&mut buf))).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                    // serial ports configured with a read timeout report it this way
                    Err(e)
                        if matches!(
                            e.kind(),
                            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
                        ) => {}
                    Err(e) => {
                        tracing::warn!(feed = %name, error = %e, "line reader failed");
                        let _ = tx.send(LineEvent::Failed(e.to_string()));
                        break;
                    }
                }
            }
            tracing::trace!(feed = %name, "line reader exiting");
        });

        Self {
            rx,
            cancelled,
            failure: None,
        }
    }
}

impl SensorFeed for LineFeed {
    fn poll_value(&mut self, timeout: Duration) -> Result<Option<f64>, FeedFault> {
        if let Some(reason) = &self.failure {
            return Err(FeedFault::Disconnected(reason.clone()));
        }
        match self.rx.recv_timeout(timeout) {
            Ok(LineEvent::Line(line)) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    return Ok(None);
                }
                match parse_torque_value(trimmed) {
                    Some(v) => Ok(Some(v)),
                    None => Err(FeedFault::Undecodable(trimmed.to_string())),
                }
            }
            Ok(LineEvent::Failed(reason)) => {
                self.failure = Some(reason.clone());
                Err(FeedFault::Disconnected(reason))
            }
            Err(xch::RecvTimeoutError::Timeout) => Ok(None),
            Err(xch::RecvTimeoutError::Disconnected) => {
                Err(FeedFault::Disconnected("end of input".to_string()))
            }
        }
    }

    fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}
