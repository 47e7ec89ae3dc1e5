pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

use std::time::{Duration, Instant};

/// One decoded sensor observation, stamped by the consumer at arrival.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub value: f64,
    /// Total order of arrival within a session; ties on `at` never reorder readings.
    pub seq: u64,
    pub at: Instant,
}

/// Why a feed poll produced no value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedFault {
    /// A line/frame arrived but carried no usable number. Not fatal.
    Undecodable(String),
    /// The transport is gone; no further readings will arrive.
    Disconnected(String),
}

impl std::fmt::Display for FeedFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedFault::Undecodable(raw) => write!(f, "undecodable reading: {raw:?}"),
            FeedFault::Disconnected(reason) => write!(f, "feed disconnected: {reason}"),
        }
    }
}

impl std::error::Error for FeedFault {}

/// A source of decoded torque readings.
///
/// Consumers poll with a short timeout so that a stop signal is observed promptly;
/// `poll_value` must return within roughly `timeout`.
pub trait SensorFeed {
    /// Wait up to `timeout` for the next value. `Ok(None)` means nothing arrived yet.
    fn poll_value(&mut self, timeout: Duration) -> Result<Option<f64>, FeedFault>;

    /// Stop handle: ask the transport to cease delivering readings.
    fn cancel(&mut self) {}
}

impl<F: SensorFeed + ?Sized> SensorFeed for Box<F> {
    fn poll_value(&mut self, timeout: Duration) -> Result<Option<f64>, FeedFault> {
        (**self).poll_value(timeout)
    }

    fn cancel(&mut self) {
        (**self).cancel();
    }
}

/// Opens decoded feeds by connection id (port path, "-" for stdin, ...).
pub trait FeedConnector {
    fn open(
        &self,
        connection: &str,
        baud: u32,
    ) -> Result<Box<dyn SensorFeed + Send>, Box<dyn std::error::Error + Send + Sync>>;
}
