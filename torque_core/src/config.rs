//! Runtime configuration for the session engine.
//!
//! Separate from the TOML-deserialized config in `torque_config`.

use std::time::Duration;

/// Bucket sizing. Range derivation happens when profiles are built.
#[derive(Debug, Clone)]
pub struct SessionCfg {
    /// Samples kept per range. Default: 5.
    pub capacity_per_range: usize,
}

impl Default for SessionCfg {
    fn default() -> Self {
        Self {
            capacity_per_range: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedCfg {
    /// Upper bound on a single feed poll; also bounds how long a stop can wait
    /// for the worker to observe the cutover.
    pub poll_ms: u64,
}

impl Default for FeedCfg {
    fn default() -> Self {
        Self { poll_ms: 10 }
    }
}

impl FeedCfg {
    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms.max(1))
    }
}

/// Persistence queue policy.
#[derive(Debug, Clone)]
pub struct ForwardCfg {
    /// `None` = unbounded. When bounded, a full queue waits up to
    /// `enqueue_timeout` and then drops the oldest pending event.
    pub queue_capacity: Option<usize>,
    pub enqueue_timeout: Duration,
}

impl Default for ForwardCfg {
    fn default() -> Self {
        Self {
            queue_capacity: None,
            enqueue_timeout: Duration::from_millis(5),
        }
    }
}
