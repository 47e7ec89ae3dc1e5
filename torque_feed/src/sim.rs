use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};
use torque_traits::{FeedFault, SensorFeed};

/// Simulated meter cycling through applied torques with small deterministic jitter.
///
/// Every `outlier_every`-th reading is pushed 20% above its target so that
/// discards show up in a run.
pub struct SimulatedFeed {
    targets: Vec<f64>,
    rng: StdRng,
    idx: usize,
    jitter: f64,
    interval: Duration,
    outlier_every: usize,
    next_due: Option<Instant>,
}

impl SimulatedFeed {
    pub fn new(targets: Vec<f64>, seed: u64) -> Self {
        Self {
            targets,
            rng: StdRng::seed_from_u64(seed),
            idx: 0,
            jitter: 0.02,
            interval: Duration::from_millis(50),
            outlier_every: 7,
            next_due: None,
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Fractional jitter around each target; keep it below the profile tolerance.
    #[must_use]
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    fn next_value(&mut self) -> Option<f64> {
        let target = *self.targets.get(self.idx % self.targets.len().max(1))?;
        self.idx += 1;
        if self.outlier_every > 0 && self.idx % self.outlier_every == 0 {
            return Some((target * 1.2 * 10.0).round() / 10.0);
        }
        let jitter = self.jitter.abs();
        let offset = self.rng.gen_range(-jitter..=jitter);
        Some((target * (1.0 + offset) * 10.0).round() / 10.0)
    }
}

impl SensorFeed for SimulatedFeed {
    fn poll_value(&mut self, timeout: Duration) -> Result<Option<f64>, FeedFault> {
        let now = Instant::now();
        let due = *self.next_due.get_or_insert(now);
        if now < due {
            let wait = due - now;
            std::thread::sleep(wait.min(timeout));
            if wait > timeout {
                return Ok(None);
            }
        }
        self.next_due = Some(due + self.interval);
        match self.next_value() {
            Some(v) => Ok(Some(v)),
            None => Err(FeedFault::Disconnected("no targets to simulate".to_string())),
        }
    }
}
