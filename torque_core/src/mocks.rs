//! Test and helper mocks for torque_core

use crossbeam_channel as xch;
use std::collections::VecDeque;
use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use torque_traits::{FeedFault, SensorFeed};

use crate::persist::{Persistence, SampleRecord};
use crate::summary::SummaryRow;
use crate::types::SessionId;

/// One scripted feed event.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedStep {
    Value(f64),
    Garbage(String),
    Pause(Duration),
    Disconnect(String),
}

/// Replays a fixed script, then either disconnects or idles until cancelled.
#[derive(Debug)]
pub struct ScriptedFeed {
    steps: VecDeque<FeedStep>,
    hold_open: bool,
    cancelled: Arc<AtomicBool>,
}

impl ScriptedFeed {
    pub fn new(steps: impl IntoIterator<Item = FeedStep>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            hold_open: false,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn values(values: &[f64]) -> Self {
        Self::new(values.iter().copied().map(FeedStep::Value))
    }

    /// After the script, report no data instead of disconnecting.
    #[must_use]
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    /// Observes whether the consumer invoked `cancel`.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }
}

impl SensorFeed for ScriptedFeed {
    fn poll_value(&mut self, timeout: Duration) -> Result<Option<f64>, FeedFault> {
        match self.steps.pop_front() {
            Some(FeedStep::Value(v)) => Ok(Some(v)),
            Some(FeedStep::Garbage(raw)) => Err(FeedFault::Undecodable(raw)),
            Some(FeedStep::Disconnect(why)) => Err(FeedFault::Disconnected(why)),
            Some(FeedStep::Pause(d)) => {
                std::thread::sleep(d.min(timeout));
                if d > timeout {
                    self.steps.push_front(FeedStep::Pause(d - timeout));
                }
                Ok(None)
            }
            None if self.hold_open => {
                std::thread::sleep(timeout);
                Ok(None)
            }
            None => Err(FeedFault::Disconnected("script exhausted".to_string())),
        }
    }

    fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

/// Feed driven from another thread through a channel; dropping the sender disconnects.
#[derive(Debug)]
pub struct ChannelFeed {
    rx: xch::Receiver<FeedStep>,
}

impl ChannelFeed {
    pub fn pair() -> (xch::Sender<FeedStep>, Self) {
        let (tx, rx) = xch::unbounded();
        (tx, Self { rx })
    }
}

impl SensorFeed for ChannelFeed {
    fn poll_value(&mut self, timeout: Duration) -> Result<Option<f64>, FeedFault> {
        match self.rx.recv_timeout(timeout) {
            Ok(FeedStep::Value(v)) => Ok(Some(v)),
            Ok(FeedStep::Garbage(raw)) => Err(FeedFault::Undecodable(raw)),
            Ok(FeedStep::Disconnect(why)) => Err(FeedFault::Disconnected(why)),
            Ok(FeedStep::Pause(_)) | Err(xch::RecvTimeoutError::Timeout) => Ok(None),
            Err(xch::RecvTimeoutError::Disconnected) => {
                Err(FeedFault::Disconnected("sender dropped".to_string()))
            }
        }
    }
}

/// Everything persistence was handed, in order.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    samples: Mutex<Vec<SampleRecord>>,
    summaries: Mutex<Vec<(SessionId, String, Vec<SummaryRow>)>>,
    /// Per-write delay, to exercise a slow sink.
    delay: Option<Duration>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn samples(&self) -> Vec<SampleRecord> {
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn summaries(&self) -> Vec<(SessionId, String, Vec<SummaryRow>)> {
        self.summaries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Persistence for MemoryPersistence {
    fn record_sample(&self, record: &SampleRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
        if let Some(d) = self.delay {
            std::thread::sleep(d);
        }
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }

    fn record_summary(
        &self,
        session: SessionId,
        profile: &str,
        rows: &[SummaryRow],
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.summaries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((session, profile.to_string(), rows.to_vec()));
        Ok(())
    }
}

/// Rejects every write.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingPersistence;

impl Persistence for FailingPersistence {
    fn record_sample(&self, _record: &SampleRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
        Err(Box::new(std::io::Error::other("disk full")))
    }

    fn record_summary(
        &self,
        _session: SessionId,
        _profile: &str,
        _rows: &[SummaryRow],
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        Err(Box::new(std::io::Error::other("disk full")))
    }
}
