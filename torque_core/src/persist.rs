//! Downstream persistence seam. Implementations live outside the engine.

use std::error::Error;
use std::time::{Duration, SystemTime};

use crate::summary::SummaryRow;
use crate::types::{RangeId, SessionId};

/// One accepted sample, as handed to persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    pub session: SessionId,
    pub range: RangeId,
    pub label: String,
    pub value: f64,
    /// Arrival order within the session.
    pub seq: u64,
    /// Reading arrival relative to session start, on the controller's clock.
    pub elapsed: Duration,
    pub recorded_at: SystemTime,
}

/// Called only from the forwarding thread, never while bank state is locked.
pub trait Persistence: Send + Sync {
    fn record_sample(&self, record: &SampleRecord) -> Result<(), Box<dyn Error + Send + Sync>>;

    fn record_summary(
        &self,
        session: SessionId,
        profile: &str,
        rows: &[SummaryRow],
    ) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPersistence;

impl Persistence for NullPersistence {
    fn record_sample(&self, _record: &SampleRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }

    fn record_summary(
        &self,
        _session: SessionId,
        _profile: &str,
        _rows: &[SummaryRow],
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}
