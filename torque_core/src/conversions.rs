//! `From` implementations bridging `torque_config` types to `torque_core` types.

use std::time::Duration;

use crate::config::{FeedCfg, ForwardCfg, SessionCfg};
use crate::profile::{ProfileCatalog, ToleranceProfile, ToleranceRange};

// ── SessionCfg ───────────────────────────────────────────────────────────────

impl From<&torque_config::SessionCfg> for SessionCfg {
    fn from(c: &torque_config::SessionCfg) -> Self {
        Self {
            capacity_per_range: c.capacity_per_range,
        }
    }
}

// ── FeedCfg ──────────────────────────────────────────────────────────────────

impl From<&torque_config::FeedCfg> for FeedCfg {
    fn from(c: &torque_config::FeedCfg) -> Self {
        Self { poll_ms: c.poll_ms }
    }
}

// ── ForwardCfg ───────────────────────────────────────────────────────────────

impl From<&torque_config::ForwardingCfg> for ForwardCfg {
    fn from(c: &torque_config::ForwardingCfg) -> Self {
        Self {
            queue_capacity: (c.queue_capacity > 0).then_some(c.queue_capacity),
            enqueue_timeout: Duration::from_millis(c.enqueue_timeout_ms),
        }
    }
}

// ── Profiles ─────────────────────────────────────────────────────────────────

impl From<&torque_config::RangeCfg> for ToleranceRange {
    fn from(c: &torque_config::RangeCfg) -> Self {
        let range = ToleranceRange::new(c.target, c.low, c.high);
        match &c.label {
            Some(label) => range.with_label(label.clone()),
            None => range,
        }
    }
}

impl ToleranceProfile {
    /// Explicit ranges win; otherwise ranges are derived from targets with `tolerance`.
    pub fn from_cfg(c: &torque_config::ProfileCfg, tolerance: f64) -> Self {
        if c.ranges.is_empty() {
            Self::from_targets(c.max_rating, c.kind, c.unit.clone(), &c.targets, tolerance)
        } else {
            Self::new(
                c.max_rating,
                c.kind,
                c.unit.clone(),
                c.ranges.iter().map(ToleranceRange::from).collect(),
            )
        }
    }
}

impl ProfileCatalog {
    pub fn from_config(cfg: &torque_config::Config) -> crate::error::Result<Self> {
        let mut catalog = Self::default();
        for p in cfg.profiles_or_default() {
            catalog
                .insert(ToleranceProfile::from_cfg(&p, cfg.session.tolerance))
                .map_err(eyre::Report::new)?;
        }
        Ok(catalog)
    }
}
