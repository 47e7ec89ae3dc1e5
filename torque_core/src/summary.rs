//! Tabular projection of a bank onto its profile.

use std::sync::Arc;

use crate::bank::{BankSnapshot, SampleBank};
use crate::profile::ToleranceProfile;
use crate::status::StopReason;
use crate::types::{RangeId, SessionId};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleSlot {
    Value(f64),
    Absent,
}

impl SampleSlot {
    pub fn value(self) -> Option<f64> {
        match self {
            SampleSlot::Value(v) => Some(v),
            SampleSlot::Absent => None,
        }
    }
}

/// One row per range; `samples` always has exactly `capacity` slots.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub range: RangeId,
    pub target: f64,
    pub low: f64,
    pub high: f64,
    pub label: String,
    pub samples: Vec<SampleSlot>,
    pub samples_so_far: usize,
}

impl SummaryRow {
    pub fn is_complete(&self) -> bool {
        self.samples_so_far == self.samples.len()
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().filter_map(|s| s.value())
    }
}

pub fn project(profile: &ToleranceProfile, bank: &SampleBank) -> Vec<SummaryRow> {
    project_snapshot(profile, &bank.snapshot())
}

pub fn project_snapshot(profile: &ToleranceProfile, snapshot: &BankSnapshot) -> Vec<SummaryRow> {
    let capacity = snapshot.capacity();
    profile
        .range_ids()
        .zip(profile.ranges.iter())
        .map(|(id, r)| {
            let bucket = snapshot.bucket(id);
            let mut samples: Vec<SampleSlot> = bucket
                .iter()
                .take(capacity)
                .map(|v| SampleSlot::Value(*v))
                .collect();
            let samples_so_far = samples.len();
            samples.resize(capacity, SampleSlot::Absent);
            SummaryRow {
                range: id,
                target: r.target,
                low: r.low,
                high: r.high,
                label: r.label.clone(),
                samples,
                samples_so_far,
            }
        })
        .collect()
}

/// Finalized outcome of one session.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub session: SessionId,
    pub profile: String,
    pub unit: String,
    pub rows: Vec<SummaryRow>,
    /// Every range collected its full quota.
    pub passed: bool,
    pub reason: StopReason,
}

impl Summary {
    pub fn new(
        session: SessionId,
        profile: &ToleranceProfile,
        rows: Vec<SummaryRow>,
        reason: StopReason,
    ) -> Self {
        let passed = !rows.is_empty() && rows.iter().all(SummaryRow::is_complete);
        Self {
            session,
            profile: profile.display_name(),
            unit: profile.unit.clone(),
            rows,
            passed,
            reason,
        }
    }

    pub fn accepted_total(&self) -> usize {
        self.rows.iter().map(|r| r.samples_so_far).sum()
    }
}

/// Cloneable read-only view of a running session, for live displays.
#[derive(Debug, Clone)]
pub struct SummaryHandle {
    profile: Arc<ToleranceProfile>,
    bank: Arc<SampleBank>,
}

impl SummaryHandle {
    pub(crate) fn new(profile: Arc<ToleranceProfile>, bank: Arc<SampleBank>) -> Self {
        Self { profile, bank }
    }

    pub fn profile(&self) -> &ToleranceProfile {
        &self.profile
    }

    pub fn project(&self) -> Vec<SummaryRow> {
        project(&self.profile, &self.bank)
    }

    /// Every range has its full quota; the operator may stop.
    pub fn is_complete(&self) -> bool {
        self.bank.is_complete()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ToolKind;

    fn profile() -> ToleranceProfile {
        ToleranceProfile::from_targets(75.0, ToolKind::Wrench, "ft/lbs", &[70.0, 50.0], 0.04)
    }

    #[test]
    fn pads_with_absent_and_counts() {
        let p = profile();
        let bank = SampleBank::new(2, 3);
        assert!(bank.try_accept(RangeId(0), 70.1));
        let rows = project(&p, &bank);
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0].samples,
            vec![SampleSlot::Value(70.1), SampleSlot::Absent, SampleSlot::Absent]
        );
        assert_eq!(rows[0].samples_so_far, 1);
        assert_eq!(rows[1].samples_so_far, 0);
        assert!(!rows[0].is_complete());
    }

    #[test]
    fn passed_only_when_all_rows_full() {
        let p = profile();
        let bank = SampleBank::new(2, 1);
        bank.try_accept(RangeId(0), 70.0);
        let partial = Summary::new(SessionId(1), &p, project(&p, &bank), StopReason::Operator);
        assert!(!partial.passed);
        bank.try_accept(RangeId(1), 50.0);
        let full = Summary::new(SessionId(1), &p, project(&p, &bank), StopReason::Operator);
        assert!(full.passed);
        assert_eq!(full.accepted_total(), 2);
        assert_eq!(full.profile, "75 ft/lbs - Wrench");
    }
}
