//! Tolerance ranges, profiles and the in-memory profile catalog.

use crate::error::SessionError;
use crate::types::RangeId;

pub use torque_config::ToolKind;

/// A closed interval `[low, high]` around an applied torque.
#[derive(Debug, Clone, PartialEq)]
pub struct ToleranceRange {
    pub target: f64,
    pub low: f64,
    pub high: f64,
    /// Operator-facing label, e.g. `"67.2 - 72.8"`.
    pub label: String,
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

impl ToleranceRange {
    pub fn new(target: f64, low: f64, high: f64) -> Self {
        Self {
            target,
            low,
            high,
            label: format!("{low:.1} - {high:.1}"),
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Derive `target * (1 ± tolerance)`, bounds rounded to one decimal.
    pub fn from_target(target: f64, tolerance: f64) -> Self {
        Self::new(
            target,
            round1(target * (1.0 - tolerance)),
            round1(target * (1.0 + tolerance)),
        )
    }

    #[inline]
    pub fn center(&self) -> f64 {
        (self.low + self.high) / 2.0
    }

    /// Inclusive at both ends. NaN is contained nowhere.
    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        self.low <= value && value <= self.high
    }
}

/// A named set of ranges for one tool rating.
#[derive(Debug, Clone, PartialEq)]
pub struct ToleranceProfile {
    pub max_rating: f64,
    pub kind: ToolKind,
    pub unit: String,
    pub ranges: Vec<ToleranceRange>,
}

impl ToleranceProfile {
    pub fn new(
        max_rating: f64,
        kind: ToolKind,
        unit: impl Into<String>,
        ranges: Vec<ToleranceRange>,
    ) -> Self {
        Self {
            max_rating,
            kind,
            unit: unit.into(),
            ranges,
        }
    }

    pub fn from_targets(
        max_rating: f64,
        kind: ToolKind,
        unit: impl Into<String>,
        targets: &[f64],
        tolerance: f64,
    ) -> Self {
        let ranges = targets
            .iter()
            .map(|t| ToleranceRange::from_target(*t, tolerance))
            .collect();
        Self::new(max_rating, kind, unit, ranges)
    }

    /// Profile built from the suggested applied torques for this rating and kind.
    pub fn suggested(max_rating: f64, kind: ToolKind, unit: impl Into<String>, tolerance: f64) -> Self {
        let targets = torque_config::suggest_targets(max_rating, kind);
        Self::from_targets(max_rating, kind, unit, &targets, tolerance)
    }

    /// `"75 ft/lbs - Wrench"`
    pub fn display_name(&self) -> String {
        format!("{} {} - {}", self.max_rating, self.unit, self.kind)
    }

    pub fn range(&self, id: RangeId) -> Option<&ToleranceRange> {
        self.ranges.get(id.index())
    }

    pub fn range_ids(&self) -> impl Iterator<Item = RangeId> + '_ {
        (0..self.ranges.len()).map(RangeId)
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if self.ranges.is_empty() {
            return Err(SessionError::InvalidProfile(format!(
                "{} has no tolerance ranges",
                self.display_name()
            )));
        }
        if !(self.max_rating.is_finite() && self.max_rating > 0.0) {
            return Err(SessionError::InvalidProfile(format!(
                "max rating must be > 0, got {}",
                self.max_rating
            )));
        }
        for (i, r) in self.ranges.iter().enumerate() {
            if !(r.low.is_finite() && r.high.is_finite()) || r.low > r.high {
                return Err(SessionError::InvalidProfile(format!(
                    "range {} ({}) must satisfy low <= high",
                    i + 1,
                    r.label
                )));
            }
        }
        Ok(())
    }
}

/// Ordered, editable list of profiles available to the operator.
#[derive(Debug, Clone, Default)]
pub struct ProfileCatalog {
    profiles: Vec<ToleranceProfile>,
}

impl ProfileCatalog {
    pub fn new(profiles: Vec<ToleranceProfile>) -> Self {
        Self { profiles }
    }

    pub fn list(&self) -> &[ToleranceProfile] {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&ToleranceProfile> {
        self.profiles.get(idx)
    }

    /// Appends a validated profile and returns its index.
    pub fn insert(&mut self, profile: ToleranceProfile) -> Result<usize, SessionError> {
        profile.validate()?;
        self.profiles.push(profile);
        Ok(self.profiles.len() - 1)
    }

    pub fn update(&mut self, idx: usize, profile: ToleranceProfile) -> Result<(), SessionError> {
        profile.validate()?;
        let slot = self
            .profiles
            .get_mut(idx)
            .ok_or_else(|| SessionError::InvalidProfile(format!("no profile at index {idx}")))?;
        *slot = profile;
        Ok(())
    }

    pub fn remove(&mut self, idx: usize) -> Option<ToleranceProfile> {
        (idx < self.profiles.len()).then(|| self.profiles.remove(idx))
    }

    /// Distinct tool kinds, in first-seen order.
    pub fn kinds(&self) -> Vec<ToolKind> {
        let mut out = Vec::new();
        for p in &self.profiles {
            if !out.contains(&p.kind) {
                out.push(p.kind);
            }
        }
        out
    }

    /// Distinct units, in first-seen order.
    pub fn units(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for p in &self.profiles {
            if !out.contains(&p.unit.as_str()) {
                out.push(p.unit.as_str());
            }
        }
        out
    }
}
