//! Pure classification of a reading against a profile's ranges.

use crate::profile::ToleranceRange;
use crate::types::RangeId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult<'a> {
    pub range: RangeId,
    pub label: &'a str,
    /// `|center - value|`; smaller means a better fit.
    pub distance: f64,
}

/// Every range containing `value`, closest center first.
///
/// Bounds are inclusive. Equal distances keep profile order. Non-finite values
/// match nothing.
pub fn classify(value: f64, ranges: &[ToleranceRange]) -> Vec<MatchResult<'_>> {
    if !value.is_finite() {
        return Vec::new();
    }
    let mut fits: Vec<MatchResult<'_>> = ranges
        .iter()
        .enumerate()
        .filter(|(_, r)| r.contains(value))
        .map(|(i, r)| MatchResult {
            range: RangeId(i),
            label: r.label.as_str(),
            distance: (r.center() - value).abs(),
        })
        .collect();
    // stable: ties stay in profile order
    fits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    fits
}
