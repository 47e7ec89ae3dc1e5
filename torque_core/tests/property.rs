use proptest::prelude::*;
use torque_core::{
    RangeId, SampleBank, ToleranceProfile, ToleranceRange, ToolKind, classify, project,
};

prop_compose! {
    fn range_strategy()(low in 0.0f64..500.0, width in 0.0f64..50.0) -> ToleranceRange {
        ToleranceRange::new(low + width / 2.0, low, low + width)
    }
}

proptest! {
    #[test]
    fn classify_returns_only_containing_ranges_sorted(
        ranges in prop::collection::vec(range_strategy(), 1..8),
        value in -10.0f64..600.0,
    ) {
        let fits = classify(value, &ranges);
        for m in &fits {
            let r = &ranges[m.range.index()];
            prop_assert!(r.low <= value && value <= r.high);
        }
        let expected = ranges.iter().filter(|r| r.contains(value)).count();
        prop_assert_eq!(fits.len(), expected);
        prop_assert!(fits.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn buckets_never_exceed_capacity(
        capacity in 1usize..8,
        values in prop::collection::vec(60.0f64..80.0, 0..64),
    ) {
        let profile = ToleranceProfile::from_targets(75.0, ToolKind::Wrench, "ft/lbs", &[70.0, 66.0], 0.04);
        let bank = SampleBank::new(profile.ranges.len(), capacity);
        let mut accepted = 0usize;
        for v in &values {
            // Overlapping ranges: a reading may land in both.
            accepted += classify(*v, &profile.ranges)
                .iter()
                .filter(|m| bank.try_accept(m.range, *v))
                .count();
        }
        let rows = project(&profile, &bank);
        for row in &rows {
            prop_assert!(row.samples_so_far <= capacity);
            prop_assert_eq!(row.samples.len(), capacity);
        }
        prop_assert_eq!(bank.accepted_total(), accepted);
        prop_assert!(bank.len(RangeId(0)) <= capacity);
    }
}
