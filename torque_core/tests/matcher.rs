use rstest::rstest;
use torque_core::{RangeId, SampleBank, ToleranceRange, classify};

fn bench_ranges() -> Vec<ToleranceRange> {
    vec![
        ToleranceRange::new(70.0, 67.2, 72.8),
        ToleranceRange::new(50.0, 48.0, 52.0),
        ToleranceRange::new(30.0, 28.8, 31.2),
    ]
}

#[rstest]
#[case(70.1, Some(0))]
#[case(50.1, Some(1))]
#[case(29.9, Some(2))]
#[case(67.2, Some(0))]
#[case(72.8, Some(0))]
#[case(72.81, None)]
#[case(999.0, None)]
#[case(-1.0, None)]
fn single_fit(#[case] value: f64, #[case] expected: Option<usize>) {
    let ranges = bench_ranges();
    let fits = classify(value, &ranges);
    assert_eq!(fits.first().map(|m| m.range.index()), expected);
    assert!(fits.len() <= 1);
}

#[test]
fn non_finite_values_match_nothing() {
    let ranges = bench_ranges();
    assert!(classify(f64::NAN, &ranges).is_empty());
    assert!(classify(f64::INFINITY, &ranges).is_empty());
}

#[test]
fn overlapping_ranges_sorted_by_center_distance() {
    let ranges = vec![
        ToleranceRange::new(100.0, 90.0, 110.0),
        ToleranceRange::new(104.0, 100.0, 108.0),
        ToleranceRange::new(103.0, 101.0, 105.0),
    ];
    let fits = classify(104.5, &ranges);
    let order: Vec<usize> = fits.iter().map(|m| m.range.index()).collect();
    assert_eq!(order, vec![1, 2, 0]);
    assert!(fits.windows(2).all(|w| w[0].distance <= w[1].distance));
    assert_eq!(fits[0].label, "100.0 - 108.0");
}

#[test]
fn equal_distance_keeps_profile_order() {
    let ranges = vec![
        ToleranceRange::new(10.0, 8.0, 12.0),
        ToleranceRange::new(10.0, 9.0, 11.0),
    ];
    let fits = classify(10.0, &ranges);
    assert_eq!(fits[0].range, RangeId(0));
    assert_eq!(fits[1].range, RangeId(1));
}

#[test]
fn bench_stream_fills_expected_buckets() {
    let ranges = bench_ranges();
    let bank = SampleBank::new(ranges.len(), 5);
    for v in [70.1, 50.1, 70.3, 29.9, 999.0] {
        for m in classify(v, &ranges) {
            bank.try_accept(m.range, v);
        }
    }
    let snap = bank.snapshot();
    assert_eq!(snap.bucket(RangeId(0)), &[70.1, 70.3]);
    assert_eq!(snap.bucket(RangeId(1)), &[50.1]);
    assert_eq!(snap.bucket(RangeId(2)), &[29.9]);
    assert_eq!(snap.accepted_total(), 4);
}
