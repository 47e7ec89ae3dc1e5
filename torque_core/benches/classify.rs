use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use torque_core::{RangeId, SampleBank, ToleranceProfile, ToolKind, classify};

// Deterministic readings spread around the profile's targets.
fn synth_readings(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(20.0..80.0)).collect()
}

fn bench_classify(c: &mut Criterion) {
    let profile = ToleranceProfile::suggested(75.0, ToolKind::Wrench, "ft/lbs", 0.04);
    let readings = synth_readings(4096, 0xC0FFEE);

    c.bench_function("classify_4096", |b| {
        b.iter(|| {
            let mut hits = 0usize;
            for v in &readings {
                hits += classify(black_box(*v), &profile.ranges).len();
            }
            black_box(hits)
        });
    });

    c.bench_function("classify_and_accept_4096", |b| {
        b.iter_batched(
            || SampleBank::new(profile.ranges.len(), 5),
            |bank| {
                for v in &readings {
                    for m in classify(*v, &profile.ranges) {
                        bank.try_accept(m.range, *v);
                    }
                }
                black_box(bank.len(RangeId(0)))
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_classify);
criterion_main!(benches);
