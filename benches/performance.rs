use criterion::{criterion_group, criterion_main, Criterion};
use dosefit::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::hint::black_box;

fn simulator() -> Simulator {
    let patient = Patient::new(0.003125, 0.01, 50.0, 0.2806, 70.0).unwrap();
    let grid = HypothesisGrid::new(
        vec![0.002, 0.0025, 0.003125, 0.0035, 0.004],
        vec![0.25, 0.27, 0.2806, 0.30, 0.31],
        &patient,
    )
    .unwrap();
    let therapy =
        TherapySchedule::new(240.0, 12.0, 1.0, vec![1.0, 11.0, 73.0, 83.0], 7.0, 1.5).unwrap();
    Simulator::new(patient, grid, ErrorModel::noiseless(), therapy, 0.1, 1).unwrap()
}

fn full_therapy(n: usize) {
    let optimizer = DoseOptimizer::new();
    for seed in 0..n as u64 {
        let mut sim = simulator();
        let mut rng = StdRng::seed_from_u64(seed);
        let initial = optimizer.initial_dose(&sim, &mut rng).unwrap();
        sim.run(initial.dose, 240.0, &mut rng).unwrap();
        black_box(sim.grid().weights());
    }
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("full therapy 5x5", |b| b.iter(|| full_therapy(black_box(1))));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
