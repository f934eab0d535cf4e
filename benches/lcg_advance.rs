use criterion::{black_box, criterion_group, criterion_main, Criterion};
use kunjungan_sim::interval::IntervalTable;
use kunjungan_sim::probability::{Histogram, ProbabilityTable};
use kunjungan_sim::rng::{Lcg, LcgParams};
use kunjungan_sim::simulation::{self, SimulationRun};

fn params() -> LcgParams {
    LcgParams::new(1103515245, 12345, 1 << 31).unwrap()
}

fn bench_step_vs_advance(c: &mut Criterion) {
    let mut group = c.benchmark_group("lcg_step_vs_advance");

    for delta in [10u64, 1_000, 100_000] {
        group.bench_function(format!("step_{}", delta), |b| {
            b.iter(|| {
                let mut lcg = Lcg::new(params(), 12345).unwrap();
                for _ in 0..black_box(delta) {
                    lcg.next_value();
                }
                lcg.state()
            });
        });

        group.bench_function(format!("advance_{}", delta), |b| {
            b.iter(|| {
                let mut lcg = Lcg::new(params(), 12345).unwrap();
                lcg.advance(black_box(delta));
                lcg.state()
            });
        });
    }

    group.finish();
}

fn bench_simulation(c: &mut Criterion) {
    let histogram = Histogram::from_counts(vec![
        ("Kota Cirebon", 1371),
        ("Kab. Cirebon", 2113),
        ("Kuningan", 371),
        ("Indramayu", 509),
        ("Majalengka", 297),
        ("Lain-lain", 141),
    ])
    .unwrap();
    let probabilities = ProbabilityTable::build(&histogram).unwrap();
    let intervals = IntervalTable::build(&probabilities, 1 << 31).unwrap();

    c.bench_function("simulate_10000", |b| {
        b.iter(|| {
            let mut lcg = Lcg::new(params(), 12345).unwrap();
            let run: SimulationRun = simulation::run(&mut lcg, &intervals, black_box(10_000))
                .unwrap()
                .collect::<kunjungan_sim::Result<_>>()
                .unwrap();
            run.len()
        });
    });
}

criterion_group!(benches, bench_step_vs_advance, bench_simulation);
criterion_main!(benches);
