use criterion::{black_box, criterion_group, criterion_main, Criterion};
use defi_engine::amm::pool::quote_out;
use defi_engine::engine::{DefiEngine, EngineConfig};
use defi_engine::simulation::{generate_random_scenario, run_scenario, ScenarioConfig};

fn bench_swap_quote(c: &mut Criterion) {
    c.bench_function("swap_quote", |b| {
        b.iter(|| {
            quote_out(
                black_box(12_345),
                black_box(1_000_000),
                black_box(2_000_000),
                black_box(30),
            )
        })
    });
}

fn bench_scenario_200_ops(c: &mut Criterion) {
    let scenario = generate_random_scenario(&ScenarioConfig {
        op_count: 200,
        seed: Some(42),
        ..Default::default()
    });

    c.bench_function("scenario_200_ops", |b| {
        b.iter(|| {
            let mut engine = DefiEngine::new(EngineConfig::default());
            run_scenario(&mut engine, black_box(&scenario))
        })
    });
}

fn bench_scenario_2000_ops(c: &mut Criterion) {
    let scenario = generate_random_scenario(&ScenarioConfig {
        account_count: 50,
        op_count: 2_000,
        seed: Some(42),
        ..Default::default()
    });

    c.bench_function("scenario_2000_ops", |b| {
        b.iter(|| {
            let mut engine = DefiEngine::new(EngineConfig::default());
            run_scenario(&mut engine, black_box(&scenario))
        })
    });
}

criterion_group!(
    benches,
    bench_swap_quote,
    bench_scenario_200_ops,
    bench_scenario_2000_ops
);
criterion_main!(benches);
