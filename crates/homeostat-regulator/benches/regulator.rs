//! Homeostat regulator benchmarks
//!
//! Critical per-step paths:
//! - Monitor evaluation over growing observables
//! - Combination under each policy
//! - Adaptive weight updates

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use homeostat_common::{SignalName, SignalSet};
use homeostat_monitors::{ModelState, MonitorSet, MonitorSettings, Trajectory};
use homeostat_regulator::{CyberneticEngine, PolicyKind, RegulatorConfig};

fn signals(x: f64) -> SignalSet {
    SignalSet::new()
        .with(SignalName::Task, x)
        .with(SignalName::Stability, 1.0 - x / 2.0)
        .with(SignalName::Diversity, 0.7)
        .with(SignalName::Plasticity, 0.4 + x / 3.0)
        .with(SignalName::Attractor, 0.6)
}

// ============ MONITOR BENCHMARKS ============

fn bench_monitors(c: &mut Criterion) {
    let mut group = c.benchmark_group("monitors");
    let set = match MonitorSet::from_settings(&MonitorSettings::default()) {
        Ok(set) => set,
        Err(err) => panic!("invalid monitor settings: {}", err),
    };

    for size in [64usize, 1024, 16384].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        let model = ModelState::new()
            .with_gradient_tensor((0..*size).map(|i| (i as f64).sin()).collect())
            .with_output_distribution(vec![1.0 / *size as f64; *size])
            .with_parameter_deltas(vec![1e-3; *size]);
        let trajectory = Trajectory::new()
            .with_hidden_states((0..32).map(|t| vec![0.9f64.powi(t); 16]).collect())
            .with_task_score(0.8);

        group.bench_with_input(BenchmarkId::new("compute", size), size, |b, _| {
            b.iter(|| set.compute(black_box(&model), black_box(&trajectory)));
        });
    }

    group.finish();
}

// ============ COMBINATOR BENCHMARKS ============

fn bench_policies(c: &mut Criterion) {
    let mut group = c.benchmark_group("combine");

    for policy in [PolicyKind::WeightedSum, PolicyKind::Fuzzy, PolicyKind::Adaptive] {
        let mut engine = match CyberneticEngine::new(RegulatorConfig {
            policy,
            ..Default::default()
        }) {
            Ok(engine) => engine,
            Err(err) => panic!("invalid config: {}", err),
        };
        let mut step = 0u64;
        group.bench_function(BenchmarkId::new("compute", policy), |b| {
            b.iter(|| {
                step += 1;
                let x = (step % 100) as f64 / 100.0;
                let outcome = engine.compute(black_box(&signals(x)));
                engine.observe_task_reward(x);
                outcome
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_monitors, bench_policies);
criterion_main!(benches);
