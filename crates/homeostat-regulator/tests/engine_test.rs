//! Integration tests for the regulation pipeline
//!
//! Covers:
//! - Monitors → combinator → outcome through `CyberneticEngine`
//! - Fail-fast configuration validation
//! - Degraded steps and last-known-good recovery
//! - Snapshot persistence and multi-worker weight merging

use std::sync::Arc;

use homeostat_common::{ConfigError, DegradationReason, HomeostatError, SignalName, SignalSet};
use homeostat_monitors::{ModelState, StabilityConfig, Trajectory};
use homeostat_regulator::{
    CyberneticEngine, EngineRegistry, MissingSignalPolicy, PolicyKind, RegulatorConfig,
    RegulatorTelemetry, SignalWeight, WeightSnapshot,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("homeostat=debug")),
        )
        .with_test_writer()
        .try_init();
}

fn scenario_config() -> RegulatorConfig {
    RegulatorConfig {
        signals: vec![SignalName::Task, SignalName::Stability, SignalName::Diversity],
        weights: Some(vec![
            SignalWeight {
                signal: SignalName::Task,
                weight: 0.5,
            },
            SignalWeight {
                signal: SignalName::Stability,
                weight: 0.3,
            },
            SignalWeight {
                signal: SignalName::Diversity,
                weight: 0.2,
            },
        ]),
        ..Default::default()
    }
}

fn healthy_model() -> ModelState {
    ModelState::new()
        .with_gradient_tensor(vec![0.1, -0.2, 0.05])
        .with_output_distribution(vec![0.3, 0.3, 0.2, 0.2])
        .with_parameter_deltas(vec![1e-3, -1e-3, 1e-3])
}

#[test]
fn test_reference_weighted_sum() -> anyhow::Result<()> {
    init_tracing();
    let mut engine = CyberneticEngine::new(scenario_config())?;

    let outcome = engine.compute(
        &SignalSet::new()
            .with(SignalName::Task, 0.9)
            .with(SignalName::Stability, 0.2)
            .with(SignalName::Diversity, 0.8),
    );

    assert!((outcome.multiplier - 0.67).abs() < 1e-9);
    assert!((outcome.regulate(10.0) - 6.7).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_empty_signal_set_is_neutral() -> anyhow::Result<()> {
    init_tracing();
    for policy in [PolicyKind::WeightedSum, PolicyKind::Fuzzy, PolicyKind::Adaptive] {
        let mut engine = CyberneticEngine::new(RegulatorConfig {
            policy,
            ..Default::default()
        })?;
        let outcome = engine.compute(&SignalSet::new());
        assert_eq!(outcome.multiplier, 1.0, "policy {}", policy);
        assert!(!outcome.degraded);
    }
    Ok(())
}

#[test]
fn test_unknown_signal_name_fails_fast() {
    init_tracing();
    let err = "R_mood".parse::<SignalName>().unwrap_err();
    assert_eq!(
        err,
        ConfigError::UnknownSignalName {
            name: "R_mood".to_string()
        }
    );

    let json = r#"{"signals": ["R_task", "R_mood"]}"#;
    assert!(serde_json::from_str::<RegulatorConfig>(json).is_err());

    let config = RegulatorConfig {
        signals: vec![SignalName::Task],
        weights: Some(vec![SignalWeight {
            signal: SignalName::Attractor,
            weight: 1.0,
        }]),
        ..Default::default()
    };
    assert!(matches!(
        CyberneticEngine::new(config),
        Err(HomeostatError::Config(ConfigError::UnknownSignalName { .. }))
    ));
}

#[test]
fn test_malformed_observables_degrade() -> anyhow::Result<()> {
    init_tracing();
    let mut engine = CyberneticEngine::new(RegulatorConfig::default())?;

    let model = ModelState::new()
        .with_gradient_tensor(vec![f64::NAN, 1.0])
        .with_output_distribution(vec![0.0, 0.0])
        .with_parameter_deltas(Vec::new());
    let trajectory = Trajectory::new()
        .with_hidden_states(vec![vec![0.0, 1.0], vec![1.0]])
        .with_task_score(0.5);

    let outcome = engine.step(&model, &trajectory);
    assert!(outcome.degraded);
    assert!(engine.bounds().contains(outcome.multiplier));

    let degraded: Vec<_> = outcome
        .degradations
        .iter()
        .filter_map(|d| d.signal)
        .collect();
    assert!(degraded.contains(&SignalName::Stability));
    assert!(degraded.contains(&SignalName::Diversity));
    assert!(degraded.contains(&SignalName::Plasticity));
    assert!(degraded.contains(&SignalName::Attractor));
    Ok(())
}

#[test]
fn test_unstable_gradients_suppress_reward() -> anyhow::Result<()> {
    init_tracing();
    let mut config = RegulatorConfig {
        signals: vec![SignalName::Task, SignalName::Stability],
        weights: Some(vec![
            SignalWeight {
                signal: SignalName::Task,
                weight: 0.5,
            },
            SignalWeight {
                signal: SignalName::Stability,
                weight: 0.5,
            },
        ]),
        ..Default::default()
    };
    config.monitors.stability = Some(StabilityConfig {
        threshold: 2.0,
        sensitivity: 1.0,
        ..Default::default()
    });
    let mut engine = CyberneticEngine::new(config)?;

    let trajectory = Trajectory::new().with_task_score(1.0);
    let calm = engine.step(&healthy_model(), &trajectory);
    let exploding = engine.step(
        &ModelState::new().with_gradient_tensor(vec![300.0, 400.0]),
        &trajectory,
    );

    assert!(calm.multiplier > exploding.multiplier);
    assert!((exploding.multiplier - 0.5).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_missing_signal_policies() -> anyhow::Result<()> {
    init_tracing();
    let partial = SignalSet::new()
        .with(SignalName::Task, 0.9)
        .with(SignalName::Stability, 0.2);

    let mut neutral = CyberneticEngine::new(scenario_config())?;
    assert!((neutral.compute(&partial).multiplier - 0.71).abs() < 1e-9);

    let mut omit = CyberneticEngine::new(RegulatorConfig {
        missing_signal: MissingSignalPolicy::Omit,
        ..scenario_config()
    })?;
    assert!((omit.compute(&partial).multiplier - 0.6375).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_non_finite_signal_flagged() -> anyhow::Result<()> {
    init_tracing();
    let mut engine = CyberneticEngine::new(scenario_config())?;
    let outcome = engine.compute(
        &SignalSet::new()
            .with(SignalName::Task, 0.9)
            .with(SignalName::Stability, f64::INFINITY),
    );
    assert!(outcome.degraded);
    assert_eq!(outcome.degradations[0].reason, DegradationReason::Sanitized);
    assert!(outcome.multiplier.is_finite());
    Ok(())
}

#[test]
fn test_adaptive_weights_stay_normalized() -> anyhow::Result<()> {
    init_tracing();
    let mut engine = CyberneticEngine::new(RegulatorConfig {
        policy: PolicyKind::Adaptive,
        ..scenario_config()
    })?;

    for i in 0..50 {
        let x = (i % 10) as f64 / 10.0;
        engine.compute(
            &SignalSet::new()
                .with(SignalName::Task, x)
                .with(SignalName::Stability, 1.0)
                .with(SignalName::Diversity, 1.0 - x),
        );
        let weights = engine
            .observe_task_reward(x)
            .ok_or_else(|| anyhow::anyhow!("adaptive policy returned no weights"))?;
        assert!((weights.sum() - 1.0).abs() < 1e-6);
    }

    let weights = engine.weights().ok_or_else(|| anyhow::anyhow!("no weights"))?;
    assert!(weights.get(SignalName::Task) > weights.get(SignalName::Diversity));
    assert!(weights.get(SignalName::Task) > weights.get(SignalName::Stability));
    Ok(())
}

#[test]
fn test_snapshot_survives_restart() -> anyhow::Result<()> {
    init_tracing();
    let adaptive = RegulatorConfig {
        policy: PolicyKind::Adaptive,
        ..scenario_config()
    };
    let mut engine = CyberneticEngine::new(adaptive.clone())?;
    for i in 0..20 {
        let x = i as f64 / 20.0;
        engine.compute(
            &SignalSet::new()
                .with(SignalName::Task, x)
                .with(SignalName::Stability, 0.5),
        );
        engine.observe_task_reward(x);
    }

    let json = engine
        .snapshot()
        .ok_or_else(|| anyhow::anyhow!("no snapshot"))?
        .to_json()?;

    let mut restarted = CyberneticEngine::new(adaptive)?;
    restarted.restore(WeightSnapshot::from_json(&json)?)?;
    assert_eq!(restarted.weights(), engine.weights());
    Ok(())
}

#[test]
fn test_registry_merges_worker_weights() -> anyhow::Result<()> {
    init_tracing();
    let telemetry = Arc::new(RegulatorTelemetry::new()?);
    let registry = EngineRegistry::new(RegulatorConfig {
        policy: PolicyKind::Adaptive,
        ..scenario_config()
    })?
    .with_telemetry(Arc::clone(&telemetry));

    for worker in ["w0", "w1", "w2"] {
        let engine = registry.engine(worker)?;
        let mut engine = engine.lock();
        for i in 0..10 {
            let x = i as f64 / 10.0;
            engine.compute(&SignalSet::new().with(SignalName::Task, x));
            engine.observe_task_reward(x);
        }
    }

    let merged = registry
        .merge_weights()
        .ok_or_else(|| anyhow::anyhow!("nothing merged"))?;
    assert!(merged.is_normalized());
    assert_eq!(registry.broadcast_weights(&merged), 3);
    assert_eq!(telemetry.steps_total.get(), 30);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_step() -> anyhow::Result<()> {
    init_tracing();
    let mut engine = CyberneticEngine::new(RegulatorConfig::default())?;
    let outcome = engine
        .step_concurrent(
            Arc::new(healthy_model()),
            Arc::new(
                Trajectory::new()
                    .with_hidden_states((0..6).map(|t| vec![0.8f64.powi(t), 0.0]).collect())
                    .with_task_score(0.9),
            ),
        )
        .await;
    assert!(!outcome.degraded);
    assert!(engine.bounds().contains(outcome.multiplier));
    Ok(())
}
