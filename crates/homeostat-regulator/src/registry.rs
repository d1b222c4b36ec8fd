//! EngineRegistry - one independent engine per worker
//!
//! Workers never share an engine. Weights are reconciled out-of-band with
//! [`EngineRegistry::merge_weights`] and, if wanted,
//! [`EngineRegistry::broadcast_weights`].

use std::sync::Arc;

use dashmap::DashMap;
use homeostat_common::{Result, WeightVector};
use tracing::{debug, info, instrument, warn};

use crate::config::RegulatorConfig;
use crate::engine::{CyberneticEngine, SharedEngine};
use crate::telemetry::RegulatorTelemetry;

pub struct EngineRegistry {
    config: RegulatorConfig,
    engines: Arc<DashMap<String, SharedEngine>>,
    telemetry: Option<Arc<RegulatorTelemetry>>,
}

impl EngineRegistry {
    /// Validates `config` once; every engine is built from it
    pub fn new(config: RegulatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            engines: Arc::new(DashMap::new()),
            telemetry: None,
        })
    }

    pub fn with_telemetry(mut self, telemetry: Arc<RegulatorTelemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn config(&self) -> &RegulatorConfig {
        &self.config
    }

    /// Engine for `worker`, created on first use
    pub fn engine(&self, worker: &str) -> Result<SharedEngine> {
        if let Some(engine) = self.engines.get(worker) {
            return Ok(Arc::clone(engine.value()));
        }

        let mut engine = CyberneticEngine::new(self.config.clone())?;
        if let Some(telemetry) = &self.telemetry {
            engine = engine.with_telemetry(Arc::clone(telemetry));
        }
        let shared = self
            .engines
            .entry(worker.to_string())
            .or_insert_with(|| engine.shared())
            .value()
            .clone();
        debug!(worker, "Engine registered");
        Ok(shared)
    }

    pub fn get(&self, worker: &str) -> Option<SharedEngine> {
        self.engines.get(worker).map(|e| Arc::clone(e.value()))
    }

    pub fn remove(&self, worker: &str) -> Option<SharedEngine> {
        self.engines.remove(worker).map(|(_, engine)| engine)
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    pub fn worker_ids(&self) -> Vec<String> {
        self.engines.iter().map(|e| e.key().clone()).collect()
    }

    /// Element-wise mean of every worker's weights
    ///
    /// `None` when no engine carries weights (empty registry or fuzzy policy).
    #[instrument(skip(self), fields(workers = self.engines.len()))]
    pub fn merge_weights(&self) -> Option<WeightVector> {
        let engines: Vec<SharedEngine> = self
            .engines
            .iter()
            .map(|e| Arc::clone(e.value()))
            .collect();
        let vectors: Vec<WeightVector> = engines
            .iter()
            .filter_map(|engine| engine.lock().weights().cloned())
            .collect();
        let merged = WeightVector::average(&vectors);
        if let Some(weights) = &merged {
            info!(sources = vectors.len(), weights = ?weights, "Worker weights merged");
        }
        merged
    }

    /// Push `weights` into every engine; returns how many accepted them
    pub fn broadcast_weights(&self, weights: &WeightVector) -> usize {
        let engines: Vec<(String, SharedEngine)> = self
            .engines
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();

        let mut accepted = 0;
        for (worker, engine) in engines {
            match engine.lock().replace_weights(weights.clone()) {
                Ok(()) => accepted += 1,
                Err(err) => warn!(worker = %worker, error = %err, "Worker rejected weights"),
            }
        }
        accepted
    }
}
