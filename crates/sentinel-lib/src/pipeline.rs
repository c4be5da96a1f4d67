//! Request pipeline: validation, features, constrained forecast, risk
//!
//! A `Pipeline` owns the current model set and threshold registry as
//! replaceable snapshots. Each evaluation loads both once at the start, so a
//! concurrent reload never mixes two model generations inside one request.

use crate::error::PipelineError;
use crate::models::{PredictRequest, PredictResponse, SensorHistory};
use crate::observability::SentinelMetrics;
use crate::predictor::{
    ConstraintEngine, FeatureBuilder, FeatureSnapshot, Forecast, ModelSet, INFERENCE_TIMEOUT,
};
use crate::risk::{assess_with, ThresholdRegistry};
use crate::snapshot::SnapshotCell;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Everything one evaluation reads, fixed before inference starts
struct Prepared {
    history: SensorHistory,
    snapshot: Arc<FeatureSnapshot>,
    models: Arc<ModelSet>,
    registry: Arc<ThresholdRegistry>,
}

pub struct Pipeline {
    models: SnapshotCell<ModelSet>,
    registry: SnapshotCell<ThresholdRegistry>,
    features: FeatureBuilder,
    constraints: ConstraintEngine,
    inference_timeout: Duration,
    metrics: SentinelMetrics,
}

impl Pipeline {
    pub fn new(models: ModelSet, registry: ThresholdRegistry) -> Self {
        let metrics = SentinelMetrics::new();
        metrics.set_models(models.len(), models.version());
        Self {
            models: SnapshotCell::new(models),
            registry: SnapshotCell::new(registry),
            features: FeatureBuilder::new(),
            constraints: ConstraintEngine::new(),
            inference_timeout: INFERENCE_TIMEOUT,
            metrics,
        }
    }

    pub fn with_inference_timeout(mut self, timeout: Duration) -> Self {
        self.inference_timeout = timeout;
        self
    }

    pub fn inference_timeout(&self) -> Duration {
        self.inference_timeout
    }

    /// Current model set
    pub fn models(&self) -> Arc<ModelSet> {
        self.models.load()
    }

    /// Current threshold registry
    pub fn registry(&self) -> Arc<ThresholdRegistry> {
        self.registry.load()
    }

    /// Atomically replace the model set, returning the previous one
    pub fn install_models(&self, models: ModelSet) -> Arc<ModelSet> {
        self.metrics.set_models(models.len(), models.version());
        self.models.store(models)
    }

    /// Atomically replace the threshold registry
    pub fn install_registry(&self, registry: ThresholdRegistry) -> Arc<ThresholdRegistry> {
        self.registry.store(registry)
    }

    /// Evaluate a request with every model run in the calling thread
    pub fn evaluate(&self, request: &PredictRequest) -> Result<PredictResponse, PipelineError> {
        let started = Instant::now();
        let result = self.prepare(request).and_then(|prepared| {
            let forecast = self.constraints.forecast(&prepared.snapshot, &prepared.models)?;
            Ok(self.respond(request, &prepared, forecast))
        });
        self.record(&result, started);
        result
    }

    /// Evaluate a request with model inference bounded by the configured timeout
    pub async fn evaluate_within_timeout(
        &self,
        request: &PredictRequest,
    ) -> Result<PredictResponse, PipelineError> {
        let started = Instant::now();
        let result = match self.prepare(request) {
            Ok(prepared) => self
                .constraints
                .forecast_within(
                    Arc::clone(&prepared.snapshot),
                    &prepared.models,
                    self.inference_timeout,
                )
                .await
                .map(|forecast| self.respond(request, &prepared, forecast)),
            Err(e) => Err(e),
        };
        self.record(&result, started);
        result
    }

    fn prepare(&self, request: &PredictRequest) -> Result<Prepared, PipelineError> {
        let history = SensorHistory::new(request.history.clone())?;
        let snapshot = self.features.build(&history);
        debug!(
            points = history.len(),
            timestamp = %snapshot.timestamp,
            "Built feature snapshot"
        );
        Ok(Prepared {
            history,
            snapshot: Arc::new(snapshot),
            models: self.models.load(),
            registry: self.registry.load(),
        })
    }

    fn respond(
        &self,
        request: &PredictRequest,
        prepared: &Prepared,
        forecast: Forecast,
    ) -> PredictResponse {
        for failure in &forecast.failures {
            self.metrics.inc_model_failure(failure.variable.as_str());
        }

        let (species, thresholds) = prepared.registry.resolve(&request.species);
        // The safety net reads the live reading even without an oxygen forecast
        let (latest, _) = prepared.history.latest();
        let assessment = assess_with(&forecast.predictions, &latest.readings(), thresholds);

        PredictResponse {
            species: species.to_string(),
            current_values: forecast.current_values,
            prediction_next_interval: forecast.predictions,
            risk_level: assessment.level,
            score: assessment.score,
            details: assessment.reasons,
            thresholds: assessment.thresholds_used,
        }
    }

    fn record(&self, result: &Result<PredictResponse, PipelineError>, started: Instant) {
        match result {
            Ok(response) => {
                self.metrics
                    .observe_pipeline_latency(started.elapsed().as_secs_f64());
                self.metrics.inc_assessment(response.risk_level);
            }
            Err(PipelineError::Validation(_)) => self.metrics.inc_validation_errors(),
            Err(PipelineError::ServiceUnavailable(_)) => self.metrics.inc_unavailable(),
        }
    }
}
