//! Constrained forecasting
//!
//! Runs each variable's regression model against the feature snapshot and
//! post-processes the raw estimates: dissolved oxygen cannot rebound while it
//! is actively crashing, no forecast goes below zero, and every value is
//! rounded to two decimals.

use super::features::FeatureSnapshot;
use super::model_set::ModelSet;
use crate::error::PipelineError;
use crate::models::{CurrentReadings, PredictionSet, TrackedVariable, VariableMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, warn};

/// A 3-step oxygen delta below this marks an active downward trend
pub const DO_CRASH_DELTA: f64 = -0.1;

/// Default per-request budget for model inference
pub const INFERENCE_TIMEOUT: Duration = Duration::from_millis(250);

/// A model that produced no usable estimate for this request
#[derive(Debug, Clone, PartialEq)]
pub struct ModelFailure {
    pub variable: TrackedVariable,
    pub reason: String,
}

/// Constrained forecast plus the current values it was derived from
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    pub predictions: PredictionSet,
    /// Current measured values of the forecast variables
    pub current_values: CurrentReadings,
    pub failures: Vec<ModelFailure>,
}

/// Round to two decimals and clamp at zero.
///
/// Rounds the exact binary value, with exact ties going to the even
/// hundredth, so `0.105` (stored just below the tie) becomes `0.1`.
pub fn round_forecast(value: f64) -> f64 {
    let rounded = round_hundredths(value) / 100.0;
    if rounded <= 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Nearest integer to `value * 100`, computed on the exact product
fn round_hundredths(value: f64) -> f64 {
    let scaled = value * 100.0;
    let floor = scaled.floor();
    if scaled - floor != 0.5 {
        return scaled.round();
    }
    // The product may have rounded onto the tie; the fused residual says which side it came from
    let residual = value.mul_add(100.0, -scaled);
    if residual > 0.0 {
        floor + 1.0
    } else if residual < 0.0 || floor % 2.0 == 0.0 {
        floor
    } else {
        floor + 1.0
    }
}

/// Applies physical-plausibility constraints to model estimates
///
/// Each variable allows one estimate on the blocking pool at a time. A model
/// still running past an earlier deadline is skipped until it returns, so a
/// hung model holds at most one blocking thread.
#[derive(Debug, Clone)]
pub struct ConstraintEngine {
    crash_delta: f64,
    in_flight: VariableMap<Arc<Semaphore>>,
}

impl Default for ConstraintEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstraintEngine {
    pub fn new() -> Self {
        let mut in_flight = VariableMap::new();
        for variable in TrackedVariable::ALL {
            in_flight.insert(variable, Arc::new(Semaphore::new(1)));
        }
        Self {
            crash_delta: DO_CRASH_DELTA,
            in_flight,
        }
    }

    /// Constrain one raw estimate
    pub fn constrain(&self, variable: TrackedVariable, raw: f64, snapshot: &FeatureSnapshot) -> f64 {
        let mut value = raw;
        if variable == TrackedVariable::DissolvedOxygen {
            let features = snapshot.variable(variable);
            if features.delta_3 < self.crash_delta && value > features.value {
                debug!(
                    raw = raw,
                    current = features.value,
                    delta_3 = features.delta_3,
                    "Oxygen crashing, capping forecast at current value"
                );
                value = features.value;
            }
        }
        round_forecast(value)
    }

    /// Forecast every variable with a model, in the caller's thread
    pub fn forecast(
        &self,
        snapshot: &FeatureSnapshot,
        models: &ModelSet,
    ) -> Result<Forecast, PipelineError> {
        ensure_models(models)?;
        let estimates = models
            .iter()
            .map(|(variable, model)| {
                let result = model.estimate(snapshot).map_err(|e| e.to_string());
                (variable, result)
            })
            .collect();
        self.finish(snapshot, estimates)
    }

    /// Forecast with each model on the blocking pool, bounded by `timeout`.
    ///
    /// Models that miss the deadline, or are still busy with an earlier
    /// request, are dropped from the result rather than stalling the request.
    pub async fn forecast_within(
        &self,
        snapshot: Arc<FeatureSnapshot>,
        models: &ModelSet,
        timeout: Duration,
    ) -> Result<Forecast, PipelineError> {
        ensure_models(models)?;
        let deadline = Instant::now() + timeout;

        let handles: Vec<_> = models
            .iter()
            .map(|(variable, model)| {
                let permit = self
                    .in_flight
                    .get(variable)
                    .and_then(|slot| Arc::clone(slot).try_acquire_owned().ok());
                let handle = permit.map(|permit| {
                    let model = Arc::clone(model);
                    let snapshot = Arc::clone(&snapshot);
                    tokio::task::spawn_blocking(move || {
                        let _permit = permit;
                        model.estimate(&snapshot)
                    })
                });
                (variable, handle)
            })
            .collect();

        let mut estimates = Vec::with_capacity(handles.len());
        for (variable, handle) in handles {
            let Some(handle) = handle else {
                estimates.push((variable, Err("previous estimate still running".to_string())));
                continue;
            };
            let result = match tokio::time::timeout_at(deadline, handle).await {
                Ok(Ok(Ok(value))) => Ok(value),
                Ok(Ok(Err(e))) => Err(e.to_string()),
                Ok(Err(join_error)) => Err(format!("inference task failed: {}", join_error)),
                Err(_) => Err(format!("inference timed out after {}ms", timeout.as_millis())),
            };
            estimates.push((variable, result));
        }
        self.finish(&snapshot, estimates)
    }

    fn finish(
        &self,
        snapshot: &FeatureSnapshot,
        estimates: Vec<(TrackedVariable, Result<f64, String>)>,
    ) -> Result<Forecast, PipelineError> {
        let attempted = estimates.len();
        let mut predictions = PredictionSet::new();
        let mut current_values = CurrentReadings::new();
        let mut failures = Vec::new();

        for (variable, result) in estimates {
            match result {
                Ok(raw) if raw.is_finite() => {
                    predictions.insert(variable, self.constrain(variable, raw, snapshot));
                    current_values.insert(variable, snapshot.variable(variable).value);
                }
                Ok(raw) => failures.push(ModelFailure {
                    variable,
                    reason: format!("non-finite estimate {}", raw),
                }),
                Err(reason) => failures.push(ModelFailure { variable, reason }),
            }
        }

        for failure in &failures {
            warn!(variable = %failure.variable, reason = %failure.reason, "Model estimate dropped");
        }

        if predictions.is_empty() {
            return Err(PipelineError::unavailable(format!(
                "all {} regression models failed to produce an estimate",
                attempted
            )));
        }

        Ok(Forecast {
            predictions,
            current_values,
            failures,
        })
    }
}

fn ensure_models(models: &ModelSet) -> Result<(), PipelineError> {
    if models.is_empty() {
        return Err(PipelineError::unavailable(
            "no regression model is available for any tracked variable",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{history_with, point, steady_history};
    use crate::models::SensorHistory;
    use crate::predictor::{FeatureBuilder, RegressionModel};
    use anyhow::Result;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed(f64);

    impl RegressionModel for Fixed {
        fn estimate(&self, _: &FeatureSnapshot) -> Result<f64> {
            Ok(self.0)
        }
        fn kind(&self) -> &'static str {
            "fixed"
        }
    }

    struct Failing;

    impl RegressionModel for Failing {
        fn estimate(&self, _: &FeatureSnapshot) -> Result<f64> {
            anyhow::bail!("model exploded")
        }
        fn kind(&self) -> &'static str {
            "failing"
        }
    }

    struct Slow;

    impl RegressionModel for Slow {
        fn estimate(&self, _: &FeatureSnapshot) -> Result<f64> {
            std::thread::sleep(Duration::from_millis(300));
            Ok(1.0)
        }
        fn kind(&self) -> &'static str {
            "slow"
        }
    }

    struct Hung {
        calls: Arc<AtomicUsize>,
    }

    impl RegressionModel for Hung {
        fn estimate(&self, _: &FeatureSnapshot) -> Result<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_secs(2));
            Ok(5.0)
        }
        fn kind(&self) -> &'static str {
            "hung"
        }
    }

    /// DO ends at 4.0 after dropping 0.5 over the last 3 samples
    fn crashing_snapshot() -> FeatureSnapshot {
        let points = history_with(12, |i| {
            let v = if i < 8 { 4.5 } else { 4.5 - (i as f64 - 8.0) * 0.5 / 3.0 };
            point(i, v)
        });
        FeatureBuilder::new().build(&SensorHistory::new(points).unwrap())
    }

    fn steady_snapshot() -> FeatureSnapshot {
        FeatureBuilder::new().build(&SensorHistory::new(steady_history(12)).unwrap())
    }

    #[test]
    fn test_crashing_oxygen_cannot_rebound() {
        let snapshot = crashing_snapshot();
        assert!((snapshot.dissolved_oxygen.delta_3 - (-0.5)).abs() < 1e-9);
        assert!((snapshot.dissolved_oxygen.value - 4.0).abs() < 1e-9);

        let engine = ConstraintEngine::new();
        let value = engine.constrain(TrackedVariable::DissolvedOxygen, 4.5, &snapshot);
        assert!(value <= 4.0);
        assert_eq!(value, 4.0);
    }

    #[test]
    fn test_crash_cap_only_applies_to_oxygen() {
        let snapshot = crashing_snapshot();
        let engine = ConstraintEngine::new();
        assert_eq!(engine.constrain(TrackedVariable::Ph, 8.123, &snapshot), 8.12);
    }

    #[test]
    fn test_stable_oxygen_forecast_is_not_capped() {
        let engine = ConstraintEngine::new();
        let value = engine.constrain(TrackedVariable::DissolvedOxygen, 6.9, &steady_snapshot());
        assert_eq!(value, 6.9);
    }

    #[test]
    fn test_negative_forecasts_clamp_to_zero() {
        let engine = ConstraintEngine::new();
        let snapshot = steady_snapshot();
        assert_eq!(engine.constrain(TrackedVariable::Ammonia, -0.3, &snapshot), 0.0);
        let tiny = engine.constrain(TrackedVariable::Ammonia, -0.001, &snapshot);
        assert_eq!(tiny, 0.0);
        assert!(tiny.is_sign_positive());
    }

    #[test]
    fn test_rounding_uses_exact_value() {
        // Stored just below the tie
        assert_eq!(round_forecast(0.105), 0.1);
        assert_eq!(round_forecast(1.115), 1.11);
        // Exact ties go to the even hundredth
        assert_eq!(round_forecast(0.125), 0.12);
        assert_eq!(round_forecast(0.375), 0.38);
        assert_eq!(round_forecast(2.675), 2.67);
        assert_eq!(round_forecast(6.127), 6.13);
    }

    #[test]
    fn test_forecast_partial_coverage() {
        let models = ModelSet::new("test")
            .with_model(TrackedVariable::DissolvedOxygen, Fixed(6.123))
            .with_model(TrackedVariable::Ammonia, Failing);
        let forecast = ConstraintEngine::new()
            .forecast(&steady_snapshot(), &models)
            .unwrap();

        assert_eq!(forecast.predictions.value(TrackedVariable::DissolvedOxygen), Some(6.12));
        assert!(!forecast.predictions.contains(TrackedVariable::Ammonia));
        assert_eq!(forecast.current_values.value(TrackedVariable::DissolvedOxygen), Some(6.5));
        assert!(!forecast.current_values.contains(TrackedVariable::Ph));
        assert_eq!(forecast.failures.len(), 1);
        assert_eq!(forecast.failures[0].variable, TrackedVariable::Ammonia);
    }

    #[test]
    fn test_no_models_is_unavailable() {
        let err = ConstraintEngine::new()
            .forecast(&steady_snapshot(), &ModelSet::empty())
            .unwrap_err();
        assert_eq!(err.kind(), "service_unavailable");
    }

    #[test]
    fn test_all_models_failing_is_unavailable() {
        let models = ModelSet::new("test")
            .with_model(TrackedVariable::Ph, Failing)
            .with_model(TrackedVariable::Turbidity, Fixed(f64::NAN));
        let err = ConstraintEngine::new()
            .forecast(&steady_snapshot(), &models)
            .unwrap_err();
        assert_eq!(err.kind(), "service_unavailable");
    }

    #[tokio::test]
    async fn test_slow_model_is_dropped_on_timeout() {
        let models = ModelSet::new("test")
            .with_model(TrackedVariable::Ph, Fixed(7.7))
            .with_model(TrackedVariable::Temperature, Slow);
        let forecast = ConstraintEngine::new()
            .forecast_within(Arc::new(steady_snapshot()), &models, Duration::from_millis(50))
            .await
            .unwrap();

        assert_eq!(forecast.predictions.value(TrackedVariable::Ph), Some(7.7));
        assert!(!forecast.predictions.contains(TrackedVariable::Temperature));
        assert!(forecast.failures[0].reason.contains("timed out"));
    }

    #[test]
    fn test_hung_model_holds_one_blocking_thread() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(2)
            .enable_time()
            .build()
            .unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let models = ModelSet::new("test")
            .with_model(TrackedVariable::DissolvedOxygen, Hung { calls: Arc::clone(&calls) })
            .with_model(TrackedVariable::Ph, Fixed(7.7));
        let engine = ConstraintEngine::new();
        let snapshot = Arc::new(steady_snapshot());

        for request in 0..4 {
            let forecast = runtime
                .block_on(engine.forecast_within(
                    Arc::clone(&snapshot),
                    &models,
                    Duration::from_millis(100),
                ))
                .unwrap();
            assert_eq!(forecast.predictions.value(TrackedVariable::Ph), Some(7.7));
            assert!(!forecast.predictions.contains(TrackedVariable::DissolvedOxygen));
            let reason = &forecast.failures[0].reason;
            if request == 0 {
                assert!(reason.contains("timed out"));
            } else {
                assert!(reason.contains("still running"));
            }
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        runtime.shutdown_background();
    }

    #[tokio::test]
    async fn test_async_forecast_matches_sync() {
        let models = ModelSet::new("test")
            .with_model(TrackedVariable::DissolvedOxygen, Fixed(4.5))
            .with_model(TrackedVariable::Ammonia, Fixed(0.0449));
        let snapshot = crashing_snapshot();
        let engine = ConstraintEngine::new();
        let sync = engine.forecast(&snapshot, &models).unwrap();
        let async_ = engine
            .forecast_within(Arc::new(snapshot), &models, INFERENCE_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(sync, async_);
        assert_eq!(sync.predictions.value(TrackedVariable::Ammonia), Some(0.04));
    }
}
