//! Observability infrastructure for the sentinel service
//!
//! Provides:
//! - Prometheus metrics (pipeline latency, risk levels, rejections, model state)
//! - Structured JSON logging with tracing

use crate::models::RiskLevel;
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, GaugeVec, Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for pipeline latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<SentinelMetricsInner> = OnceLock::new();

struct SentinelMetricsInner {
    pipeline_latency_seconds: Histogram,
    assessments_total: IntCounterVec,
    validation_errors_total: IntCounter,
    unavailable_total: IntCounter,
    model_failures_total: IntCounterVec,
    models_loaded: IntGauge,
    model_version_info: GaugeVec,
}

impl SentinelMetricsInner {
    fn new() -> Self {
        Self {
            pipeline_latency_seconds: register_histogram!(
                "sentinel_pipeline_latency_seconds",
                "End-to-end time to evaluate one prediction request",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register pipeline_latency_seconds"),

            assessments_total: register_int_counter_vec!(
                "sentinel_assessments_total",
                "Risk assessments produced, by level",
                &["level"]
            )
            .expect("Failed to register assessments_total"),

            validation_errors_total: register_int_counter!(
                "sentinel_validation_errors_total",
                "Requests rejected because the sensor history was invalid"
            )
            .expect("Failed to register validation_errors_total"),

            unavailable_total: register_int_counter!(
                "sentinel_unavailable_total",
                "Requests that could not be served because no model produced a forecast"
            )
            .expect("Failed to register unavailable_total"),

            model_failures_total: register_int_counter_vec!(
                "sentinel_model_failures_total",
                "Regression model estimates dropped, by variable",
                &["variable"]
            )
            .expect("Failed to register model_failures_total"),

            models_loaded: register_int_gauge!(
                "sentinel_models_loaded",
                "Number of tracked variables with a loaded regression model"
            )
            .expect("Failed to register models_loaded"),

            model_version_info: register_gauge_vec!(
                "sentinel_model_version_info",
                "Information about the currently installed model set",
                &["version"]
            )
            .expect("Failed to register model_version_info"),
        }
    }
}

/// Sentinel metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct SentinelMetrics {
    _private: (),
}

impl Default for SentinelMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SentinelMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(SentinelMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &SentinelMetricsInner {
        GLOBAL_METRICS.get_or_init(SentinelMetricsInner::new)
    }

    pub fn observe_pipeline_latency(&self, duration_secs: f64) {
        self.inner().pipeline_latency_seconds.observe(duration_secs);
    }

    pub fn inc_assessment(&self, level: RiskLevel) {
        self.inner()
            .assessments_total
            .with_label_values(&[level.as_str()])
            .inc();
    }

    pub fn inc_validation_errors(&self) {
        self.inner().validation_errors_total.inc();
    }

    pub fn inc_unavailable(&self) {
        self.inner().unavailable_total.inc();
    }

    pub fn inc_model_failure(&self, variable: &str) {
        self.inner()
            .model_failures_total
            .with_label_values(&[variable])
            .inc();
    }

    /// Update the installed model set gauges
    pub fn set_models(&self, loaded: usize, version: &str) {
        self.inner().models_loaded.set(loaded as i64);
        // Only the current version carries a value
        self.inner().model_version_info.reset();
        self.inner()
            .model_version_info
            .with_label_values(&[version])
            .set(1.0);
    }
}

/// Structured logger for sentinel events
///
/// Provides consistent JSON-formatted logging for assessments,
/// model reloads and service lifecycle.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log a completed risk assessment
    pub fn log_assessment(
        &self,
        species: &str,
        level: RiskLevel,
        score: u32,
        forecast_variables: usize,
        model_version: &str,
    ) {
        match level {
            RiskLevel::DangerActionNeeded => {
                warn!(
                    event = "assessment_completed",
                    instance = %self.instance,
                    species = %species,
                    risk_level = %level,
                    score = score,
                    forecast_variables = forecast_variables,
                    model_version = %model_version,
                    "Dangerous water quality forecast"
                );
            }
            _ => {
                info!(
                    event = "assessment_completed",
                    instance = %self.instance,
                    species = %species,
                    risk_level = %level,
                    score = score,
                    forecast_variables = forecast_variables,
                    model_version = %model_version,
                    "Risk assessed"
                );
            }
        }
    }

    /// Log a request the pipeline refused to evaluate
    pub fn log_rejected(&self, kind: &str, message: &str) {
        warn!(
            event = "request_rejected",
            instance = %self.instance,
            kind = %kind,
            detail = %message,
            "Prediction request rejected"
        );
    }

    pub fn log_startup(&self, version: &str, model_version: &str, species: usize) {
        info!(
            event = "service_started",
            instance = %self.instance,
            service_version = %version,
            model_version = %model_version,
            species_profiles = species,
            "Aqua sentinel started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Aqua sentinel shutting down"
        );
    }

    /// Log a model directory reload
    pub fn log_model_reload(&self, old_version: &str, new_version: &str, success: bool) {
        if success {
            info!(
                event = "models_reloaded",
                instance = %self.instance,
                old_version = %old_version,
                new_version = %new_version,
                "Regression models reloaded"
            );
        } else {
            warn!(
                event = "models_reload_failed",
                instance = %self.instance,
                old_version = %old_version,
                "Model reload failed, keeping previous models"
            );
        }
    }
}
