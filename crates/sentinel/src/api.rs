//! HTTP API: prediction, species profiles, health checks and Prometheus metrics

use crate::error::ApiError;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use sentinel_lib::{
    health::{ComponentStatus, HealthRegistry},
    observability::{SentinelMetrics, StructuredLogger},
    risk::SpeciesThresholdConfig,
    Pipeline, PipelineError, PredictRequest, PredictResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub health_registry: HealthRegistry,
    pub metrics: SentinelMetrics,
    pub logger: StructuredLogger,
}

impl AppState {
    pub fn new(
        pipeline: Arc<Pipeline>,
        health_registry: HealthRegistry,
        metrics: SentinelMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            pipeline,
            health_registry,
            metrics,
            logger,
        }
    }
}

/// One species profile in the listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesProfile {
    pub species: String,
    pub is_default: bool,
    pub thresholds: SpeciesThresholdConfig,
}

/// Species listing response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesListResponse {
    pub default_species: String,
    pub species: Vec<SpeciesProfile>,
}

/// Forecast and assess one pond
async fn predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            state.metrics.inc_validation_errors();
            let err = PipelineError::validation(rejection.body_text());
            state.logger.log_rejected(err.kind(), err.message());
            return Err(err.into());
        }
    };

    match state.pipeline.evaluate_within_timeout(&request).await {
        Ok(response) => {
            state.logger.log_assessment(
                &response.species,
                response.risk_level,
                response.score,
                response.prediction_next_interval.len(),
                state.pipeline.models().version(),
            );
            Ok(Json(response))
        }
        Err(err) => {
            state.logger.log_rejected(err.kind(), err.message());
            Err(err.into())
        }
    }
}

/// Registered species profiles
async fn species(State(state): State<Arc<AppState>>) -> Json<SpeciesListResponse> {
    let registry = state.pipeline.registry();
    let default_species = registry.default_species().to_string();
    let species = registry
        .profiles()
        .map(|(id, thresholds)| SpeciesProfile {
            species: id.to_string(),
            is_default: id == default_species,
            thresholds: *thresholds,
        })
        .collect();

    Json(SpeciesListResponse {
        default_species,
        species,
    })
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Partial coverage still serves
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/predict", post(predict))
        .route("/v1/species", get(species))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server, stopping when `shutdown` resolves
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
