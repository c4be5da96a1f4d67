//! Integration tests for the sentinel API endpoints

use aqua_sentinel::api::{create_router, AppState};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use sentinel_lib::{
    health::HealthRegistry,
    observability::{SentinelMetrics, StructuredLogger},
    predictor::{LinearRegressor, ModelSet},
    risk::ThresholdRegistry,
    Pipeline, TrackedVariable,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn constant(value: f64) -> LinearRegressor {
    LinearRegressor::new(value, Vec::new())
}

fn full_models(dissolved_oxygen: f64) -> ModelSet {
    ModelSet::new("test-v1")
        .with_model(TrackedVariable::DissolvedOxygen, constant(dissolved_oxygen))
        .with_model(TrackedVariable::Ph, constant(7.9))
        .with_model(TrackedVariable::Ammonia, constant(0.03))
        .with_model(TrackedVariable::Turbidity, constant(5.2))
        .with_model(TrackedVariable::Temperature, constant(28.4))
}

async fn setup_test_app(models: ModelSet) -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    let thresholds = ThresholdRegistry::builtin();
    health_registry.observe_thresholds(&thresholds).await;
    health_registry.observe_models(&models).await;

    let pipeline = Arc::new(Pipeline::new(models, thresholds));
    let state = Arc::new(AppState::new(
        pipeline,
        health_registry,
        SentinelMetrics::new(),
        StructuredLogger::new("test"),
    ));
    let router = create_router(state.clone());

    (router, state)
}

/// `count` five-minute samples with steady readings and the given oxygen level
fn history(count: usize, dissolved_oxygen: f64) -> Value {
    let points: Vec<Value> = (0..count)
        .map(|i| {
            let minutes = i * 5;
            json!({
                "timestamp": format!("2024-05-01T{:02}:{:02}:00", 6 + minutes / 60, minutes % 60),
                "temperature": 28.0,
                "dissolved_oxygen": dissolved_oxygen,
                "ph": 7.8,
                "turbidity": 5.0,
                "ammonia": 0.02,
                "rain_event": 0,
                "feeding_event": 0
            })
        })
        .collect();
    Value::Array(points)
}

async fn post_json(app: Router, uri: &str, body: String) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_predict_returns_assessment() {
    let (app, _state) = setup_test_app(full_models(6.0)).await;

    let body = json!({"species": "tom", "history": history(12, 6.5)}).to_string();
    let (status, response) = post_json(app, "/v1/predict", body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["risk_level"], "SAFE");
    assert_eq!(response["score"], 0);
    assert_eq!(response["species"], "tom");
    assert_eq!(response["prediction_next_interval"]["ph"], 7.9);
    assert_eq!(response["current_values"]["dissolved_oxygen"], 6.5);
    assert_eq!(response["thresholds"]["do_danger"], 3.5);
    assert!(response["details"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_predict_flags_low_oxygen_forecast() {
    let (app, _state) = setup_test_app(full_models(3.0)).await;

    let body = json!({"species": "tom", "history": history(12, 6.5)}).to_string();
    let (status, response) = post_json(app, "/v1/predict", body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["risk_level"], "DANGER_ACTION_NEEDED");
    let reason = response["details"][0].as_str().unwrap();
    assert!(reason.contains("3.5"));
}

#[tokio::test]
async fn test_predict_defaults_species() {
    let (app, _state) = setup_test_app(full_models(6.0)).await;

    let body = json!({"history": history(12, 6.5)}).to_string();
    let (status, response) = post_json(app, "/v1/predict", body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["species"], "tom");
}

#[tokio::test]
async fn test_predict_short_history_is_validation_error() {
    let (app, _state) = setup_test_app(full_models(6.0)).await;

    let body = json!({"species": "tom", "history": history(11, 6.5)}).to_string();
    let (status, response) = post_json(app, "/v1/predict", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["kind"], "validation_error");
    assert!(response["message"].as_str().unwrap().contains("12"));
    assert!(response.get("prediction_next_interval").is_none());
}

#[tokio::test]
async fn test_predict_malformed_json_is_validation_error() {
    let (app, _state) = setup_test_app(full_models(6.0)).await;

    let (status, response) = post_json(app, "/v1/predict", "{\"history\": [".to_string()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["kind"], "validation_error");
}

#[tokio::test]
async fn test_predict_without_models_is_unavailable() {
    let (app, _state) = setup_test_app(ModelSet::empty()).await;

    let body = json!({"species": "tom", "history": history(12, 6.5)}).to_string();
    let (status, response) = post_json(app, "/v1/predict", body).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response["kind"], "service_unavailable");
}

#[tokio::test]
async fn test_species_listing() {
    let (app, _state) = setup_test_app(full_models(6.0)).await;

    let (status, response) = get_json(app, "/v1/species").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["default_species"], "tom");
    let species = response["species"].as_array().unwrap();
    assert_eq!(species.len(), 6);
    let tom = species.iter().find(|s| s["species"] == "tom").unwrap();
    assert_eq!(tom["is_default"], true);
    assert_eq!(tom["thresholds"]["do_warning"], 5.0);
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app(full_models(6.0)).await;

    let (status, health) = get_json(app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert!(health["components"]["models"].is_object());
    assert!(health["components"]["thresholds"].is_object());
}

#[tokio::test]
async fn test_healthz_degraded_with_partial_models() {
    let models = ModelSet::new("partial").with_model(TrackedVariable::Ph, constant(7.9));
    let (app, _state) = setup_test_app(models).await;

    let (status, health) = get_json(app, "/healthz").await;

    // Degraded still returns 200 (operational)
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "degraded");
    let message = health["components"]["models"]["message"].as_str().unwrap();
    assert!(message.contains("ammonia"));
}

#[tokio::test]
async fn test_healthz_returns_503_without_models() {
    let (app, _state) = setup_test_app(ModelSet::empty()).await;

    let (status, health) = get_json(app, "/healthz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_returns_503_when_not_ready() {
    let (app, _state) = setup_test_app(full_models(6.0)).await;

    let (status, readiness) = get_json(app, "/readyz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(readiness["ready"], false);
}

#[tokio::test]
async fn test_readyz_returns_ok_when_ready() {
    let (app, state) = setup_test_app(full_models(6.0)).await;
    state.health_registry.set_ready(true).await;

    let (status, readiness) = get_json(app, "/readyz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_readyz_returns_503_without_models() {
    let (app, state) = setup_test_app(ModelSet::empty()).await;
    state.health_registry.set_ready(true).await;

    let (status, readiness) = get_json(app, "/readyz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(readiness["ready"], false);
    let reason = readiness["reason"].as_str().unwrap();
    assert!(reason.contains("no regression models"));
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, state) = setup_test_app(full_models(6.0)).await;

    state.metrics.observe_pipeline_latency(0.001);
    state.metrics.inc_assessment(sentinel_lib::RiskLevel::Safe);
    state.metrics.set_models(5, "test-v1");

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("sentinel_pipeline_latency_seconds_bucket"));
    assert!(metrics_text.contains("sentinel_assessments_total"));
    assert!(metrics_text.contains("sentinel_models_loaded"));
    assert!(metrics_text.contains("sentinel_model_version_info"));
}
