//! Liveness and readiness derived from what the pipeline has loaded
//!
//! Two components are tracked: the regression model set, whose coverage of
//! the tracked variables decides between healthy, degraded and unhealthy, and
//! the species threshold registry. Readiness also waits for startup to finish.

use crate::models::TrackedVariable;
use crate::predictor::ModelSet;
use crate::risk::ThresholdRegistry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Serving with partial model coverage
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn new(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: BTreeMap<String, ComponentHealth>,
}

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names in health reports
pub mod components {
    pub const MODELS: &str = "models";
    pub const THRESHOLDS: &str = "thresholds";
}

/// Health of a model set: degraded while any variable lacks a model
pub fn model_health(models: &ModelSet) -> ComponentHealth {
    if models.is_empty() {
        return ComponentHealth::new(
            ComponentStatus::Unhealthy,
            Some("no regression models loaded".to_string()),
        );
    }
    let missing = models.missing();
    if missing.is_empty() {
        ComponentHealth::new(ComponentStatus::Healthy, None)
    } else {
        let names: Vec<&str> = missing.iter().map(TrackedVariable::as_str).collect();
        ComponentHealth::new(
            ComponentStatus::Degraded,
            Some(format!("missing models: {}", names.join(", "))),
        )
    }
}

/// Health of a threshold registry; profiles are validated on load
pub fn threshold_health(registry: &ThresholdRegistry) -> ComponentHealth {
    ComponentHealth::new(
        ComponentStatus::Healthy,
        Some(format!(
            "{} species profiles, default {}",
            registry.len(),
            registry.default_species()
        )),
    )
}

#[derive(Debug, Default)]
struct HealthState {
    models: Option<ComponentHealth>,
    thresholds: Option<ComponentHealth>,
    ready: bool,
}

/// Shared health state, updated at startup and on every model reload
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    state: Arc<RwLock<HealthState>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the model set now being served
    pub async fn observe_models(&self, models: &ModelSet) {
        self.state.write().await.models = Some(model_health(models));
    }

    /// Record the threshold registry now being served
    pub async fn observe_thresholds(&self, registry: &ThresholdRegistry) {
        self.state.write().await.thresholds = Some(threshold_health(registry));
    }

    pub async fn set_ready(&self, ready: bool) {
        self.state.write().await.ready = ready;
    }

    pub async fn health(&self) -> HealthResponse {
        let state = self.state.read().await;
        let components: BTreeMap<String, ComponentHealth> = [
            (components::MODELS, &state.models),
            (components::THRESHOLDS, &state.thresholds),
        ]
        .into_iter()
        .filter_map(|(name, health)| health.clone().map(|h| (name.to_string(), h)))
        .collect();

        let status = components
            .values()
            .map(|c| c.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy);
        HealthResponse { status, components }
    }

    /// Ready once startup finished and models can serve at least one variable
    pub async fn readiness(&self) -> ReadinessResponse {
        let state = self.state.read().await;
        let reason = if !state.ready {
            Some("service not yet initialized".to_string())
        } else {
            match &state.models {
                None => Some("models not loaded".to_string()),
                Some(models) if models.status == ComponentStatus::Unhealthy => Some(format!(
                    "models: {}",
                    models.message.as_deref().unwrap_or("unavailable")
                )),
                Some(_) => None,
            }
        };
        ReadinessResponse {
            ready: reason.is_none(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::LinearRegressor;

    fn full_models() -> ModelSet {
        TrackedVariable::ALL
            .into_iter()
            .fold(ModelSet::new("test"), |set, variable| {
                set.with_model(variable, LinearRegressor::new(1.0, Vec::new()))
            })
    }

    fn ph_only() -> ModelSet {
        ModelSet::new("test").with_model(TrackedVariable::Ph, LinearRegressor::new(7.8, Vec::new()))
    }

    #[tokio::test]
    async fn test_nothing_observed_is_healthy_but_not_ready() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("service not yet initialized"));
    }

    #[tokio::test]
    async fn test_partial_models_degrade_overall_status() {
        let registry = HealthRegistry::new();
        registry.observe_thresholds(&ThresholdRegistry::builtin()).await;
        registry.observe_models(&ph_only()).await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert_eq!(
            health.components[components::THRESHOLDS].status,
            ComponentStatus::Healthy
        );
        let thresholds = health.components[components::THRESHOLDS].message.as_deref();
        assert_eq!(thresholds, Some("6 species profiles, default tom"));
    }

    #[tokio::test]
    async fn test_reload_replaces_model_component() {
        let registry = HealthRegistry::new();
        registry.observe_models(&ModelSet::empty()).await;
        assert_eq!(registry.health().await.status, ComponentStatus::Unhealthy);

        registry.observe_models(&full_models()).await;
        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components[components::MODELS].message.is_none());
    }

    #[tokio::test]
    async fn test_readiness_requires_startup_and_models() {
        let registry = HealthRegistry::new();
        registry.observe_models(&ModelSet::empty()).await;
        registry.set_ready(true).await;

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(
            readiness.reason.as_deref(),
            Some("models: no regression models loaded")
        );

        registry.observe_models(&ph_only()).await;
        let readiness = registry.readiness().await;
        assert!(readiness.ready);
        assert!(readiness.reason.is_none());
    }

    #[test]
    fn test_model_health_follows_coverage() {
        assert_eq!(model_health(&ModelSet::empty()).status, ComponentStatus::Unhealthy);
        assert_eq!(model_health(&full_models()).status, ComponentStatus::Healthy);

        let health = model_health(&ph_only());
        assert_eq!(health.status, ComponentStatus::Degraded);
        let message = health.message.unwrap();
        assert!(message.contains("dissolved_oxygen"));
        assert!(!message.contains("ph,"));
    }
}
