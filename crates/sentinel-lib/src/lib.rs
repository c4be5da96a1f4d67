//! Water-quality forecasting and risk library for aquaculture ponds
//!
//! This crate provides the core functionality for:
//! - Sliding-window feature engineering over sensor history
//! - Per-variable regression forecasts with physical constraints
//! - Multi-species risk scoring with explanations
//! - Model hot reload, health checks and observability

pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod predictor;
pub mod risk;
pub mod snapshot;

pub use error::{ErrorBody, PipelineError, RegistryError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{SentinelMetrics, StructuredLogger};
pub use pipeline::Pipeline;
pub use snapshot::SnapshotCell;
