//! Error types for the pipeline and the threshold registry

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures surfaced to the caller of the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl PipelineError {
    pub fn validation(message: impl Into<String>) -> Self {
        PipelineError::Validation(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        PipelineError::ServiceUnavailable(message.into())
    }

    /// Stable machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "validation_error",
            PipelineError::ServiceUnavailable(_) => "service_unavailable",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            PipelineError::Validation(m) | PipelineError::ServiceUnavailable(m) => m,
        }
    }

    /// Structured `{kind, message}` body
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            kind: self.kind().to_string(),
            message: self.message().to_string(),
        }
    }
}

/// Wire shape of a failure response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

/// Errors raised while building a threshold registry
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to load threshold profiles: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid thresholds for species {species}: {reason}")]
    InvalidProfile { species: String, reason: String },

    #[error("default species {0} has no profile")]
    MissingDefault(String),
}
