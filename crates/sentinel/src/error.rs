//! HTTP mapping of pipeline failures

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sentinel_lib::PipelineError;

/// A pipeline failure rendered as a `{kind, message}` body
#[derive(Debug)]
pub struct ApiError(pub PipelineError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            PipelineError::Validation(_) => StatusCode::BAD_REQUEST,
            PipelineError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.0.to_body())).into_response()
    }
}
