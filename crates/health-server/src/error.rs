//! Application error types and Axum response conversion.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use health_core::AgentError;
use serde::Serialize;
use tracing::error;

/// Application-level errors with HTTP status code mapping.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    /// A model or search backend failed for every specialist.
    Upstream(String),
    Timeout(String),
    Internal(String),
}

#[derive(Serialize)]
pub(crate) struct ErrorResponse {
    pub error: String,
}

impl AppError {
    pub fn message(&self) -> &str {
        match self {
            AppError::BadRequest(msg)
            | AppError::Upstream(msg)
            | AppError::Timeout(msg)
            | AppError::Internal(msg) => msg,
        }
    }
}

impl From<AgentError> for AppError {
    fn from(err: AgentError) -> Self {
        let message = err.to_string();
        match err {
            AgentError::InvalidInput(_) => AppError::BadRequest(message),
            AgentError::SpecialistsFailed(_) | AgentError::ExternalService(_) | AgentError::Llm(_) => {
                AppError::Upstream(message)
            }
            AgentError::Timeout { .. } => AppError::Timeout(message),
            _ => {
                error!("Request failed: {}", message);
                AppError::Internal(message)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Timeout(msg) => (StatusCode::GATEWAY_TIMEOUT, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
