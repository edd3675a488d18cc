//! Request/response endpoint.

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::dto::{InvokeRequest, InvokeResponse};
use crate::error::AppError;
use crate::services::agent;
use crate::AppState;

/// Answers one conversation and returns it with the assistant reply appended.
pub async fn invoke(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InvokeRequest>,
) -> Result<Json<InvokeResponse>, AppError> {
    let ctx = state.request_context();
    let response = agent::answer(&state, req.input, ctx, None).await?;
    Ok(Json(response))
}
