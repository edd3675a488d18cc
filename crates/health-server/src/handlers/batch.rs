//! Batch endpoint: many conversations, answered with bounded concurrency.

use std::sync::Arc;

use axum::{extract::State, Json};
use futures::stream::{self, StreamExt};
use tracing::info;

use crate::dto::{BatchItem, BatchRequest, BatchResponse};
use crate::services::agent;
use crate::AppState;

/// Answers every input; outputs keep input order and failures are reported per item.
pub async fn batch(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BatchRequest>,
) -> Json<BatchResponse> {
    info!("Batch request: {} inputs (concurrency {})", req.inputs.len(), state.batch_concurrency);

    let outputs = stream::iter(req.inputs)
        .map(|input| {
            let state = Arc::clone(&state);
            async move {
                let ctx = state.request_context();
                match agent::answer(&state, input, ctx, None).await {
                    Ok(response) => BatchItem::Ok(response),
                    Err(e) => BatchItem::Err { error: e.message().to_string() },
                }
            }
        })
        .buffered(state.batch_concurrency.max(1))
        .collect::<Vec<_>>()
        .await;

    Json(BatchResponse { outputs })
}
