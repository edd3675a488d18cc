//! Runs one caller input through the coordinator.

use health_agents::{CoordinatorEvent, RequestContext};
use health_core::Task;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::dto::{AgentInput, InvokeResponse};
use crate::error::AppError;
use crate::AppState;

/// Answers `input` under the request timeout, reporting progress on `events` when given.
///
/// Dropping the returned future cancels the request.
pub async fn answer(
    state: &AppState,
    input: AgentInput,
    ctx: RequestContext,
    events: Option<&mpsc::Sender<CoordinatorEvent>>,
) -> Result<InvokeResponse, AppError> {
    let task = Task::from_messages(&input.messages)?;
    let _cancel_on_drop = ctx.cancel.clone().drop_guard();

    info!(
        "Agent request {} ({} history messages): {}...",
        ctx.request_id,
        task.history.len(),
        task.question.chars().take(50).collect::<String>()
    );

    let run = state.coordinator.handle_with_events(&task, &ctx, events);
    let response = match tokio::time::timeout(state.request_timeout, run).await {
        Ok(result) => result?,
        Err(_) => {
            warn!("Request {} timed out after {:?}", ctx.request_id, state.request_timeout);
            return Err(AppError::Timeout(format!(
                "request timed out after {}s",
                state.request_timeout.as_secs()
            )));
        }
    };

    Ok(InvokeResponse::new(input.messages, response, ctx.request_id.clone(), ctx.elapsed_ms()))
}
