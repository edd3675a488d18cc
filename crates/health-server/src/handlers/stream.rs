//! SSE streaming endpoint.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::Stream;
use health_agents::CoordinatorEvent;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info};

use crate::dto::{InvokeRequest, RunMetadata};
use crate::services::agent;
use crate::AppState;

/// SSE event data types.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SseData {
    Stream { content: String },
    End { metadata: RunMetadata },
    Error { error: String },
}

type EventSender = mpsc::Sender<Result<Event, Infallible>>;

/// Streams routing and specialist progress, then the answer in chunks.
///
/// Closing the connection cancels the request.
pub async fn stream(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InvokeRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(100);

    tokio::spawn(async move {
        let ctx = state.request_context();
        let cancel = ctx.cancel.clone();

        let watch_tx = tx.clone();
        let watcher = tokio::spawn(async move {
            watch_tx.closed().await;
            info!("Stream client disconnected; cancelling");
            cancel.cancel();
        });

        let (events_tx, mut events_rx) = mpsc::channel::<CoordinatorEvent>(16);
        let forward_tx = tx.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                let name = match event {
                    CoordinatorEvent::Routing { .. } => "routing",
                    CoordinatorEvent::Specialist { .. } => "specialist",
                };
                send(&forward_tx, name, &event).await;
            }
        });

        let result = agent::answer(&state, req.input, ctx, Some(&events_tx)).await;
        drop(events_tx);
        let _ = forwarder.await;
        watcher.abort();

        match result {
            Ok(response) => {
                for chunk in response.answer().split_inclusive("\n\n") {
                    send(&tx, "stream", &SseData::Stream { content: chunk.to_string() }).await;
                }
                send(&tx, "end", &SseData::End { metadata: response.metadata }).await;
            }
            Err(e) => {
                error!("Stream request failed: {}", e.message());
                send(&tx, "error", &SseData::Error { error: e.message().to_string() }).await;
            }
        }
    });

    Sse::new(ReceiverStream::new(rx)).keep_alive(KeepAlive::default())
}

async fn send<T: Serialize>(tx: &EventSender, name: &str, data: &T) {
    match Event::default().event(name).json_data(data) {
        Ok(event) => {
            let _ = tx.send(Ok(event)).await;
        }
        Err(e) => error!("Failed to encode '{}' event: {}", name, e),
    }
}
