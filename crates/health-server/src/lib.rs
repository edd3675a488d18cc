//! HTTP surface for the health coordinator agent.
//!
//! Exposes the coordinator as invoke, stream and batch endpoints under
//! `/health-agent`, plus a `/health` liveness check.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::routing::{get, post};
use axum::Router;
use health_agents::{AuditSink, Coordinator, RequestContext};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared server state accessible from all handlers.
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub audit: Arc<dyn AuditSink>,
    pub request_timeout: Duration,
    pub batch_concurrency: usize,
}

impl AppState {
    pub fn new(
        coordinator: Coordinator,
        audit: Arc<dyn AuditSink>,
        request_timeout: Duration,
        batch_concurrency: usize,
    ) -> Self {
        Self { coordinator: Arc::new(coordinator), audit, request_timeout, batch_concurrency }
    }

    /// Fresh context for one request.
    pub fn request_context(&self) -> RequestContext {
        RequestContext::new(Arc::clone(&self.audit))
    }
}

/// Builds the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %req.method(),
                uri = %req.uri(),
                version = ?req.version(),
            )
        })
        .on_response(|res: &Response<Body>, latency: Duration, _span: &tracing::Span| {
            info!(
                latency = %format!("{} ms", latency.as_millis()),
                status = %res.status().as_u16(),
                "finished processing request"
            );
        });

    let logged_routes = Router::new()
        .route("/health-agent/invoke", post(handlers::invoke::invoke))
        .route("/health-agent/stream", post(handlers::stream::stream))
        .route("/health-agent/batch", post(handlers::batch::batch))
        .layer(trace_layer);

    Router::new()
        .merge(logged_routes)
        .route("/health", get(handlers::health))
        .layer(cors)
        .with_state(state)
}

/// Binds `addr` and serves until the process stops.
pub async fn serve(state: Arc<AppState>, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Starting server on {}", listener.local_addr()?);
    axum::serve(listener, create_router(state)).await?;
    Ok(())
}
