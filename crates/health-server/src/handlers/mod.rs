//! HTTP route handlers for the health agent.

pub mod batch;
pub mod invoke;
pub mod stream;

/// Health check endpoint.
pub async fn health() -> &'static str {
    "OK"
}
