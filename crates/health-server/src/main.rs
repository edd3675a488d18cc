//! Server entry point: loads configuration, wires the coordinator, and serves.

use std::sync::Arc;

use anyhow::Result;
use health_agents::{Coordinator, CoordinatorSettings, FsAuditSink};
use health_config::AppConfig;
use health_llm::LlmClient;
use health_server::AppState;
use health_tools::{InternetSearchTool, ToolRegistry};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .compact()
        .init();

    let config = AppConfig::from_env()?;
    info!("Model: {} ({})", config.model.model, config.model.api_base.as_deref().unwrap_or("default endpoint"));
    info!(
        "Dispatch: {:?}, synthesis: {}, max steps: {}",
        config.dispatch, config.synthesize, config.limits.max_steps
    );

    let mut registry = ToolRegistry::new();
    registry.register(InternetSearchTool::new(
        config.search.api_key.clone(),
        &config.search.api_base,
        config.limits.search_timeout,
    )?);
    info!("Registered {} tools", registry.len());

    let model = Arc::new(LlmClient::new(&config.model));
    let coordinator = Coordinator::new(model, &registry, CoordinatorSettings::from(&config))?;

    info!("Audit artifacts under {}", config.audit_dir.display());
    let audit = Arc::new(FsAuditSink::new(&config.audit_dir));

    let state = Arc::new(AppState::new(
        coordinator,
        audit,
        config.limits.request_timeout,
        config.batch_concurrency,
    ));

    health_server::serve(state, &config.server.addr()).await
}
