use std::env;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use agent_framework::core::config::{AppPaths, ConfigService};
use agent_framework::core::logging;
use agent_framework::server;
use agent_framework::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = Arc::new(AppPaths::new());
    let config = ConfigService::new(paths.clone());
    let settings = config
        .settings()
        .context("Failed to load configuration")?;
    logging::init(&paths, &settings.logging.level);
    if let Ok(raw) = config.load_config() {
        tracing::debug!(
            "Effective configuration: {}",
            config.redact_sensitive_values(&raw)
        );
    }

    let state = AppState::initialize(paths, settings.clone()).await?;

    let port = env::var("PORT")
        .ok()
        .and_then(|val| val.parse::<u16>().ok())
        .unwrap_or(settings.server.port);
    let bind_addr = format!("{}:{}", settings.server.host, port);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    let app: Router = server::router::router(state);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
