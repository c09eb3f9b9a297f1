use anyhow::Context;
use tracing_subscriber::EnvFilter;

use nearnnext_api::app::{router, AppState};
use nearnnext_api::config;
use nearnnext_api::database::DatabaseManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = config::config().clone();
    config.validate()?;
    tracing::info!("Starting NearnNext API in {:?} mode", config.environment);
    tracing::info!(
        "Database: {}",
        DatabaseManager::redacted_url(&config.database.url)
    );

    // Connections are opened on first use; /health reports when the database is down
    let pool = DatabaseManager::connect_lazy(&config.database)?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let app = router(AppState::new(config, pool));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("NearnNext API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
