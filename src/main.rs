use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use clinic_api::app::{router, AppState};
use clinic_api::config;
use clinic_api::database::DatabaseManager;
use clinic_api::store::memory::MemoryStore;
use clinic_api::store::Stores;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL and friends
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::config().clone();
    tracing::info!("Starting Clinic API in {:?} mode", config.environment);

    let stores = match config.database.url.as_deref() {
        Some(url) => {
            let pool = DatabaseManager::connect(&config.database)
                .await
                .with_context(|| format!("failed to connect to {}", DatabaseManager::redacted_url(url).unwrap_or_default()))?;
            Stores::postgres(pool)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store, data is lost on exit");
            Stores::memory(Arc::new(MemoryStore::with_default_catalog()?))
        }
    };

    let port = config.api.port;
    let state = AppState::new(config, stores).context("invalid security configuration")?;
    let app = router(state);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Clinic API listening on http://{}", bind_addr);
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
