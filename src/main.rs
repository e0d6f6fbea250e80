//! Innovation Portal backend server

use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use innovation_portal::{
    routes, AppState, Config, InMemorySessionStore, InMemoryStore, PortalStore, SessionStore,
    SqliteStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "innovation_portal=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();
    tracing::info!(?config, "Loaded configuration");

    match &config.database {
        Some(path) => {
            let store = SqliteStore::open(path)?;
            tracing::info!(path = %path, "Using SQLite store");
            serve(
                Arc::new(AppState::new(store, InMemorySessionStore::new())),
                config.port,
            )
            .await
        }
        None => {
            tracing::warn!("No database configured; state is in-memory only");
            serve(
                Arc::new(AppState::new(InMemoryStore::new(), InMemorySessionStore::new())),
                config.port,
            )
            .await
        }
    }
}

async fn serve<P, S>(state: Arc<AppState<P, S>>, port: u16) -> Result<()>
where
    P: PortalStore + 'static,
    S: SessionStore + 'static,
{
    let app = routes::create_router(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Portal listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
