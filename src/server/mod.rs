//! Ingest server for SDK events.
//!
//! One route does the real work: `POST /ingest` receives batched lifecycle
//! events and persists them with per-event error isolation. Schema errors
//! reject the whole request with HTTP 422; everything else is reported
//! per-event in an HTTP 200 body.

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;

use crate::config::ServerConfig;
use crate::repository::{
    run_migrations, AsyncSqlitePool, PayloadRepository, RunRepository, StepRepository,
};

/// Shared state for the ingest server.
#[derive(Clone)]
pub struct AppState {
    pub runs: RunRepository,
    pub steps: StepRepository,
    pub payloads: PayloadRepository,
}

impl AppState {
    /// Build repositories over one connection factory.
    pub fn new(config: &ServerConfig) -> Self {
        let pool = AsyncSqlitePool::new(&config.database_url);
        Self {
            runs: RunRepository::new(pool.clone()),
            steps: StepRepository::new(pool.clone()),
            payloads: PayloadRepository::new(pool),
        }
    }
}

/// Run migrations and start the ingest server.
pub async fn serve(config: &ServerConfig, host: &str, port: u16) -> anyhow::Result<()> {
    run_migrations(&config.database_url).await?;

    let state = AppState::new(config);
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Starting ingest server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
