pub mod api;
pub mod config;
pub mod logic;
pub mod model;
pub mod seed;
pub mod store;

// Export API types
pub use api::handlers;
pub use api::routes;

// Export the engine entry points
pub use logic::{
    ArbitrationError, ConflictScope, Decision, DetectionReport, GroupActionOutcome, GroupSynchronizer,
    PotConflictDetector, ResolutionEngine, SlotConflictDetector,
};

// Export all model types
pub use model::*;

// Export seed module
pub use seed::*;

// Export store types
pub use store::{MemoryStore, PostgresStore, RequestBatch, Store};

use std::sync::Arc;

use crate::config::AppConfig;

/// Open the configured store and serve the API until the listener fails
pub async fn run_server(config: &AppConfig) -> anyhow::Result<()> {
    if config.database.in_memory {
        log::info!("Using in-memory store, nothing survives a restart");
        return serve_with_store(Arc::new(MemoryStore::new()), config).await;
    }

    log::info!("Connecting to PostgreSQL...");
    let postgres_store = PostgresStore::new(&config.database_url(), config.max_connections()).await?;
    log::info!("Running database migrations...");
    postgres_store.migrate().await?;

    serve_with_store(Arc::new(postgres_store), config).await
}

pub async fn serve_with_store<S: Store + 'static>(store: Arc<S>, config: &AppConfig) -> anyhow::Result<()> {
    use axum::serve;
    use tokio::net::TcpListener;

    if config.seed.load {
        log::info!("Loading seed data...");
        seed::load_seed_data(store.as_ref()).await?;
    }

    let app = crate::api::routes::create_router().with_state(store);

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    log::info!("Slot arbitration server running on http://{}", bind_address);

    serve(listener, app).await?;

    Ok(())
}
