pub mod config;
pub mod db;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use sqlx::PgPool;

use services::storage::LocalDiskStore;

/// Shared application state passed to all Axum handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: config::AppConfig,
    pub storage: Arc<LocalDiskStore>,
}

impl AppState {
    pub fn new(db: PgPool, config: config::AppConfig) -> Self {
        let storage = Arc::new(LocalDiskStore::new(&config.storage_root));
        Self {
            db,
            config,
            storage,
        }
    }
}
