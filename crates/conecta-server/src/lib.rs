//! Conecta Server Library
//!
//! Team collaboration backend: document store, synchronization services,
//! visibility rules, identity, the task assistant and the HTTP API.

pub mod api;
pub mod assistant;
pub mod auth;
pub mod db;
pub mod error;
pub mod services;
pub mod state;
pub mod store;
pub mod visibility;

use anyhow::Result;
use std::sync::Arc;

use crate::store::SqliteStore;

/// Create and configure the server application
pub async fn create_app(config: state::Config) -> Result<(axum::Router, sqlx::SqlitePool)> {
    let db_pool = db::init_pool(&config.database_url).await?;
    db::run_migrations(&db_pool).await?;

    let store = Arc::new(SqliteStore::with_batch_limit(
        db_pool.clone(),
        config.max_batch_size,
    ));
    if config.seed_demo_data {
        services::seed::seed_if_empty(store.as_ref()).await?;
    }

    let app_state = state::AppState::new(config, db_pool.clone(), store)?;
    let router = api::create_router(app_state);
    Ok((router, db_pool))
}
