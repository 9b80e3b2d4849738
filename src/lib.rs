pub mod config;
pub mod entities;
pub mod error;
pub mod extractors;
pub mod logging;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

use std::sync::Arc;

use axum::Router;
use sea_orm::DatabaseConnection;

use crate::config::Config;
use crate::services::storage::{self, StorageError};
use crate::services::summary::{SummaryClient, SummaryError};
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("content store: {0}")]
    Storage(#[from] StorageError),
    #[error("summary client: {0}")]
    Summary(#[from] SummaryError),
}

/// Builds the shared state from an open database connection and the loaded config.
pub async fn build_state(db: DatabaseConnection, config: Config) -> Result<AppState, StartupError> {
    let store = storage::from_config(&config.storage).await?;
    let summarizer = SummaryClient::new(config.summary.clone())?;
    Ok(AppState {
        db,
        config: Arc::new(config),
        store,
        summarizer,
    })
}

pub fn build_router(state: AppState) -> Router {
    routes::create_routes(state)
}
