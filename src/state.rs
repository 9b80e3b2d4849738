use std::sync::Arc;

use axum::extract::FromRef;
use sea_orm::DatabaseConnection;

use crate::config::Config;
use crate::services::storage::ContentStore;
use crate::services::summary::SummaryClient;
use crate::services::uploads::UploadManager;

/// Handles shared by every request. Built once by the caller that owns the
/// database connection and content store.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<Config>,
    pub store: Arc<dyn ContentStore>,
    pub summarizer: SummaryClient,
}

impl AppState {
    pub fn uploads(&self) -> UploadManager {
        UploadManager::new(
            self.db.clone(),
            self.store.clone(),
            self.config.max_upload_bytes,
        )
    }
}

impl FromRef<AppState> for DatabaseConnection {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}
