use std::sync::Arc;

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::entities::upload::{self, Entity as Upload};
use crate::error::AppError;
use crate::models::upload::{decode_chart_configs, decode_columns, ChartConfig, ChartType};
use crate::services::spreadsheet::parse_workbook;
use crate::services::storage::ContentStore;
use crate::services::summary::SummaryClient;

pub const ACCEPTED_EXTENSIONS: [&str; 2] = ["xls", "xlsx"];

pub struct NewChartConfig {
    pub x_axis: String,
    pub y_axis: String,
    pub chart_type: ChartType,
    pub title: Option<String>,
    pub generate_ai_summary: bool,
}

#[derive(Debug)]
pub struct AppendOutcome {
    pub upload: upload::Model,
    pub chart_config: ChartConfig,
    /// The stored summary after this call, whether it was just generated or already present.
    pub ai_summary: Option<String>,
}

/// Lowercased extension of `filename`, if it has one.
fn get_extension(filename: &str) -> Option<String> {
    std::path::Path::new(filename)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .map(str::to_ascii_lowercase)
}

fn describe_limit(bytes: usize) -> String {
    const MIB: usize = 1024 * 1024;
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{}MB", bytes / MIB)
    } else {
        format!("{} byte", bytes)
    }
}

/// Checks the extension first, then the size, and returns the lowercased extension.
pub fn validate_upload(
    original_filename: &str,
    size: usize,
    max_upload_bytes: usize,
) -> Result<String, AppError> {
    let ext = get_extension(original_filename)
        .filter(|ext| ACCEPTED_EXTENSIONS.contains(&ext.as_str()))
        .ok_or_else(|| AppError::Validation("Only .xls and .xlsx files are supported".to_string()))?;

    if size > max_upload_bytes {
        return Err(AppError::Validation(format!(
            "File size exceeds {} limit",
            describe_limit(max_upload_bytes)
        )));
    }

    Ok(ext)
}

/// Owns the lifecycle of upload records: validation, parsing, persistence and
/// the later chart-config / summary mutations.
pub struct UploadManager {
    db: DatabaseConnection,
    store: Arc<dyn ContentStore>,
    max_upload_bytes: usize,
}

impl UploadManager {
    pub fn new(db: DatabaseConnection, store: Arc<dyn ContentStore>, max_upload_bytes: usize) -> Self {
        Self {
            db,
            store,
            max_upload_bytes,
        }
    }

    pub async fn create(
        &self,
        owner_id: Uuid,
        original_filename: &str,
        bytes: Vec<u8>,
    ) -> Result<upload::Model, AppError> {
        let ext = validate_upload(original_filename, bytes.len(), self.max_upload_bytes)?;
        let file_size = bytes.len() as i64;

        let id = Uuid::new_v4();
        let filename = format!("{}.{}", id, ext);
        self.store.put(&filename, &bytes).await?;

        let parsed = tokio::task::spawn_blocking(move || parse_workbook(bytes))
            .await
            .map_err(|e| AppError::InternalServerError(format!("Parser task failed: {}", e)));

        let parsed = match parsed {
            Ok(Ok(parsed)) => parsed,
            Ok(Err(e)) => {
                self.discard(&filename).await;
                return Err(e.into());
            }
            Err(e) => {
                self.discard(&filename).await;
                return Err(e);
            }
        };

        let now = chrono::Utc::now().naive_utc();
        let record = upload::ActiveModel {
            id: Set(id),
            owner_id: Set(owner_id),
            filename: Set(filename.clone()),
            original_filename: Set(original_filename.to_string()),
            file_size: Set(file_size),
            columns: Set(serde_json::to_value(&parsed.columns)
                .map_err(|e| AppError::InternalServerError(e.to_string()))?),
            row_count: Set(parsed.row_count as i64),
            chart_configs: Set(serde_json::json!([])),
            ai_summary: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        match record.insert(&self.db).await {
            Ok(saved) => Ok(saved),
            Err(e) => {
                self.discard(&filename).await;
                Err(e.into())
            }
        }
    }

    async fn discard(&self, filename: &str) {
        if let Err(e) = self.store.delete(filename).await {
            tracing::error!("Upload | failed to remove {} after rejected upload: {}", filename, e);
        }
    }

    /// Newest first.
    pub async fn list(&self, owner_id: Uuid) -> Result<Vec<upload::Model>, AppError> {
        Ok(Upload::find()
            .filter(upload::Column::OwnerId.eq(owner_id))
            .order_by_desc(upload::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    /// Missing and not-owned uploads are indistinguishable.
    pub async fn get(&self, owner_id: Uuid, id: Uuid) -> Result<upload::Model, AppError> {
        find_owned(&self.db, owner_id, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Upload not found".to_string()))
    }

    pub async fn append_chart_config(
        &self,
        owner_id: Uuid,
        id: Uuid,
        request: NewChartConfig,
        summarizer: &SummaryClient,
    ) -> Result<AppendOutcome, AppError> {
        let existing = self.get(owner_id, id).await?;
        let columns = decode_columns(&existing.columns)?;

        for axis in [&request.x_axis, &request.y_axis] {
            if !columns.iter().any(|c| &c.header == axis) {
                return Err(AppError::Validation(format!(
                    "Column '{}' does not exist in this upload",
                    axis
                )));
            }
        }

        let chart_config = ChartConfig::new(
            request.x_axis.clone(),
            request.y_axis.clone(),
            request.chart_type,
            request.title,
        );

        let txn = self.db.begin().await?;
        let mut query = Upload::find_by_id(id).filter(upload::Column::OwnerId.eq(owner_id));
        if txn.get_database_backend() == DbBackend::Postgres {
            query = query.lock_exclusive();
        }
        let current = query
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Upload not found".to_string()))?;

        let mut chart_configs = decode_chart_configs(&current.chart_configs)?;
        chart_configs.push(chart_config.clone());

        let mut active: upload::ActiveModel = current.into();
        active.chart_configs = Set(serde_json::to_value(&chart_configs)
            .map_err(|e| AppError::InternalServerError(e.to_string()))?);
        active.updated_at = Set(chrono::Utc::now().naive_utc());
        let mut updated = active.update(&txn).await?;
        txn.commit().await?;

        if request.generate_ai_summary && updated.ai_summary.is_none() {
            let summary = summarizer
                .generate(&columns, &request.x_axis, &request.y_axis)
                .await?;

            let result = Upload::update_many()
                .col_expr(upload::Column::AiSummary, Expr::value(summary))
                .col_expr(
                    upload::Column::UpdatedAt,
                    Expr::value(chrono::Utc::now().naive_utc()),
                )
                .filter(upload::Column::Id.eq(id))
                .filter(upload::Column::AiSummary.is_null())
                .exec(&self.db)
                .await?;

            if result.rows_affected == 0 {
                tracing::info!("Upload | summary for {} was already stored, keeping it", id);
            }
            updated = self.get(owner_id, id).await?;
        }

        Ok(AppendOutcome {
            ai_summary: updated.ai_summary.clone(),
            upload: updated,
            chart_config,
        })
    }
}

async fn find_owned<C: ConnectionTrait>(
    db: &C,
    owner_id: Uuid,
    id: Uuid,
) -> Result<Option<upload::Model>, sea_orm::DbErr> {
    Upload::find_by_id(id)
        .filter(upload::Column::OwnerId.eq(owner_id))
        .one(db)
        .await
}
