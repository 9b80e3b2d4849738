use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    Extension,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::upload;
use crate::error::AppError;
use crate::extractors::json::AppJson;
use crate::middleware::auth::AuthUser;
use crate::models::upload::{
    decode_chart_configs, decode_columns, ChartConfig, ChartType, ColumnData, StoredShapeError,
    DEFAULT_CHART_TITLE,
};
use crate::routes::parse_path_id;
use crate::services::pdf;
use crate::services::uploads::NewChartConfig;
use crate::state::AppState;

#[derive(Serialize, utoipa::ToSchema)]
pub struct UploadResponse {
    pub id: Uuid,
    pub filename: String,
    pub original_filename: String,
    pub file_size: i64,
    pub columns: Vec<ColumnData>,
    pub row_count: i64,
    pub chart_configs: Vec<ChartConfig>,
    pub ai_summary: Option<String>,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

impl TryFrom<upload::Model> for UploadResponse {
    type Error = StoredShapeError;

    fn try_from(model: upload::Model) -> Result<Self, Self::Error> {
        Ok(UploadResponse {
            columns: decode_columns(&model.columns)?,
            chart_configs: decode_chart_configs(&model.chart_configs)?,
            id: model.id,
            filename: model.filename,
            original_filename: model.original_filename,
            file_size: model.file_size,
            row_count: model.row_count,
            ai_summary: model.ai_summary,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

/// Multipart body for the upload endpoint.
#[derive(utoipa::ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct SaveChartConfigRequest {
    x_axis: String,
    y_axis: String,
    chart_type: ChartType,
    title: Option<String>,
    #[serde(default)]
    generate_ai_summary: bool,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct SaveChartConfigResponse {
    message: String,
    ai_summary: Option<String>,
    chart_config: ChartConfig,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct DownloadPdfRequest {
    /// Base64 image, optionally as a `data:` URL.
    image: Option<String>,
    title: Option<String>,
}

fn upload_id(raw: &str) -> Result<Uuid, AppError> {
    parse_path_id(raw, "Upload not found")
}

#[utoipa::path(
    post,
    path = "/api/uploads",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Spreadsheet stored and parsed", body = UploadResponse),
        (status = 400, description = "Unsupported file, oversized file or unreadable spreadsheet", body = crate::error::ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Uploads"
)]
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let original_filename = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(multipart_error)?;
        file = Some((original_filename, data.to_vec()));
        break;
    }

    let (original_filename, bytes) =
        file.ok_or_else(|| AppError::Validation("No file provided".to_string()))?;

    let created = state
        .uploads()
        .create(auth_user.id, &original_filename, bytes)
        .await
        .inspect_err(|e| {
            tracing::info!(
                "Uploads | POST /api/uploads | user={} | file={} | rejected: {:?}",
                auth_user.email,
                original_filename,
                e
            );
        })?;

    tracing::info!(
        "Uploads | POST /api/uploads | user={} | file={} | rows={} | res=201",
        auth_user.email,
        created.original_filename,
        created.row_count
    );

    Ok((StatusCode::CREATED, Json(UploadResponse::try_from(created)?)))
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::Validation("File size exceeds upload limit".to_string())
    } else {
        AppError::Validation(e.body_text())
    }
}

#[utoipa::path(
    get,
    path = "/api/uploads",
    responses(
        (status = 200, description = "Caller's uploads, newest first", body = [UploadResponse]),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Uploads"
)]
pub async fn list_uploads(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<Vec<UploadResponse>>, AppError> {
    let uploads = state.uploads().list(auth_user.id).await?;
    let body = uploads
        .into_iter()
        .map(UploadResponse::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    tracing::info!(
        "Uploads | GET /api/uploads | user={} | count={} | res=200",
        auth_user.email,
        body.len()
    );
    Ok(Json(body))
}

#[utoipa::path(
    get,
    path = "/api/uploads/{id}",
    params(
        ("id" = Uuid, Path, description = "Upload ID")
    ),
    responses(
        (status = 200, description = "Upload details", body = UploadResponse),
        (status = 404, description = "Upload not found", body = crate::error::ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Uploads"
)]
pub async fn get_upload(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<UploadResponse>, AppError> {
    let id = upload_id(&id)?;
    let found = state.uploads().get(auth_user.id, id).await?;
    Ok(Json(found.try_into()?))
}

#[utoipa::path(
    post,
    path = "/api/uploads/{id}/config",
    params(
        ("id" = Uuid, Path, description = "Upload ID")
    ),
    request_body = SaveChartConfigRequest,
    responses(
        (status = 200, description = "Chart configuration saved", body = SaveChartConfigResponse),
        (status = 400, description = "Unknown column or invalid chart type", body = crate::error::ErrorResponse),
        (status = 404, description = "Upload not found", body = crate::error::ErrorResponse),
        (status = 502, description = "Summary generation failed", body = crate::error::ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Uploads"
)]
pub async fn save_chart_config(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<SaveChartConfigRequest>,
) -> Result<Json<SaveChartConfigResponse>, AppError> {
    let id = upload_id(&id)?;
    let request = NewChartConfig {
        x_axis: payload.x_axis,
        y_axis: payload.y_axis,
        chart_type: payload.chart_type,
        title: payload.title,
        generate_ai_summary: payload.generate_ai_summary,
    };

    let outcome = state
        .uploads()
        .append_chart_config(auth_user.id, id, request, &state.summarizer)
        .await?;

    tracing::info!(
        "Uploads | POST /api/uploads/{}/config | user={} | type={:?} | summary={} | res=200",
        id,
        auth_user.email,
        outcome.chart_config.chart_type,
        outcome.ai_summary.is_some()
    );

    Ok(Json(SaveChartConfigResponse {
        message: "Chart configuration saved".to_string(),
        ai_summary: outcome.ai_summary,
        chart_config: outcome.chart_config,
    }))
}

#[utoipa::path(
    post,
    path = "/api/uploads/{id}/download/pdf",
    params(
        ("id" = Uuid, Path, description = "Upload ID")
    ),
    request_body = DownloadPdfRequest,
    responses(
        (status = 200, description = "Chart as a PDF attachment", content_type = "application/pdf"),
        (status = 400, description = "Missing or invalid image", body = crate::error::ErrorResponse),
        (status = 404, description = "Upload not found", body = crate::error::ErrorResponse),
        (status = 502, description = "PDF generation failed", body = crate::error::ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Uploads"
)]
pub async fn download_pdf(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<DownloadPdfRequest>,
) -> Result<impl IntoResponse, AppError> {
    let id = upload_id(&id)?;
    state.uploads().get(auth_user.id, id).await?;

    let image = payload
        .image
        .filter(|i| !i.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Chart image is required".to_string()))?;
    let image_bytes = pdf::decode_image_payload(&image)
        .map_err(|e| AppError::Validation(format!("Invalid image data: {}", e)))?;

    let title = payload
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_CHART_TITLE.to_string());

    let render_title = title.clone();
    let document = tokio::task::spawn_blocking(move || pdf::render_chart_pdf(&image_bytes, &render_title))
        .await
        .map_err(|e| AppError::InternalServerError(format!("PDF task failed: {}", e)))??;

    tracing::info!(
        "Uploads | POST /api/uploads/{}/download/pdf | user={} | bytes={} | res=200",
        id,
        auth_user.email,
        document.len()
    );

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", pdf::attachment_name(&title)),
            ),
        ],
        document,
    ))
}
