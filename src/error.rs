use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

use crate::models::upload::StoredShapeError;
use crate::services::pdf::PdfError;
use crate::services::spreadsheet::ParseError;
use crate::services::storage::StorageError;
use crate::services::summary::SummaryError;

/// Body returned by every failing endpoint.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "Only .xls and .xlsx files are supported")]
    pub error: String,
    /// Machine-readable code, e.g. `VALIDATION_ERROR`, `NOT_FOUND`, `ACCOUNT_BLOCKED`.
    #[schema(example = "VALIDATION_ERROR")]
    pub code: &'static str,
}

#[derive(Debug)]
pub enum AppError {
    DatabaseError(sea_orm::DbErr),
    Validation(String),
    Parse(String),
    TokenMissing,
    TokenInvalid,
    InvalidCredentials,
    Forbidden,
    Blocked,
    NotFound(String),
    Conflict(String),
    Downstream(String),
    InternalServerError(String),
}

impl AppError {
    fn status_code_message(self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::DatabaseError(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                )
            }
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg),
            AppError::Parse(msg) => (StatusCode::BAD_REQUEST, "PARSE_ERROR", msg),
            AppError::TokenMissing => (
                StatusCode::UNAUTHORIZED,
                "TOKEN_MISSING",
                "Authentication required".to_string(),
            ),
            AppError::TokenInvalid => (
                StatusCode::UNAUTHORIZED,
                "TOKEN_INVALID",
                "Invalid or expired token".to_string(),
            ),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "Invalid credentials".to_string(),
            ),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                "PERMISSION_DENIED",
                "Admin access required".to_string(),
            ),
            AppError::Blocked => (
                StatusCode::FORBIDDEN,
                "ACCOUNT_BLOCKED",
                "Account has been blocked. Contact administrator.".to_string(),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            AppError::Downstream(msg) => {
                tracing::warn!("Downstream failure: {}", msg);
                (StatusCode::BAD_GATEWAY, "DOWNSTREAM_ERROR", msg)
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal server error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, error) = self.status_code_message();
        (status, Json(ErrorResponse { error, code })).into_response()
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        AppError::DatabaseError(err)
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<ParseError> for AppError {
    fn from(err: ParseError) -> Self {
        AppError::Parse(err.to_string())
    }
}

impl From<SummaryError> for AppError {
    fn from(err: SummaryError) -> Self {
        AppError::Downstream(err.to_string())
    }
}

impl From<PdfError> for AppError {
    fn from(err: PdfError) -> Self {
        AppError::Downstream(err.to_string())
    }
}

impl From<StoredShapeError> for AppError {
    fn from(err: StoredShapeError) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}
