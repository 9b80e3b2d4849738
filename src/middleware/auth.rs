use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::user::{self, Entity as User};
use crate::error::AppError;
use crate::state::AppState;
use crate::utils::jwt;

/// Caller identity taken from a verified bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: user::Role,
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::TokenMissing)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::TokenMissing)?;

    let claims = jwt::verify(token, &state.config.jwt_secret).map_err(|e| {
        tracing::debug!("JWT decode error: {}", e);
        AppError::TokenInvalid
    })?;

    let account = User::find_by_id(claims.sub)
        .one(&state.db)
        .await?
        .ok_or(AppError::TokenInvalid)?;

    if account.is_blocked {
        tracing::info!("Auth | blocked account rejected | user={}", account.email);
        return Err(AppError::Blocked);
    }

    req.extensions_mut().insert(AuthUser {
        id: claims.sub,
        email: claims.email,
        role: claims.role,
    });

    Ok(next.run(req).await)
}
