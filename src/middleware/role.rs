use axum::{extract::Request, middleware::Next, response::Response};

use crate::entities::user::Role;
use crate::error::AppError;
use crate::middleware::auth::AuthUser;

pub async fn require_admin(req: Request, next: Next) -> Result<Response, AppError> {
    let auth_user = req
        .extensions()
        .get::<AuthUser>()
        .ok_or(AppError::TokenMissing)?;

    if auth_user.role != Role::Admin {
        tracing::info!("Access denied: user '{}' is not an admin", auth_user.email);
        return Err(AppError::Forbidden);
    }

    Ok(next.run(req).await)
}
