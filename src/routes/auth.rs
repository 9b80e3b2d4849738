use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, SqlErr,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::user::{self, Entity as User};
use crate::error::AppError;
use crate::extractors::json::AppJson;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;
use crate::utils::jwt;
use crate::utils::password::{self, Verification};

#[derive(Deserialize, utoipa::ToSchema)]
pub struct RegisterRequest {
    name: String,
    email: String,
    password: String,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: user::Role,
    pub is_blocked: bool,
    pub created_at: chrono::NaiveDateTime,
}

impl From<user::Model> for UserResponse {
    fn from(user: user::Model) -> Self {
        UserResponse {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            is_blocked: user.is_blocked,
            created_at: user.created_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct AuthResponse {
    message: String,
    token: String,
    user: UserResponse,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

fn issue_token(state: &AppState, user: &user::Model) -> Result<String, AppError> {
    jwt::sign(
        user.id,
        &user.email,
        user.role.clone(),
        &state.config.jwt_secret,
        state.config.jwt_expiration_hours,
    )
    .map_err(|e| AppError::InternalServerError(format!("Token encode error: {}", e)))
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = AuthResponse),
        (status = 400, description = "Invalid name, email or password", body = crate::error::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::error::ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let name = payload.name.trim().to_string();
    let email = normalize_email(&payload.email);

    if name.is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }
    if !is_valid_email(&email) {
        return Err(AppError::Validation("Invalid email address".to_string()));
    }
    if payload.password.is_empty() {
        return Err(AppError::Validation("Password is required".to_string()));
    }

    let existing = User::find()
        .filter(user::Column::Email.eq(&email))
        .one(&state.db)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let password_hash = password::hash_password(&payload.password)
        .map_err(|e| AppError::InternalServerError(format!("Password hash error: {}", e)))?;

    let now = chrono::Utc::now().naive_utc();
    let new_user = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        email: Set(email),
        password_hash: Set(password_hash),
        role: Set(user::Role::User),
        is_blocked: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let created = match new_user.insert(&state.db).await {
        Ok(created) => created,
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    let token = issue_token(&state, &created)?;
    tracing::info!("Auth | POST /api/auth/register | user={} | res=201", created.email);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "User registered successfully".to_string(),
            token,
            user: created.into(),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorResponse),
        (status = 403, description = "Account blocked", body = crate::error::ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let email = normalize_email(&payload.email);

    let account = User::find()
        .filter(user::Column::Email.eq(&email))
        .one(&state.db)
        .await?
        .ok_or_else(|| {
            tracing::info!("Auth | POST /api/auth/login | user={} | res=401 | unknown", email);
            AppError::InvalidCredentials
        })?;

    if account.is_blocked {
        tracing::info!("Auth | POST /api/auth/login | user={} | res=403 | blocked", email);
        return Err(AppError::Blocked);
    }

    let verification = password::verify_password(&payload.password, &account.password_hash)
        .map_err(|e| AppError::InternalServerError(format!("Hash parse error: {}", e)))?;

    let account = match verification {
        Verification::Mismatch => {
            tracing::info!("Auth | POST /api/auth/login | user={} | res=401 | bad password", email);
            return Err(AppError::InvalidCredentials);
        }
        Verification::Match { rehash: None } => account,
        Verification::Match { rehash: Some(new_hash) } => upgrade_hash(&state.db, account, new_hash).await,
    };

    let token = issue_token(&state, &account)?;
    tracing::info!("Auth | POST /api/auth/login | user={} | res=200", account.email);

    Ok(Json(AuthResponse {
        message: "Login successful".to_string(),
        token,
        user: account.into(),
    }))
}

/// Stores a replacement hash. Failing to store it does not fail the login.
async fn upgrade_hash(db: &DatabaseConnection, account: user::Model, new_hash: String) -> user::Model {
    let fallback = account.clone();
    let mut active: user::ActiveModel = account.into();
    active.password_hash = Set(new_hash);
    active.updated_at = Set(chrono::Utc::now().naive_utc());

    match active.update(db).await {
        Ok(updated) => {
            tracing::info!("Auth | upgraded password hash | user={}", updated.email);
            updated
        }
        Err(e) => {
            tracing::warn!("Auth | could not upgrade password hash | user={} | err={}", fallback.email, e);
            fallback
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorResponse),
        (status = 403, description = "Account blocked", body = crate::error::ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Authentication"
)]
pub async fn me(
    State(db): State<DatabaseConnection>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<UserResponse>, AppError> {
    let account = User::find_by_id(auth_user.id)
        .one(&db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(account.into()))
}
