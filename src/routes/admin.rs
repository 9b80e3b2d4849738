use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use uuid::Uuid;

use crate::entities::upload::{self, Entity as Upload};
use crate::entities::user::{self, Entity as User};
use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::pagination::{PaginatedResponse, Pagination};
use crate::routes::auth::UserResponse;
use crate::routes::parse_path_id;
use crate::state::AppState;

#[derive(Serialize, utoipa::ToSchema)]
pub struct StatsResponse {
    pub total_users: u64,
    pub total_uploads: u64,
    pub total_admins: u64,
    pub total_blocked_users: u64,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

fn user_id(raw: &str) -> Result<Uuid, AppError> {
    parse_path_id(raw, "User not found")
}

async fn find_user(db: &DatabaseConnection, id: Uuid) -> Result<user::Model, AppError> {
    User::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

#[utoipa::path(
    get,
    path = "/api/admin/stats",
    responses(
        (status = 200, description = "Platform totals", body = StatsResponse),
        (status = 403, description = "Admin access required", body = crate::error::ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Admin"
)]
pub async fn stats(State(db): State<DatabaseConnection>) -> Result<Json<StatsResponse>, AppError> {
    let total_users = User::find().count(&db).await?;
    let total_uploads = Upload::find().count(&db).await?;
    let total_admins = User::find()
        .filter(user::Column::Role.eq(user::Role::Admin))
        .count(&db)
        .await?;
    let total_blocked_users = User::find()
        .filter(user::Column::IsBlocked.eq(true))
        .count(&db)
        .await?;

    Ok(Json(StatsResponse {
        total_users,
        total_uploads,
        total_admins,
        total_blocked_users,
    }))
}

#[utoipa::path(
    get,
    path = "/api/admin/users",
    params(
        Pagination
    ),
    responses(
        (status = 200, description = "Users, newest first", body = PaginatedResponse<UserResponse>),
        (status = 403, description = "Admin access required", body = crate::error::ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Admin"
)]
pub async fn list_users(
    State(db): State<DatabaseConnection>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<PaginatedResponse<UserResponse>>, AppError> {
    let (page, limit) = pagination.resolve();

    let paginator = User::find()
        .order_by_desc(user::Column::CreatedAt)
        .paginate(&db, limit);
    let total_items = paginator.num_items().await?;
    let users = paginator.fetch_page(page).await?;

    Ok(Json(PaginatedResponse::new(
        users.into_iter().map(UserResponse::from).collect(),
        total_items,
        page + 1,
        limit,
    )))
}

async fn set_blocked(
    db: &DatabaseConnection,
    id: Uuid,
    blocked: bool,
) -> Result<user::Model, AppError> {
    let account = find_user(db, id).await?;
    let mut active: user::ActiveModel = account.into();
    active.is_blocked = Set(blocked);
    active.updated_at = Set(chrono::Utc::now().naive_utc());
    Ok(active.update(db).await?)
}

#[utoipa::path(
    patch,
    path = "/api/admin/users/{id}/block",
    params(
        ("id" = Uuid, Path, description = "User ID to block")
    ),
    responses(
        (status = 200, description = "User blocked", body = UserResponse),
        (status = 400, description = "Cannot block yourself", body = crate::error::ErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Admin"
)]
pub async fn block_user(
    State(db): State<DatabaseConnection>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    let id = user_id(&id)?;
    if id == auth_user.id {
        return Err(AppError::Validation("You cannot block your own account".to_string()));
    }

    let updated = set_blocked(&db, id, true).await?;
    tracing::info!(
        "Admin | PATCH /api/admin/users/{}/block | by={} | res=200",
        id,
        auth_user.email
    );
    Ok(Json(updated.into()))
}

#[utoipa::path(
    patch,
    path = "/api/admin/users/{id}/unblock",
    params(
        ("id" = Uuid, Path, description = "User ID to unblock")
    ),
    responses(
        (status = 200, description = "User unblocked", body = UserResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Admin"
)]
pub async fn unblock_user(
    State(db): State<DatabaseConnection>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    let id = user_id(&id)?;
    let updated = set_blocked(&db, id, false).await?;
    tracing::info!(
        "Admin | PATCH /api/admin/users/{}/unblock | by={} | res=200",
        id,
        auth_user.email
    );
    Ok(Json(updated.into()))
}

#[utoipa::path(
    delete,
    path = "/api/admin/users/{id}",
    params(
        ("id" = Uuid, Path, description = "User ID to delete")
    ),
    responses(
        (status = 200, description = "User and their uploads deleted", body = MessageResponse),
        (status = 400, description = "Cannot delete yourself", body = crate::error::ErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Admin"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = user_id(&id)?;
    if id == auth_user.id {
        return Err(AppError::Validation("You cannot delete your own account".to_string()));
    }

    let txn = state.db.begin().await?;
    let account = User::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let filenames: Vec<String> = Upload::find()
        .select_only()
        .column(upload::Column::Filename)
        .filter(upload::Column::OwnerId.eq(id))
        .into_tuple()
        .all(&txn)
        .await?;

    let removed = Upload::delete_many()
        .filter(upload::Column::OwnerId.eq(id))
        .exec(&txn)
        .await?;
    User::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    for filename in &filenames {
        if let Err(e) = state.store.delete(filename).await {
            tracing::warn!("Admin | could not remove stored file {} | err={}", filename, e);
        }
    }

    tracing::info!(
        "Admin | DELETE /api/admin/users/{} | user={} | uploads={} | by={} | res=200",
        id,
        account.email,
        removed.rows_affected,
        auth_user.email
    );

    Ok(Json(MessageResponse {
        message: "User and associated data deleted successfully".to_string(),
    }))
}
