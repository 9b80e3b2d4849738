use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::entities::user::{self, Entity as User, Role};
use crate::error::AppError;
use crate::utils::password;

pub const SEEDED_ADMIN_NAME: &str = "Admin";

#[derive(Debug, PartialEq, Eq)]
pub enum AdminOutcome {
    Created,
    Promoted,
    AlreadyPresent,
}

fn hash(password: &str) -> Result<String, AppError> {
    password::hash_password(password)
        .map_err(|e| AppError::InternalServerError(format!("Password hash error: {}", e)))
}

async fn find_by_email(db: &DatabaseConnection, email: &str) -> Result<Option<user::Model>, AppError> {
    Ok(User::find()
        .filter(user::Column::Email.eq(email))
        .one(db)
        .await?)
}

async fn insert_admin(
    db: &DatabaseConnection,
    email: &str,
    name: &str,
    password: &str,
) -> Result<user::Model, AppError> {
    let now = chrono::Utc::now().naive_utc();
    let account = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        email: Set(email.to_string()),
        password_hash: Set(hash(password)?),
        role: Set(Role::Admin),
        is_blocked: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
    };
    Ok(account.insert(db).await?)
}

/// Startup seeding. An existing account with this email is left as it is.
pub async fn seed_admin(
    db: &DatabaseConnection,
    email: &str,
    password: &str,
) -> Result<AdminOutcome, AppError> {
    if find_by_email(db, email).await?.is_some() {
        return Ok(AdminOutcome::AlreadyPresent);
    }
    insert_admin(db, email, SEEDED_ADMIN_NAME, password).await?;
    Ok(AdminOutcome::Created)
}

/// Creates the admin, or promotes and unblocks an existing account and resets its password.
pub async fn create_or_promote_admin(
    db: &DatabaseConnection,
    email: &str,
    name: &str,
    password: &str,
) -> Result<AdminOutcome, AppError> {
    let Some(existing) = find_by_email(db, email).await? else {
        insert_admin(db, email, name, password).await?;
        return Ok(AdminOutcome::Created);
    };

    let mut active: user::ActiveModel = existing.into();
    active.role = Set(Role::Admin);
    active.is_blocked = Set(false);
    active.password_hash = Set(hash(password)?);
    active.updated_at = Set(chrono::Utc::now().naive_utc());
    active.update(db).await?;
    Ok(AdminOutcome::Promoted)
}
