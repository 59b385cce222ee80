use crate::{DbError, DbPool};
use chrono::{DateTime, Utc};

fn normalize_username(username: &str) -> String {
    username.trim().to_string()
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserAuthRow {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

pub async fn create_user(
    pool: &DbPool,
    username: &str,
    password_hash: &str,
    is_admin: bool,
) -> Result<UserRow, DbError> {
    let row = sqlx::query_as::<_, UserRow>(
        "INSERT INTO users (username, password_hash, is_admin, created_at)
         VALUES (?1, ?2, ?3, ?4)
         RETURNING id, username, is_admin, created_at",
    )
    .bind(normalize_username(username))
    .bind(password_hash)
    .bind(is_admin)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Create a user and atomically promote to admin if this is the first user.
/// Uses a transaction to prevent registration races.
pub async fn create_user_as_first_admin(
    pool: &DbPool,
    username: &str,
    password_hash: &str,
) -> Result<UserRow, DbError> {
    let mut tx = pool.begin().await?;
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(&mut *tx)
        .await?;
    let row = sqlx::query_as::<_, UserRow>(
        "INSERT INTO users (username, password_hash, is_admin, created_at)
         VALUES (?1, ?2, ?3, ?4)
         RETURNING id, username, is_admin, created_at",
    )
    .bind(normalize_username(username))
    .bind(password_hash)
    .bind(count.0 == 0)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(row)
}

pub async fn get_user_by_id(pool: &DbPool, id: i64) -> Result<Option<UserRow>, DbError> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, username, is_admin, created_at
         FROM users
         WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn get_user_auth_by_username(
    pool: &DbPool,
    username: &str,
) -> Result<Option<UserAuthRow>, DbError> {
    let row = sqlx::query_as::<_, UserAuthRow>(
        "SELECT id, username, password_hash, is_admin, created_at
         FROM users
         WHERE username = ?1",
    )
    .bind(normalize_username(username))
    .fetch_optional(pool)
    .await?;
    Ok(row)
}
