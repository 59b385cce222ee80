use crate::{DbError, DbPool};
use chrono::{DateTime, Utc};

/// One line of the authentication audit trail. `username` is whatever
/// credential was submitted, whether or not it resolved to a user.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuthEventRow {
    pub id: i64,
    pub username: String,
    pub user_id: Option<i64>,
    pub action: String,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub async fn record_event(
    pool: &DbPool,
    username: &str,
    user_id: Option<i64>,
    action: &str,
    ip_address: Option<&str>,
) -> Result<AuthEventRow, DbError> {
    let row = sqlx::query_as::<_, AuthEventRow>(
        "INSERT INTO auth_events (username, user_id, action, ip_address, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         RETURNING id, username, user_id, action, ip_address, created_at",
    )
    .bind(username)
    .bind(user_id)
    .bind(action)
    .bind(ip_address)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn list_events(
    pool: &DbPool,
    action: Option<&str>,
    before: Option<i64>,
    limit: i64,
) -> Result<Vec<AuthEventRow>, DbError> {
    let rows = match (action, before) {
        (None, None) => {
            sqlx::query_as::<_, AuthEventRow>(
                "SELECT id, username, user_id, action, ip_address, created_at
                 FROM auth_events
                 ORDER BY id DESC
                 LIMIT ?1",
            )
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
        (Some(action), None) => {
            sqlx::query_as::<_, AuthEventRow>(
                "SELECT id, username, user_id, action, ip_address, created_at
                 FROM auth_events
                 WHERE action = ?1
                 ORDER BY id DESC
                 LIMIT ?2",
            )
            .bind(action)
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
        (None, Some(before)) => {
            sqlx::query_as::<_, AuthEventRow>(
                "SELECT id, username, user_id, action, ip_address, created_at
                 FROM auth_events
                 WHERE id < ?1
                 ORDER BY id DESC
                 LIMIT ?2",
            )
            .bind(before)
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
        (Some(action), Some(before)) => {
            sqlx::query_as::<_, AuthEventRow>(
                "SELECT id, username, user_id, action, ip_address, created_at
                 FROM auth_events
                 WHERE action = ?1
                   AND id < ?2
                 ORDER BY id DESC
                 LIMIT ?3",
            )
            .bind(action)
            .bind(before)
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
    };
    Ok(rows)
}

pub async fn purge_entries_older_than(
    pool: &DbPool,
    older_than: DateTime<Utc>,
    limit: i64,
) -> Result<u64, DbError> {
    let result = sqlx::query(
        "DELETE FROM auth_events
         WHERE id IN (
             SELECT id
             FROM auth_events
             WHERE created_at <= ?1
             ORDER BY created_at ASC
             LIMIT ?2
         )",
    )
    .bind(older_than)
    .bind(limit)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
