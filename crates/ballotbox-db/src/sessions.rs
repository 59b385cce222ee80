use crate::{DbError, DbPool};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuthSessionRow {
    pub id: String,
    pub user_id: i64,
    pub token_hash: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

pub async fn create_session(
    pool: &DbPool,
    id: &str,
    user_id: i64,
    token_hash: &str,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Result<AuthSessionRow, DbError> {
    let row = sqlx::query_as::<_, AuthSessionRow>(
        "INSERT INTO auth_sessions (id, user_id, token_hash, issued_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         RETURNING id, user_id, token_hash, issued_at, expires_at, revoked_at",
    )
    .bind(id)
    .bind(user_id)
    .bind(token_hash)
    .bind(issued_at)
    .bind(expires_at)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Resolve a presented bearer token (by digest) to a live session.
pub async fn get_active_session_by_token_hash(
    pool: &DbPool,
    token_hash: &str,
    now: DateTime<Utc>,
) -> Result<Option<AuthSessionRow>, DbError> {
    let row = sqlx::query_as::<_, AuthSessionRow>(
        "SELECT id, user_id, token_hash, issued_at, expires_at, revoked_at
         FROM auth_sessions
         WHERE token_hash = ?1
           AND revoked_at IS NULL
           AND expires_at > ?2",
    )
    .bind(token_hash)
    .bind(now)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn revoke_session(
    pool: &DbPool,
    session_id: &str,
    now: DateTime<Utc>,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE auth_sessions
         SET revoked_at = ?2
         WHERE id = ?1
           AND revoked_at IS NULL",
    )
    .bind(session_id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn purge_expired_sessions(
    pool: &DbPool,
    now: DateTime<Utc>,
    limit: i64,
) -> Result<u64, DbError> {
    let result = sqlx::query(
        "DELETE FROM auth_sessions
         WHERE id IN (
             SELECT id FROM auth_sessions
             WHERE expires_at <= ?1
                OR revoked_at IS NOT NULL
             LIMIT ?2
         )",
    )
    .bind(now)
    .bind(limit)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn session_lookup_respects_expiry_and_revocation() {
        let db = crate::test_pool().await;
        let user = crate::users::create_user(&db, "tester", "hash", false)
            .await
            .expect("create user");
        let now = Utc::now();
        let expires = now + chrono::Duration::days(30);

        create_session(&db, "sess-1", user.id, "token-hash-1", now, expires)
            .await
            .expect("create session");

        let active = get_active_session_by_token_hash(&db, "token-hash-1", now)
            .await
            .expect("active lookup");
        assert!(active.is_some());

        let unknown = get_active_session_by_token_hash(&db, "wrong-hash", now)
            .await
            .expect("unknown lookup");
        assert!(unknown.is_none());

        let expired = get_active_session_by_token_hash(&db, "token-hash-1", expires)
            .await
            .expect("expired lookup");
        assert!(expired.is_none());

        let revoked = revoke_session(&db, "sess-1", now).await.expect("revoke");
        assert!(revoked);
        let after_revoke = get_active_session_by_token_hash(&db, "token-hash-1", now)
            .await
            .expect("revoked lookup");
        assert!(after_revoke.is_none());

        let purged = purge_expired_sessions(&db, now, 100).await.expect("purge");
        assert_eq!(purged, 1);
    }
}
