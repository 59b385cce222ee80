use crate::{DbError, DbPool};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VoteRow {
    pub id: i64,
    pub user_id: i64,
    pub question_id: i64,
    pub choice_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// First vote by this user on this question.
    Recorded,
    /// The user already had a vote; its choice was reassigned.
    Changed,
}

pub async fn get_user_vote(
    pool: &DbPool,
    user_id: i64,
    question_id: i64,
) -> Result<Option<VoteRow>, DbError> {
    let row = sqlx::query_as::<_, VoteRow>(
        "SELECT id, user_id, question_id, choice_id, created_at, updated_at
         FROM votes
         WHERE user_id = ?1 AND question_id = ?2",
    )
    .bind(user_id)
    .bind(question_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Record or reassign the user's single vote on a question.
///
/// Runs as one transaction: look up the existing vote, update it if present,
/// insert otherwise. The UNIQUE(user_id, question_id) index backstops the
/// insert path, so two concurrent first votes collapse into one row instead
/// of violating the one-vote invariant.
pub async fn upsert_vote(
    pool: &DbPool,
    user_id: i64,
    question_id: i64,
    choice_id: i64,
    now: DateTime<Utc>,
) -> Result<VoteOutcome, DbError> {
    let mut tx = pool.begin().await?;

    let existing: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM votes WHERE user_id = ?1 AND question_id = ?2")
            .bind(user_id)
            .bind(question_id)
            .fetch_optional(&mut *tx)
            .await?;

    let outcome = if let Some((vote_id,)) = existing {
        sqlx::query("UPDATE votes SET choice_id = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(vote_id)
            .bind(choice_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        VoteOutcome::Changed
    } else {
        sqlx::query(
            "INSERT INTO votes (user_id, question_id, choice_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(user_id, question_id)
             DO UPDATE SET choice_id = excluded.choice_id, updated_at = excluded.updated_at",
        )
        .bind(user_id)
        .bind(question_id)
        .bind(choice_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        VoteOutcome::Recorded
    };

    tx.commit().await?;
    Ok(outcome)
}

pub async fn count_choice_votes(pool: &DbPool, choice_id: i64) -> Result<i64, DbError> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM votes WHERE choice_id = ?1")
        .bind(choice_id)
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}
