use crate::choices::ChoiceRow;
use crate::{DbError, DbPool};
use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QuestionRow {
    pub id: i64,
    pub question_text: String,
    pub pub_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl QuestionRow {
    /// A question is visible once its publication time has passed.
    pub fn is_published(&self, now: DateTime<Utc>) -> bool {
        now >= self.pub_date
    }

    /// Voting opens exactly at `pub_date` and closes exactly at `end_date`
    /// (the end boundary is exclusive). A null `end_date` never closes.
    pub fn can_vote(&self, now: DateTime<Utc>) -> bool {
        self.pub_date <= now && self.end_date.is_none_or(|end| now < end)
    }

    /// Published within the last 24 hours. A future `pub_date` is not
    /// "recent" (it is not published at all).
    pub fn was_published_recently(&self, now: DateTime<Utc>) -> bool {
        now - Duration::hours(24) < self.pub_date && self.pub_date <= now
    }
}

pub async fn create_question(
    pool: &DbPool,
    question_text: &str,
    pub_date: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
    created_by: Option<i64>,
) -> Result<QuestionRow, DbError> {
    let row = sqlx::query_as::<_, QuestionRow>(
        "INSERT INTO questions (question_text, pub_date, end_date, created_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         RETURNING id, question_text, pub_date, end_date, created_by, created_at",
    )
    .bind(question_text)
    .bind(pub_date)
    .bind(end_date)
    .bind(created_by)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Create a question together with its choices in one transaction, so a
/// failed choice insert never leaves a question with a partial choice set.
pub async fn create_question_with_choices(
    pool: &DbPool,
    question_text: &str,
    pub_date: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
    created_by: Option<i64>,
    choice_texts: &[&str],
) -> Result<(QuestionRow, Vec<ChoiceRow>), DbError> {
    let mut tx = pool.begin().await?;
    let question = sqlx::query_as::<_, QuestionRow>(
        "INSERT INTO questions (question_text, pub_date, end_date, created_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         RETURNING id, question_text, pub_date, end_date, created_by, created_at",
    )
    .bind(question_text)
    .bind(pub_date)
    .bind(end_date)
    .bind(created_by)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;

    let mut created = Vec::with_capacity(choice_texts.len());
    for choice_text in choice_texts {
        let choice = sqlx::query_as::<_, ChoiceRow>(
            "INSERT INTO choices (question_id, choice_text)
             VALUES (?1, ?2)
             RETURNING id, question_id, choice_text",
        )
        .bind(question.id)
        .bind(choice_text)
        .fetch_one(&mut *tx)
        .await?;
        created.push(choice);
    }
    tx.commit().await?;
    Ok((question, created))
}

pub async fn get_question(pool: &DbPool, id: i64) -> Result<Option<QuestionRow>, DbError> {
    let row = sqlx::query_as::<_, QuestionRow>(
        "SELECT id, question_text, pub_date, end_date, created_by, created_at
         FROM questions
         WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Published questions only, most recently published first.
pub async fn list_published(
    pool: &DbPool,
    now: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<QuestionRow>, DbError> {
    let rows = sqlx::query_as::<_, QuestionRow>(
        "SELECT id, question_text, pub_date, end_date, created_by, created_at
         FROM questions
         WHERE pub_date <= ?1
         ORDER BY pub_date DESC
         LIMIT ?2",
    )
    .bind(now)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
