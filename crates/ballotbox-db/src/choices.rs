use crate::{DbError, DbPool};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChoiceRow {
    pub id: i64,
    pub question_id: i64,
    pub choice_text: String,
}

/// A choice together with its derived vote count. The count is computed on
/// read from the vote records, never stored.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChoiceTallyRow {
    pub id: i64,
    pub question_id: i64,
    pub choice_text: String,
    pub votes: i64,
}

pub async fn create_choice(
    pool: &DbPool,
    question_id: i64,
    choice_text: &str,
) -> Result<ChoiceRow, DbError> {
    let row = sqlx::query_as::<_, ChoiceRow>(
        "INSERT INTO choices (question_id, choice_text)
         VALUES (?1, ?2)
         RETURNING id, question_id, choice_text",
    )
    .bind(question_id)
    .bind(choice_text)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Resolve a choice id scoped to one question. A choice id that exists but
/// belongs to another question does not resolve.
pub async fn get_question_choice(
    pool: &DbPool,
    question_id: i64,
    choice_id: i64,
) -> Result<Option<ChoiceRow>, DbError> {
    let row = sqlx::query_as::<_, ChoiceRow>(
        "SELECT id, question_id, choice_text
         FROM choices
         WHERE id = ?1 AND question_id = ?2",
    )
    .bind(choice_id)
    .bind(question_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn list_question_choices(
    pool: &DbPool,
    question_id: i64,
) -> Result<Vec<ChoiceRow>, DbError> {
    let rows = sqlx::query_as::<_, ChoiceRow>(
        "SELECT id, question_id, choice_text
         FROM choices
         WHERE question_id = ?1
         ORDER BY id",
    )
    .bind(question_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn tally_question_choices(
    pool: &DbPool,
    question_id: i64,
) -> Result<Vec<ChoiceTallyRow>, DbError> {
    let rows = sqlx::query_as::<_, ChoiceTallyRow>(
        "SELECT c.id, c.question_id, c.choice_text, COUNT(v.id) AS votes
         FROM choices c
         LEFT JOIN votes v ON v.choice_id = c.id
         WHERE c.question_id = ?1
         GROUP BY c.id
         ORDER BY c.id",
    )
    .bind(question_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
