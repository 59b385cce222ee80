use ballotbox_db::votes::VoteOutcome;
use ballotbox_db::{choices, questions, votes, DbError, DbPool};
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VoteError {
    /// The question id does not resolve. Callers send the voter back to the
    /// listing page.
    #[error("question not found")]
    QuestionNotFound,
    /// No `choice` field was submitted, or the id does not belong to this
    /// question. Callers send the voter back to the detail page.
    #[error("no choice selected")]
    NoChoiceSelected,
    #[error(transparent)]
    Db(#[from] DbError),
}

#[derive(Debug, Clone)]
pub struct VoteReceipt {
    pub question_id: i64,
    pub choice_id: i64,
    pub choice_text: String,
    /// True when an earlier vote by the same user was reassigned.
    pub changed: bool,
}

/// Record one authenticated user's vote on a question.
///
/// Resolves the question, then the selected choice within that question's
/// choice set, then upserts the user's single vote row. The upsert itself is
/// transactional (see `ballotbox_db::votes::upsert_vote`).
pub async fn cast_vote(
    db: &DbPool,
    user_id: i64,
    question_id: i64,
    selected_choice: Option<i64>,
    now: DateTime<Utc>,
) -> Result<VoteReceipt, VoteError> {
    let question = questions::get_question(db, question_id)
        .await?
        .ok_or(VoteError::QuestionNotFound)?;

    let choice_id = selected_choice.ok_or(VoteError::NoChoiceSelected)?;
    let choice = choices::get_question_choice(db, question.id, choice_id)
        .await?
        .ok_or(VoteError::NoChoiceSelected)?;

    let outcome = votes::upsert_vote(db, user_id, question.id, choice.id, now).await?;
    tracing::debug!(
        user_id,
        question_id = question.id,
        choice_id = choice.id,
        changed = outcome == VoteOutcome::Changed,
        "vote stored"
    );

    Ok(VoteReceipt {
        question_id: question.id,
        choice_id: choice.id,
        choice_text: choice.choice_text,
        changed: outcome == VoteOutcome::Changed,
    })
}
