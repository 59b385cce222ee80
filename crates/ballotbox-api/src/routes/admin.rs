use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use ballotbox_core::AppState;
use ballotbox_db::questions;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::AdminUser;

const MAX_QUESTION_TEXT_LEN: usize = 200;
const MAX_CHOICE_TEXT_LEN: usize = 200;

#[derive(Deserialize)]
pub struct CreatePollRequest {
    pub question_text: String,
    /// Defaults to the creation time when omitted.
    pub pub_date: Option<DateTime<Utc>>,
    /// Null means the poll never closes.
    pub end_date: Option<DateTime<Utc>>,
    pub choices: Vec<String>,
}

/// Administrator-only question creation. Questions are immutable once
/// created.
pub async fn create_poll(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(body): Json<CreatePollRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let text = body.question_text.trim();
    if text.is_empty() {
        return Err(ApiError::BadRequest("question_text must not be empty".into()));
    }
    if text.len() > MAX_QUESTION_TEXT_LEN {
        return Err(ApiError::BadRequest("question_text is too long".into()));
    }

    let choice_texts: Vec<&str> = body
        .choices
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect();
    if choice_texts.is_empty() {
        return Err(ApiError::BadRequest("at least one choice is required".into()));
    }
    if choice_texts.iter().any(|c| c.len() > MAX_CHOICE_TEXT_LEN) {
        return Err(ApiError::BadRequest("choice text is too long".into()));
    }

    let pub_date = body.pub_date.unwrap_or_else(Utc::now);
    if let Some(end) = body.end_date {
        if end <= pub_date {
            return Err(ApiError::BadRequest("end_date must be after pub_date".into()));
        }
    }

    let (question, created) = questions::create_question_with_choices(
        &state.db,
        text,
        pub_date,
        body.end_date,
        Some(admin.user_id),
        &choice_texts,
    )
    .await?;
    tracing::info!(question_id = question.id, by = admin.user_id, "question created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": question.id,
            "question_text": question.question_text,
            "pub_date": question.pub_date.to_rfc3339(),
            "end_date": question.end_date.map(|d| d.to_rfc3339()),
            "choices": created.iter().map(|c| json!({
                "id": c.id,
                "choice_text": c.choice_text,
            })).collect::<Vec<Value>>(),
        })),
    ))
}
