use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use axum_extra::extract::cookie::CookieJar;
use ballotbox_core::voting::{self, VoteError};
use ballotbox_core::AppState;
use ballotbox_db::{choices, questions, votes};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::flash::{self, redirect_with_notice};
use crate::middleware::{AuthUser, MaybeAuthUser};

const LISTING_PATH: &str = "/api/polls";

fn question_json(q: &questions::QuestionRow, now: chrono::DateTime<Utc>) -> Value {
    json!({
        "id": q.id,
        "question_text": q.question_text,
        "pub_date": q.pub_date.to_rfc3339(),
        "end_date": q.end_date.map(|d| d.to_rfc3339()),
        "can_vote": q.can_vote(now),
        "was_published_recently": q.was_published_recently(now),
    })
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

/// Published questions, most recent publication first. Future-dated
/// questions never appear.
pub async fn list_polls(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<ListQuery>,
) -> Result<Response, ApiError> {
    let now = Utc::now();
    // A misconfigured cap below 1 must not break clamp's min <= max contract.
    let cap = state.config.listing_limit.max(1);
    let limit = query.limit.unwrap_or(cap).clamp(1, cap);

    let rows = questions::list_published(&state.db, now, limit).await?;
    let listed: Vec<Value> = rows.iter().map(|q| question_json(q, now)).collect();

    let (jar, notice) = flash::take_notice(jar);
    Ok((jar, Json(json!({ "questions": listed, "notice": notice }))).into_response())
}

pub async fn poll_detail(
    State(state): State<AppState>,
    jar: CookieJar,
    MaybeAuthUser(auth): MaybeAuthUser,
    Path(question_id): Path<i64>,
) -> Result<Response, ApiError> {
    let now = Utc::now();

    let Some(question) = questions::get_question(&state.db, question_id).await? else {
        return Ok(redirect_with_notice(
            jar,
            LISTING_PATH,
            &format!("Poll ID {question_id} does not exist."),
        ));
    };
    if !question.can_vote(now) {
        return Ok(redirect_with_notice(
            jar,
            LISTING_PATH,
            &format!("Voting is unavailable for Poll ID {question_id}."),
        ));
    }

    let listed_choices = choices::list_question_choices(&state.db, question.id).await?;
    let my_vote = match &auth {
        Some(user) => votes::get_user_vote(&state.db, user.user_id, question.id)
            .await?
            .map(|v| v.choice_id),
        None => None,
    };

    let (jar, notice) = flash::take_notice(jar);
    Ok((
        jar,
        Json(json!({
            "question": question_json(&question, now),
            "choices": listed_choices.iter().map(|c| json!({
                "id": c.id,
                "choice_text": c.choice_text,
                "selected": my_vote == Some(c.id),
            })).collect::<Vec<Value>>(),
            "notice": notice,
        })),
    )
        .into_response())
}

pub async fn poll_results(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(question_id): Path<i64>,
) -> Result<Response, ApiError> {
    let now = Utc::now();

    let Some(question) = questions::get_question(&state.db, question_id).await? else {
        return Ok(redirect_with_notice(
            jar,
            LISTING_PATH,
            &format!("Poll ID {question_id} does not exist."),
        ));
    };
    if !question.is_published(now) {
        return Ok(redirect_with_notice(
            jar,
            LISTING_PATH,
            &format!("Results for Poll ID {question_id} are unavailable."),
        ));
    }

    let tally = choices::tally_question_choices(&state.db, question.id).await?;

    let (jar, notice) = flash::take_notice(jar);
    Ok((
        jar,
        Json(json!({
            "question": question_json(&question, now),
            "choices": tally.iter().map(|c| json!({
                "id": c.id,
                "choice_text": c.choice_text,
                "votes": c.votes,
            })).collect::<Vec<Value>>(),
            "notice": notice,
        })),
    )
        .into_response())
}

#[derive(Deserialize)]
pub struct VoteForm {
    /// Submitted choice id. Kept as a string so a missing field and a
    /// garbage value fall into the same "no choice selected" path.
    pub choice: Option<String>,
}

pub async fn cast_vote(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(question_id): Path<i64>,
    jar: CookieJar,
    Form(form): Form<VoteForm>,
) -> Result<Response, ApiError> {
    let selected = form
        .choice
        .as_deref()
        .and_then(|raw| raw.trim().parse::<i64>().ok());

    match voting::cast_vote(&state.db, auth.user_id, question_id, selected, Utc::now()).await {
        Ok(receipt) => {
            let notice = if receipt.changed {
                format!("Your vote was changed to '{}'.", receipt.choice_text)
            } else {
                format!("You voted for '{}'.", receipt.choice_text)
            };
            Ok(redirect_with_notice(
                jar,
                &format!("/api/polls/{question_id}/results"),
                &notice,
            ))
        }
        Err(VoteError::QuestionNotFound) => Ok(redirect_with_notice(
            jar,
            LISTING_PATH,
            &format!("Poll ID {question_id} does not exist."),
        )),
        Err(VoteError::NoChoiceSelected) => Ok(redirect_with_notice(
            jar,
            &format!("/api/polls/{question_id}"),
            "You didn't select a choice.",
        )),
        Err(VoteError::Db(e)) => Err(e.into()),
    }
}
