use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use ballotbox_core::{auth, AppState};
use ballotbox_db::{auth_events, sessions, users, DbError};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::{AuthUser, ClientIp};

const MIN_USERNAME_LEN: usize = 3;
const MAX_USERNAME_LEN: usize = 32;
const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 128;

/// Append a line to the auth audit trail. Failures are logged, never fatal
/// to the request that triggered them.
async fn record_auth_event(
    state: &AppState,
    username: &str,
    user_id: Option<i64>,
    action: &str,
    ip_address: Option<&str>,
) {
    if let Err(err) =
        auth_events::record_event(&state.db, username, user_id, action, ip_address).await
    {
        tracing::warn!("failed to write auth event '{}': {}", action, err);
    }
}

fn valid_username(username: &str) -> bool {
    (MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&username.len())
        && username
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-'))
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if !state.config.registration_enabled {
        return Err(ApiError::Forbidden);
    }

    let username = body.username.trim();
    if !valid_username(username) {
        return Err(ApiError::BadRequest(
            "username must be 3-32 characters of letters, digits, '.', '_' or '-'".into(),
        ));
    }
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&body.password.len()) {
        return Err(ApiError::BadRequest(
            "password must be between 8 and 128 characters".into(),
        ));
    }

    let password_hash = auth::hash_password(&body.password)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!(e.to_string())))?;
    // The UNIQUE constraint on usernames is the authority here; a
    // check-then-insert would race with concurrent registrations.
    let user = match users::create_user_as_first_admin(&state.db, username, &password_hash).await {
        Ok(user) => user,
        Err(DbError::Duplicate) => {
            return Err(ApiError::Conflict("username is taken".into()));
        }
        Err(err) => return Err(err.into()),
    };
    tracing::info!(user_id = user.id, username = %user.username, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": user.id,
            "username": user.username,
            "is_admin": user.is_admin,
            "created_at": user.created_at.to_rfc3339(),
        })),
    ))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let submitted = body.username.trim().to_string();

    let user = users::get_user_auth_by_username(&state.db, &submitted).await?;
    let valid = match &user {
        Some(u) => auth::verify_password(&body.password, &u.password_hash).unwrap_or(false),
        None => false,
    };
    let Some(user) = user.filter(|_| valid) else {
        record_auth_event(
            &state,
            &submitted,
            None,
            "auth.login.failure",
            ip.as_deref(),
        )
        .await;
        return Err(ApiError::Unauthorized);
    };

    let token = auth::generate_token();
    let now = Utc::now();
    let expires_at = now + Duration::seconds(state.config.session_ttl_seconds as i64);
    sessions::create_session(
        &state.db,
        &auth::generate_session_id(),
        user.id,
        &auth::token_hash(&token),
        now,
        expires_at,
    )
    .await?;

    record_auth_event(
        &state,
        &user.username,
        Some(user.id),
        "auth.login.success",
        ip.as_deref(),
    )
    .await;

    Ok(Json(json!({
        "token": token,
        "expires_at": expires_at.to_rfc3339(),
        "user": {
            "id": user.id,
            "username": user.username,
            "is_admin": user.is_admin,
        },
    })))
}

pub async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
    ClientIp(ip): ClientIp,
) -> Result<StatusCode, ApiError> {
    sessions::revoke_session(&state.db, &auth.session_id, Utc::now()).await?;

    let username = users::get_user_by_id(&state.db, auth.user_id)
        .await?
        .map(|u| u.username)
        .unwrap_or_default();
    record_auth_event(
        &state,
        &username,
        Some(auth.user_id),
        "auth.logout",
        ip.as_deref(),
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}
