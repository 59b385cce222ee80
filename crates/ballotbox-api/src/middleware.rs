use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{header, request::Parts},
};
use ballotbox_core::AppState;
use chrono::Utc;

use crate::error::ApiError;

pub struct AuthUser {
    pub user_id: i64,
    pub session_id: String,
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

async fn validate_auth(parts: &Parts, state: &AppState) -> Result<AuthUser, ApiError> {
    let token = bearer_token(parts).ok_or(ApiError::Unauthorized)?;
    let digest = ballotbox_core::auth::token_hash(token);

    let session =
        ballotbox_db::sessions::get_active_session_by_token_hash(&state.db, &digest, Utc::now())
            .await
            .map_err(|_| ApiError::Internal(anyhow::anyhow!("database error")))?
            .ok_or(ApiError::Unauthorized)?;

    Ok(AuthUser {
        user_id: session.user_id,
        session_id: session.id,
    })
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        validate_auth(parts, state).await
    }
}

/// Like `AuthUser`, but anonymous requests pass through. Detail pages use it
/// to mark the requester's existing vote when a valid token is presented.
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthUser(validate_auth(parts, state).await.ok()))
    }
}

/// Client address for the audit trail: first hop of `x-forwarded-for` when
/// present, else the connection's peer address.
pub struct ClientIp(pub Option<String>);

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|raw| raw.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        let ip = forwarded.or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        });

        Ok(ClientIp(ip))
    }
}

/// Extractor that requires the authenticated user to be an administrator.
pub struct AdminUser {
    pub user_id: i64,
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = validate_auth(parts, state).await?;

        let user = ballotbox_db::users::get_user_by_id(&state.db, auth.user_id)
            .await
            .map_err(|_| ApiError::Internal(anyhow::anyhow!("database error")))?
            .ok_or(ApiError::Unauthorized)?;

        if !user.is_admin {
            return Err(ApiError::Forbidden);
        }

        Ok(AdminUser { user_id: user.id })
    }
}
