//! `/api/v1/auth/*` — credential issuance and session lifecycle.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::extract::AuthUser;
use crate::app::AppState;
use crate::auth::{issue_credential, ratelimit::EndpointClass};
use crate::error::ApiError;
use crate::session::generate_session_id;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// In a full deployment this would be an email/password pair verified
    /// against the `accounts`/`users` tables (out of scope here); this
    /// core accepts a pre-identified `user_id` for the purpose of issuing
    /// a credential and session.
    user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    token: String,
    expires_in: u64,
}

/// `POST /api/v1/auth/login`.
///
/// # Errors
///
/// Returns [`ApiError::RateLimitExceeded`] if the caller's login attempts
/// are throttled, or [`ApiError::InternalError`] if the session store or
/// credential signing fails.
pub async fn login(State(state): State<AppState>, Json(body): Json<LoginRequest>) -> Result<Json<LoginResponse>, ApiError> {
    if let Err(retry_after) = state
        .rate_limiter
        .check(&body.user_id.to_string(), EndpointClass::Authenticated)
    {
        return Err(ApiError::RateLimitExceeded { retry_after });
    }

    let session_id = generate_session_id();
    state
        .sessions
        .store_session(body.user_id, &session_id, state.jwt_expiry)
        .await
        .map_err(|_| ApiError::InternalError)?;

    let token = issue_credential(&state.jwt_secret, body.user_id, &session_id, state.jwt_expiry)?;

    Ok(Json(LoginResponse {
        token,
        expires_in: state.jwt_expiry.as_secs(),
    }))
}

/// `POST /api/v1/auth/logout`: deletes the current session only.
///
/// # Errors
///
/// Returns [`ApiError::InternalError`] if the session store fails.
pub async fn logout(auth: AuthUser, State(state): State<AppState>, Json(body): Json<LogoutRequest>) -> Result<(), ApiError> {
    state
        .sessions
        .delete_session(auth.user_id, &body.session_id)
        .await
        .map_err(|_| ApiError::InternalError)
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    session_id: String,
}

/// `POST /api/v1/auth/logout-all`: revokes every session for the caller.
///
/// # Errors
///
/// Returns [`ApiError::InternalError`] if the session store fails.
pub async fn logout_all(auth: AuthUser, State(state): State<AppState>) -> Result<(), ApiError> {
    state.sessions.revoke_all(auth.user_id).await.map_err(|_| ApiError::InternalError)
}
