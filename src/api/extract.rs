//! The `AuthUser` extractor: verifies a bearer credential, validates its
//! session, and consumes a rate-limit token — the steps every
//! authenticated handler requires.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::ratelimit::EndpointClass;
use crate::auth::verify_credential;
use crate::error::ApiError;

/// The authenticated caller of a request, after credential and session
/// validation.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    /// The authenticated user's id.
    pub user_id: Uuid,
}

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app = AppState::from_ref(state);

        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let token = header.strip_prefix("Bearer ").ok_or(ApiError::Unauthorized)?;
        let claims = verify_credential(&app.jwt_secret, token)?;

        let valid = app
            .sessions
            .validate_session(claims.user_id, &claims.session_id)
            .await
            .map_err(|_| ApiError::SessionExpired)?;

        if !valid {
            return Err(ApiError::SessionExpired);
        }

        match app.rate_limiter.check(&claims.user_id.to_string(), EndpointClass::Authenticated) {
            Ok(()) => {}
            Err(retry_after) => return Err(ApiError::RateLimitExceeded { retry_after }),
        }

        Ok(Self { user_id: claims.user_id })
    }
}
