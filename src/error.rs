//! Main crate error and its mapping onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Canonical error kinds surfaced to API clients.
///
/// The Order Matcher and Position Manager never let these escape
/// synchronously to a client; they log, write an audit entry, and record a
/// terminal status instead. Only the `api`
/// handlers convert an `ApiError` into an HTTP response.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    /// Malformed payload, bad UUID, missing required field.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Structurally valid payload that violates a business rule.
    #[error("validation error: {0}")]
    ValidationError(String),
    /// Missing or invalid bearer credential.
    #[error("unauthorized")]
    Unauthorized,
    /// Credential valid but its session has expired.
    #[error("session expired")]
    SessionExpired,
    /// Credential valid but its session was explicitly revoked.
    #[error("session revoked")]
    SessionRevoked,
    /// Resource belongs to another user or account.
    #[error("forbidden")]
    Forbidden,
    /// Resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Resource is not in a state that allows the requested transition.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Account cannot support the requested trade (spot).
    #[error("insufficient funds")]
    InsufficientFunds,
    /// Account cannot support the requested trade (leveraged).
    #[error("insufficient margin")]
    InsufficientMargin,
    /// Token bucket empty; `retry_after` is a hint in seconds.
    #[error("rate limit exceeded")]
    RateLimitExceeded {
        /// Seconds the caller should wait before retrying.
        retry_after: u64,
    },
    /// Transient infrastructure failure; safe to retry.
    #[error("database error")]
    DatabaseError,
    /// Transient upstream-collaborator failure; safe to retry.
    #[error("upstream error")]
    UpstreamError,
    /// Unexpected; retry may or may not help.
    #[error("internal error")]
    InternalError,
}

impl ApiError {
    /// The advisory error name, used verbatim in the JSON body.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::ValidationError(_) => "validation_error",
            Self::Unauthorized => "unauthorized",
            Self::SessionExpired => "session_expired",
            Self::SessionRevoked => "session_revoked",
            Self::Forbidden => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::InsufficientFunds => "insufficient_funds",
            Self::InsufficientMargin => "insufficient_margin",
            Self::RateLimitExceeded { .. } => "rate_limit_exceeded",
            Self::DatabaseError => "database_error",
            Self::UpstreamError => "upstream_error",
            Self::InternalError => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized | Self::SessionExpired | Self::SessionRevoked => {
                StatusCode::UNAUTHORIZED
            }
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InsufficientFunds | Self::InsufficientMargin => StatusCode::UNPROCESSABLE_ENTITY,
            Self::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::DatabaseError | Self::UpstreamError => StatusCode::SERVICE_UNAVAILABLE,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let retry_after = match &self {
            Self::RateLimitExceeded { retry_after } => Some(*retry_after),
            _ => None,
        };
        let body = ErrorBody {
            success: false,
            error: self.kind(),
            message: self.to_string(),
        };

        let mut response = (status, axum::Json(body)).into_response();
        if let Some(seconds) = retry_after {
            if let Ok(value) = seconds.to_string().parse() {
                response.headers_mut().insert("retry-after", value);
            }
        }
        response
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        log::error!("database error: {err}");
        Self::DatabaseError
    }
}

impl From<redis::RedisError> for ApiError {
    fn from(err: redis::RedisError) -> Self {
        log::error!("redis error: {err}");
        Self::DatabaseError
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(_value: serde_json::Error) -> Self {
        Self::InvalidRequest("malformed JSON payload".to_owned())
    }
}

impl From<uuid::Error> for ApiError {
    fn from(_value: uuid::Error) -> Self {
        Self::InvalidRequest("malformed identifier".to_owned())
    }
}
