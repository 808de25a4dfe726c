//! Bearer credential issuance/verification and per-identity rate limiting.

pub mod ratelimit;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

/// The claims carried by a bearer credential: `user_id` and
/// `session_id` plus the standard expiry claim the Session Store's TTL
/// must match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the authenticated user.
    pub user_id: Uuid,
    /// The session this credential is bound to; validated against the
    /// Session Store on every request.
    pub session_id: String,
    /// Expiry, seconds since epoch.
    pub exp: i64,
}

/// Issue a signed credential for `user_id`/`session_id`, valid for
/// `expiry`.
///
/// # Errors
///
/// Returns `Err` if the claims fail to encode (a `jsonwebtoken` internal
/// error; not expected in practice).
pub fn issue_credential(
    secret: &str,
    user_id: Uuid,
    session_id: &str,
    expiry: std::time::Duration,
) -> Result<String, ApiError> {
    let exp = Utc::now() + ChronoDuration::from_std(expiry).unwrap_or(ChronoDuration::hours(24));
    let claims = Claims {
        user_id,
        session_id: session_id.to_owned(),
        exp: exp.timestamp(),
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).map_err(|err| {
        log::error!("failed to encode credential: {err}");
        ApiError::InternalError
    })
}

/// Verify a credential's signature and expiry, returning its claims.
///
/// # Errors
///
/// Returns [`ApiError::Unauthorized`] if the signature is invalid or the
/// credential has expired. Callers must additionally ask the Session
/// Store whether `(user_id, session_id)` is still live.
pub fn verify_credential(secret: &str, token: &str) -> Result<Claims, ApiError> {
    let mut validation = Validation::default();
    validation.leeway = 0;

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|_| ApiError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn a_credential_round_trips_through_issue_and_verify() {
        let user_id = Uuid::new_v4();
        let token = issue_credential("a secret at least 32 bytes long!", user_id, "session-abc", Duration::from_secs(3600))
            .expect("issue");

        let claims = verify_credential("a secret at least 32 bytes long!", &token).expect("verify");
        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.session_id, "session-abc");
    }

    #[test]
    fn a_credential_signed_with_a_different_secret_is_rejected() {
        let user_id = Uuid::new_v4();
        let token = issue_credential("secret-one-at-least-32-bytes!!!", user_id, "session-abc", Duration::from_secs(3600))
            .expect("issue");

        assert!(verify_credential("secret-two-at-least-32-bytes!!!", &token).is_err());
    }

    #[test]
    fn an_expired_credential_is_rejected() {
        let user_id = Uuid::new_v4();
        let token = issue_credential(
            "a secret at least 32 bytes long!",
            user_id,
            "session-abc",
            Duration::from_secs(0),
        )
        .expect("issue");

        std::thread::sleep(Duration::from_millis(1100));
        assert!(verify_credential("a secret at least 32 bytes long!", &token).is_err());
    }
}
