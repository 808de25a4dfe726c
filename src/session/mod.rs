//! The Session Store: authenticates every request that
//! carries a session identifier, backed by Redis with an in-memory
//! degraded-mode fallback.

pub mod memory_store;
pub mod redis_store;

use async_trait::async_trait;
use rand::RngCore;
use std::time::Duration;
use uuid::Uuid;

pub use memory_store::MemoryStore;
pub use redis_store::RedisStore;

/// Authenticates `(user_id, session_id)` pairs.
///
/// Invariants callers must honor: validation is fail-closed on a store
/// error (reject the request); fail-open is permitted only in the
/// explicit degraded mode selected at process start, which logs loudly on
/// every use. Session identifiers are never logged by an implementation
/// of this trait.
#[async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    /// Record a session issued at login, expiring after `ttl`.
    async fn store_session(&self, user_id: Uuid, session_id: &str, ttl: Duration) -> Result<(), SessionStoreError>;

    /// `true` if `(user_id, session_id)` is a live, unexpired session.
    async fn validate_session(&self, user_id: Uuid, session_id: &str) -> Result<bool, SessionStoreError>;

    /// Remove one session, e.g. on logout.
    async fn delete_session(&self, user_id: Uuid, session_id: &str) -> Result<(), SessionStoreError>;

    /// Remove every session for `user_id`, e.g. on password change or a
    /// forced logout.
    async fn revoke_all(&self, user_id: Uuid) -> Result<(), SessionStoreError>;
}

/// A session store operation failed.
#[derive(Debug, thiserror::Error)]
#[error("session store error: {0}")]
pub struct SessionStoreError(pub String);

/// Generate an opaque session identifier with at least 128 bits of
/// entropy, hex-encoded.
#[must_use]
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_session_ids_are_unique_and_long_enough() {
        let a = generate_session_id();
        let b = generate_session_id();
        assert_ne!(a, b);
        // 32 bytes hex-encoded = 64 hex chars = 256 bits, comfortably over 128.
        assert_eq!(a.len(), 64);
    }
}
