//! Session record shape. Storage lives in
//! [`crate::session`]; this module only defines the value, since sessions
//! are a key-value concept, not a relational row.

use std::time::Duration;

/// A server-side record proving an issued credential has not been revoked.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionRecord {
    /// The user this session belongs to.
    pub user_id: uuid::Uuid,
    /// Opaque random identifier, ≥128 bits of entropy. Never
    /// logged.
    pub session_id: String,
    /// When the session was created.
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Time-to-live; must match the issued credential's expiry.
    pub ttl: Duration,
}
