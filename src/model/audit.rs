//! Append-only audit log. Rows are never mutated.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// One append-only audit entry.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct AuditLogEntry {
    /// Stable identity.
    pub id: Uuid,
    /// Acting user, if the action was user-initiated.
    pub user_id: Option<Uuid>,
    /// What happened, e.g. `pending_order.executed`, `contract.liquidated`.
    pub action: String,
    /// What kind of resource `resource_id` refers to, e.g. `pending_order`.
    pub resource_kind: String,
    /// The affected resource's id.
    pub resource_id: Uuid,
    /// Free-form structured detail (failure reason, shortfall amount, …).
    pub metadata: serde_json::Value,
    /// When the entry was appended.
    pub created_at: DateTime<Utc>,
}
