//! Transaction ledger rows.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// What kind of balance movement a [`Transaction`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, serde::Serialize, serde::Deserialize)]
#[sqlx(type_name = "transaction_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// External deposit (owned by the out-of-scope payments integration;
    /// this crate never constructs one, only reserves the variant).
    Deposit,
    /// External withdrawal (same caveat as `Deposit`).
    Withdrawal,
    /// Balance debit/credit from a matcher order fill.
    OrderFill,
    /// Free balance moved into used margin when a contract opens.
    MarginLock,
    /// Used margin returned to free balance when a contract closes.
    MarginRelease,
    /// A user-initiated contract close settling realized P&L.
    PositionClose,
    /// Realized loss beyond the released margin at liquidation, clamped so
    /// balance never goes negative.
    LiquidationShortfall,
}

/// An append-only record of one balance movement against an account.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct Transaction {
    /// Stable identity.
    pub id: Uuid,
    /// Human-visible sequential number.
    pub transaction_number: i64,
    /// Owning account.
    pub account_id: Uuid,
    /// What kind of movement this is.
    pub kind: TransactionKind,
    /// Currency the amount is denominated in.
    pub currency: String,
    /// Signed amount; positive credits the account, negative debits it.
    pub amount: Decimal,
    /// The order or contract this transaction originated from, if any.
    pub reference_id: Option<Uuid>,
    /// When the transaction was recorded.
    pub created_at: DateTime<Utc>,
}
