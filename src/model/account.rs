//! Account and balance rows.

use rust_decimal::Decimal;
use uuid::Uuid;

/// `live` trades with real money; `demo` is a paper-trading sandbox account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, serde::Serialize, serde::Deserialize)]
#[sqlx(type_name = "account_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    /// Trades settle against the account's real balance.
    Live,
    /// Trades settle against a balance seeded for practice only.
    Demo,
}

/// Lifecycle status. Deactivated accounts reject new orders and
/// deposits but keep having open contracts managed and liquidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, serde::Serialize, serde::Deserialize)]
#[sqlx(type_name = "account_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    /// Normal operation.
    Active,
    /// Owner-requested closure; open contracts still managed.
    Deactivated,
    /// Platform-initiated hold; open contracts still managed.
    Suspended,
}

/// An account: the unit balances, orders, and contracts are scoped to.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct Account {
    /// Stable identity.
    pub id: Uuid,
    /// Human-visible sequential number.
    pub account_number: i64,
    /// Owning user.
    pub user_id: Uuid,
    /// `live` or `demo`.
    pub kind: AccountKind,
    /// Fixed per account, e.g. `USD`.
    pub currency: String,
    /// Current lifecycle status.
    pub status: AccountStatus,
    /// When the account was provisioned.
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Account {
    /// Deactivated and suspended accounts reject new orders and deposits
    /// but are still eligible for contract management.
    #[must_use]
    pub fn accepts_new_orders(&self) -> bool {
        self.status == AccountStatus::Active
    }
}

/// One row per `(account, currency)` pair; the source of truth for free
/// cash.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct Balance {
    /// Owning account.
    pub account_id: Uuid,
    /// ISO-ish currency code, e.g. `USD`, `BTC`.
    pub currency: String,
    /// Free balance; never stored negative.
    pub amount: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deactivated_account_rejects_new_orders() {
        let account = Account {
            id: Uuid::nil(),
            account_number: 1,
            user_id: Uuid::nil(),
            kind: AccountKind::Live,
            currency: "USD".to_owned(),
            status: AccountStatus::Deactivated,
            created_at: chrono::Utc::now(),
        };

        assert!(!account.accepts_new_orders());
    }
}
