//! Executed orders — immutable fill records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::pending_order::{ExecutionType, ProductType, Side};

/// Which counterparty absorbed the fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, serde::Serialize, serde::Deserialize)]
#[sqlx(type_name = "execution_strategy", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    /// Executed internally against the platform (the default).
    BBook,
    /// Routed to an external liquidity provider and recorded for
    /// reconciliation.
    ABook,
}

/// An immutable record of a fill. Never mutated after insert.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct Order {
    /// Stable identity.
    pub id: Uuid,
    /// Human-visible sequential number.
    pub order_number: i64,
    /// The pending order this fill settled, if any (orders can also arise
    /// from immediate market execution outside the matcher).
    pub pending_order_id: Option<Uuid>,
    /// Owning account.
    pub account_id: Uuid,
    /// Instrument traded.
    pub symbol: String,
    /// Buy or sell.
    pub side: Side,
    /// Limit or stop-limit (the type that triggered this fill).
    pub execution_type: ExecutionType,
    /// Filled quantity.
    pub quantity: Decimal,
    /// Price the fill executed at.
    pub fill_price: Decimal,
    /// `quantity * fill_price`.
    pub notional: Decimal,
    /// Fee charged, in the source currency.
    pub fee: Decimal,
    /// Leverage used, if any.
    pub leverage: Option<Decimal>,
    /// Spot or cfd.
    pub product_type: ProductType,
    /// Which counterparty absorbed the fill.
    pub execution_strategy: ExecutionStrategy,
    /// When the fill executed.
    pub executed_at: DateTime<Utc>,
}
