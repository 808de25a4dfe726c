//! Crate prelude: shared type aliases threaded through the hub, pipeline,
//! matcher, and position manager.

use std::sync::Arc;

pub use crate::error::ApiError;

/// Fixed-point decimal used for every price, quantity, balance, margin, and
/// P&L computation.
pub type Money = rust_decimal::Decimal;

/// Shared, cloneable Postgres pool handle.
pub type Db = sqlx::PgPool;

/// A single `(symbol, price, timestamp)` update, the unit the Hub, the
/// Matcher, and the Position Manager all consume.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    /// Instrument symbol, e.g. `BTCUSDT`.
    pub symbol: String,
    /// Last traded/quoted price.
    pub price: Money,
    /// Milliseconds since the Unix epoch.
    pub time_ms: i64,
}

/// A message flowing through the broadcast pipeline: either a last-price
/// tick routed to both the Hub and the Matcher, or a market-data shape
/// (depth, trade, forex quote) that only the Hub's WebSocket clients see.
#[derive(Debug, Clone)]
pub enum MarketMessage {
    /// Routed to the Hub and the Matcher.
    Tick(Tick),
    /// Routed to the Hub only; the Matcher only cares about last price.
    Depth(Arc<serde_json::Value>),
}

impl MarketMessage {
    /// The tick inside this message, if it carries one.
    #[must_use]
    pub fn as_tick(&self) -> Option<&Tick> {
        match self {
            Self::Tick(tick) => Some(tick),
            Self::Depth(_) => None,
        }
    }
}
