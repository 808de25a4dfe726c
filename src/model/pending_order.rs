//! Pending (limit/stop-limit) orders.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, serde::Serialize, serde::Deserialize)]
#[sqlx(type_name = "order_side", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Buy.
    Buy,
    /// Sell.
    Sell,
}

impl Side {
    /// +1 for buy, -1 for sell — the sign P&L and trigger comparisons use.
    #[must_use]
    pub fn sign(self) -> Decimal {
        match self {
            Self::Buy => Decimal::ONE,
            Self::Sell => Decimal::NEGATIVE_ONE,
        }
    }

    /// The other side.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

/// How a pending order's trigger is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, serde::Serialize, serde::Deserialize)]
#[sqlx(type_name = "execution_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ExecutionType {
    /// Fires when price crosses the limit price on the favorable side.
    Limit,
    /// Fires when price crosses the trigger price on the adverse side,
    /// then fills at the limit price.
    StopLimit,
}

/// Spot trades settle balances directly; cfd trades open a leveraged
/// [`crate::model::Contract`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, serde::Serialize, serde::Deserialize)]
#[sqlx(type_name = "product_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    /// Immediate ownership transfer; no leverage, no margin.
    Spot,
    /// Leveraged contract-for-difference; opens a [`crate::model::Contract`].
    Cfd,
}

/// Terminal states a pending order can settle into; the transition from
/// `Pending` is monotonic and irreversible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, serde::Serialize, serde::Deserialize)]
#[sqlx(type_name = "pending_order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PendingOrderStatus {
    /// Awaiting a price trigger.
    Pending,
    /// Filled; an `orders` row (and, for cfd, a `contracts` row) exists.
    Executed,
    /// Cancelled by its owner while still pending.
    Cancelled,
    /// Expired by policy before triggering (reserved for a future TTL).
    Expired,
    /// Terminal failure (insufficient funds/margin, etc.); failed orders
    /// are not automatically retried.
    Failed,
}

/// A limit or stop-limit order awaiting a price trigger.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct PendingOrder {
    /// Stable identity.
    pub id: Uuid,
    /// Human-visible sequential number.
    pub order_number: i64,
    /// Owning account.
    pub account_id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Instrument this order trades.
    pub symbol: String,
    /// Buy or sell.
    pub side: Side,
    /// Limit or stop-limit.
    pub execution_type: ExecutionType,
    /// Order size, in instrument units.
    pub quantity: Decimal,
    /// Price that arms a stop-limit order; unused for plain limit orders.
    pub trigger_price: Option<Decimal>,
    /// Limit price used both as the limit-order trigger and the stop-limit
    /// fill price.
    pub limit_price: Option<Decimal>,
    /// Requested leverage; `None` for spot orders.
    pub leverage: Option<Decimal>,
    /// Spot or cfd.
    pub product_type: ProductType,
    /// Current lifecycle status.
    pub status: PendingOrderStatus,
    /// When this row was created; the matcher's FIFO tie-break key.
    pub created_at: DateTime<Utc>,
    /// Last status transition time.
    pub updated_at: DateTime<Utc>,
    /// Fill price recorded at execution, if executed.
    pub executed_price: Option<Decimal>,
    /// Execution timestamp, if executed.
    pub executed_at: Option<DateTime<Utc>>,
    /// Human-readable reason recorded alongside a `Failed`/`Cancelled`
    /// transition.
    pub reason: Option<String>,
}

impl PendingOrder {
    /// Evaluate this order's trigger condition against `last_price`.
    /// Returns the price the order should fill at if it fires, or `None`
    /// if it remains pending.
    #[must_use]
    pub fn evaluate(&self, last_price: Decimal) -> Option<Decimal> {
        if self.status != PendingOrderStatus::Pending {
            return None;
        }

        match (self.execution_type, self.side) {
            (ExecutionType::Limit, Side::Buy) => {
                let limit = self.limit_price?;
                (last_price <= limit).then_some(limit)
            }
            (ExecutionType::Limit, Side::Sell) => {
                let limit = self.limit_price?;
                (last_price >= limit).then_some(limit)
            }
            (ExecutionType::StopLimit, Side::Buy) => {
                let trigger = self.trigger_price?;
                (last_price >= trigger).then_some(self.limit_price.unwrap_or(last_price))
            }
            (ExecutionType::StopLimit, Side::Sell) => {
                let trigger = self.trigger_price?;
                (last_price <= trigger).then_some(self.limit_price.unwrap_or(last_price))
            }
        }
    }

    /// Placement-time trigger validation:
    /// a buy stop-limit must arm above the last known market price, a sell
    /// stop-limit must arm below it. Plain limit orders have no such
    /// constraint.
    ///
    /// # Errors
    ///
    /// Returns an error message suitable for `ApiError::ValidationError`
    /// when the trigger is on the wrong side of the market.
    pub fn validate_trigger(
        execution_type: ExecutionType,
        side: Side,
        trigger_price: Option<Decimal>,
        last_price: Decimal,
    ) -> Result<(), &'static str> {
        if execution_type != ExecutionType::StopLimit {
            return Ok(());
        }

        let Some(trigger_price) = trigger_price else {
            return Err("stop_limit orders require a trigger_price");
        };

        match side {
            Side::Buy if trigger_price <= last_price => {
                Err("buy stop_limit trigger_price must be strictly above the last price")
            }
            Side::Sell if trigger_price >= last_price => {
                Err("sell stop_limit trigger_price must be strictly below the last price")
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn order(
        execution_type: ExecutionType,
        side: Side,
        trigger_price: Option<Decimal>,
        limit_price: Option<Decimal>,
    ) -> PendingOrder {
        PendingOrder {
            id: Uuid::nil(),
            order_number: 1,
            account_id: Uuid::nil(),
            user_id: Uuid::nil(),
            symbol: "BTCUSDT".to_owned(),
            side,
            execution_type,
            quantity: dec!(0.01),
            trigger_price,
            limit_price,
            leverage: None,
            product_type: ProductType::Spot,
            status: PendingOrderStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            executed_price: None,
            executed_at: None,
            reason: None,
        }
    }

    #[test]
    fn limit_buy_fires_at_or_below_limit_price() {
        let o = order(ExecutionType::Limit, Side::Buy, None, Some(dec!(45000)));
        assert_eq!(o.evaluate(dec!(45100)), None);
        assert_eq!(o.evaluate(dec!(45000)), Some(dec!(45000)));
        assert_eq!(o.evaluate(dec!(44000)), Some(dec!(45000)));
    }

    #[test]
    fn limit_sell_fires_at_or_above_limit_price() {
        let o = order(ExecutionType::Limit, Side::Sell, None, Some(dec!(45000)));
        assert_eq!(o.evaluate(dec!(44900)), None);
        assert_eq!(o.evaluate(dec!(45000)), Some(dec!(45000)));
    }

    #[test]
    fn stop_limit_fills_at_declared_limit_not_tick_price() {
        let o = order(
            ExecutionType::StopLimit,
            Side::Buy,
            Some(dec!(45500)),
            Some(dec!(45600)),
        );
        // Tick overshoots the trigger; fill price is still the declared limit.
        assert_eq!(o.evaluate(dec!(46000)), Some(dec!(45600)));
    }

    #[test]
    fn buy_stop_limit_below_market_is_rejected_at_placement() {
        let result =
            PendingOrder::validate_trigger(ExecutionType::StopLimit, Side::Buy, Some(dec!(45000)), dec!(45000));
        assert!(result.is_err());
    }

    #[test]
    fn sell_stop_limit_above_market_is_rejected_at_placement() {
        let result = PendingOrder::validate_trigger(
            ExecutionType::StopLimit,
            Side::Sell,
            Some(dec!(45500)),
            dec!(45000),
        );
        assert!(result.is_err());
    }
}
