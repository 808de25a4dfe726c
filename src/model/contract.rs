//! Open leveraged positions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::pending_order::Side;

/// A contract's position side reuses [`Side`]'s buy/sell semantics and sign
/// convention.
pub type PositionSide = Side;

/// Lifecycle status; `Open -> {Closed, Liquidated}` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, serde::Serialize, serde::Deserialize)]
#[sqlx(type_name = "contract_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ContractStatus {
    /// Actively revalued on every tick for its symbol.
    Open,
    /// Closed by its owner at their request.
    Closed,
    /// Force-closed by the Position Manager.
    Liquidated,
}

/// An open leveraged position.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct Contract {
    /// Stable identity.
    pub id: Uuid,
    /// Human-visible sequential number.
    pub contract_number: i64,
    /// Owning account.
    pub account_id: Uuid,
    /// Instrument traded; always `cfd` product type by construction.
    pub symbol: String,
    /// Buy or sell.
    pub side: PositionSide,
    /// Position size, in instrument units.
    pub quantity: Decimal,
    /// Price at open; fixed, never recomputed.
    pub entry_price: Decimal,
    /// Most recent tick price for this symbol.
    pub current_price: Decimal,
    /// Leverage requested at open.
    pub leverage: Decimal,
    /// `quantity * entry_price / leverage`; fixed at open.
    pub margin: Decimal,
    /// `side_sign * (current_price - entry_price) * quantity`, recomputed
    /// on every tick for this symbol while open.
    pub unrealized_pnl: Decimal,
    /// Take-profit trigger price, if set.
    pub take_profit: Option<Decimal>,
    /// Stop-loss trigger price, if set.
    pub stop_loss: Option<Decimal>,
    /// Links two contracts opened as a hedged pair.
    pub pair_id: Option<Uuid>,
    /// Current lifecycle status.
    pub status: ContractStatus,
    /// When the contract opened.
    pub opened_at: DateTime<Utc>,
    /// When the contract closed or was liquidated, if it has.
    pub closed_at: Option<DateTime<Utc>>,
    /// Price recorded at close/liquidation, if closed.
    pub close_price: Option<Decimal>,
}

impl Contract {
    /// `quantity * entry_price / leverage`, the margin locked at open.
    /// Callers must ensure `leverage` is non-zero; instrument validation
    /// guarantees this before a contract is created.
    #[must_use]
    pub fn required_margin(quantity: Decimal, entry_price: Decimal, leverage: Decimal) -> Decimal {
        quantity * entry_price / leverage
    }

    /// `side_sign * (current_price - entry_price) * quantity`.
    #[must_use]
    pub fn compute_unrealized_pnl(&self, current_price: Decimal) -> Decimal {
        self.side.sign() * (current_price - self.entry_price) * self.quantity
    }

    /// Apply a new tick price: update `current_price` and recompute
    /// `unrealized_pnl` in place.
    pub fn revalue(&mut self, current_price: Decimal) {
        self.unrealized_pnl = self.compute_unrealized_pnl(current_price);
        self.current_price = current_price;
    }

    /// `true` if this contract's take-profit has crossed on the profitable
    /// side, or its stop-loss has crossed on the adverse side.
    #[must_use]
    pub fn tp_sl_triggered(&self) -> bool {
        match self.side {
            Side::Buy => {
                self.take_profit.is_some_and(|tp| self.current_price >= tp)
                    || self.stop_loss.is_some_and(|sl| self.current_price <= sl)
            }
            Side::Sell => {
                self.take_profit.is_some_and(|tp| self.current_price <= tp)
                    || self.stop_loss.is_some_and(|sl| self.current_price >= sl)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn open_buy_contract() -> Contract {
        Contract {
            id: Uuid::nil(),
            contract_number: 1,
            account_id: Uuid::nil(),
            symbol: "BTCUSDT".to_owned(),
            side: Side::Buy,
            quantity: dec!(1),
            entry_price: dec!(45000),
            current_price: dec!(45000),
            leverage: dec!(100),
            margin: dec!(450),
            unrealized_pnl: dec!(0),
            take_profit: None,
            stop_loss: None,
            pair_id: None,
            status: ContractStatus::Open,
            opened_at: Utc::now(),
            closed_at: None,
            close_price: None,
        }
    }

    #[test]
    fn margin_is_notional_over_leverage() {
        assert_eq!(
            Contract::required_margin(dec!(1), dec!(45000), dec!(100)),
            dec!(450)
        );
    }

    #[test]
    fn revalue_tracks_a_deepening_loss_toward_liquidation() {
        let mut c = open_buy_contract();
        c.revalue(dec!(44500));
        assert_eq!(c.unrealized_pnl, dec!(-500));

        c.revalue(dec!(44000));
        assert_eq!(c.unrealized_pnl, dec!(-1000));
    }

    #[test]
    fn sell_contract_pnl_sign_is_inverted() {
        let mut c = open_buy_contract();
        c.side = Side::Sell;
        c.revalue(dec!(44000));
        assert_eq!(c.unrealized_pnl, dec!(1000));
    }

    #[test]
    fn take_profit_triggers_above_entry_on_a_buy() {
        let mut c = open_buy_contract();
        c.take_profit = Some(dec!(46000));
        c.current_price = dec!(45999);
        assert!(!c.tp_sl_triggered());
        c.current_price = dec!(46000);
        assert!(c.tp_sl_triggered());
    }
}
