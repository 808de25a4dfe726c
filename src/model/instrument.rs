//! Instrument configuration.

use rust_decimal::Decimal;

/// Which family of per-kind configuration an instrument carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, serde::Serialize, serde::Deserialize)]
#[sqlx(type_name = "instrument_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InstrumentKind {
    /// e.g. `BTCUSDT`; tick/step sizing, maker/taker fees.
    Crypto,
    /// e.g. `EURUSD`; pip sizing, lots, leverage.
    Forex,
    /// Commodity CFDs; shares forex-style configuration.
    Commodity,
}

/// Per-instrument trading configuration and invariants.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct Instrument {
    /// e.g. `BTCUSDT`, `EURUSD`.
    pub symbol: String,
    /// Crypto / forex / commodity.
    pub kind: InstrumentKind,
    /// Currency a spot fill credits/debits alongside the account's USD
    /// balance, e.g. `BTC` for `BTCUSDT`.
    pub base_currency: String,
    /// Minimum price increment; every order price must be a whole multiple.
    pub tick_size: Decimal,
    /// Minimum quantity increment; every order quantity must be a whole
    /// multiple (lot step for forex-like instruments).
    pub step_size: Decimal,
    /// Smallest order quantity accepted.
    pub min_quantity: Decimal,
    /// Largest order quantity accepted.
    pub max_quantity: Decimal,
    /// Smallest order notional (`quantity * price`) accepted.
    pub min_notional: Decimal,
    /// Largest order notional accepted.
    pub max_notional: Decimal,
    /// Maker fee rate, e.g. `0.001` for 10 bps.
    pub maker_fee_rate: Decimal,
    /// Taker fee rate, applied to every matcher-filled order.
    pub taker_fee_rate: Decimal,
    /// Contract size per lot (forex-like instruments).
    pub contract_size: Decimal,
    /// Highest leverage a cfd order on this instrument may request.
    pub max_leverage: Decimal,
    /// Currency margin is locked in, after FX conversion if needed.
    pub margin_currency: String,
}

impl Instrument {
    /// Round down to the nearest whole multiple of `increment`, used to
    /// check both the tick-size and step-size invariants.
    #[must_use]
    pub fn snaps_to(value: Decimal, increment: Decimal) -> bool {
        if increment.is_zero() {
            return true;
        }
        (value / increment).fract().is_zero()
    }

    /// `true` if `quantity` is a whole multiple of [`Self::step_size`] and
    /// lies within `[min_quantity, max_quantity]`.
    #[must_use]
    pub fn accepts_quantity(&self, quantity: Decimal) -> bool {
        quantity >= self.min_quantity
            && quantity <= self.max_quantity
            && Self::snaps_to(quantity, self.step_size)
    }

    /// `true` if `price` is a whole multiple of [`Self::tick_size`].
    #[must_use]
    pub fn accepts_price(&self, price: Decimal) -> bool {
        Self::snaps_to(price, self.tick_size)
    }

    /// `true` if `notional` lies within `[min_notional, max_notional]`.
    #[must_use]
    pub fn accepts_notional(&self, notional: Decimal) -> bool {
        notional >= self.min_notional && notional <= self.max_notional
    }

    /// `true` if `leverage` does not exceed [`Self::max_leverage`].
    #[must_use]
    pub fn accepts_leverage(&self, leverage: Decimal) -> bool {
        leverage > Decimal::ZERO && leverage <= self.max_leverage
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn btcusdt() -> Instrument {
        Instrument {
            symbol: "BTCUSDT".to_owned(),
            kind: InstrumentKind::Crypto,
            base_currency: "BTC".to_owned(),
            tick_size: dec!(0.01),
            step_size: dec!(0.0001),
            min_quantity: dec!(0.0001),
            max_quantity: dec!(100),
            min_notional: dec!(10),
            max_notional: dec!(1000000),
            maker_fee_rate: dec!(0.0008),
            taker_fee_rate: dec!(0.001),
            contract_size: dec!(1),
            max_leverage: dec!(20),
            margin_currency: "USD".to_owned(),
        }
    }

    #[test]
    fn quantity_must_be_a_multiple_of_step_size() {
        let instrument = btcusdt();
        assert!(instrument.accepts_quantity(dec!(0.01)));
        assert!(!instrument.accepts_quantity(dec!(0.00015)));
    }

    #[test]
    fn leverage_above_max_is_rejected() {
        let instrument = btcusdt();
        assert!(instrument.accepts_leverage(dec!(10)));
        assert!(!instrument.accepts_leverage(dec!(21)));
    }

    #[test]
    fn price_must_be_on_the_tick_grid() {
        let instrument = btcusdt();
        assert!(instrument.accepts_price(dec!(45000.00)));
        assert!(!instrument.accepts_price(dec!(45000.001)));
    }
}
