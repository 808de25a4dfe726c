//! Pure equity/margin arithmetic, kept free of I/O so it can be unit
//! tested directly against worked examples.

use rust_decimal::Decimal;

/// `balance + Σ unrealized_pnl` across every open contract on the account.
#[must_use]
pub fn equity(balance: Decimal, unrealized_pnl_sum: Decimal) -> Decimal {
    balance + unrealized_pnl_sum
}

/// `equity / used_margin * 100`, or `None` when `used_margin` is zero
/// (treated as +∞ risk headroom — no used margin means nothing to liquidate).
#[must_use]
pub fn margin_level(equity: Decimal, used_margin: Decimal) -> Option<Decimal> {
    if used_margin.is_zero() {
        return None;
    }
    Some(equity / used_margin * Decimal::ONE_HUNDRED)
}

/// `true` when the account's margin level has crossed below `threshold`
///. An account with zero used margin never liquidates.
#[must_use]
pub fn below_liquidation_threshold(equity: Decimal, used_margin: Decimal, threshold: Decimal) -> bool {
    margin_level(equity, used_margin).is_some_and(|level| level < threshold)
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn zero_used_margin_is_treated_as_infinite_headroom() {
        assert_eq!(margin_level(dec!(1000), dec!(0)), None);
        assert!(!below_liquidation_threshold(dec!(1000), dec!(0), dec!(50)));
    }

    #[test]
    fn margin_level_below_threshold_triggers_liquidation() {
        // equity 225, used margin 450 -> margin level 50%, at the boundary.
        assert_eq!(margin_level(dec!(225), dec!(450)), Some(dec!(50)));
        assert!(!below_liquidation_threshold(dec!(225), dec!(450), dec!(50)));
        assert!(below_liquidation_threshold(dec!(224), dec!(450), dec!(50)));
    }

    #[test]
    fn equity_sums_balance_and_unrealized_pnl() {
        assert_eq!(equity(dec!(1000), dec!(-500)), dec!(500));
    }
}
