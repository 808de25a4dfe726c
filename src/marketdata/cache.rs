//! Process-wide last-price cache.
//!
//! Writers are providers (via the Market Data Service's `onTick`), readers
//! are REST handlers; single-value atomic replace per symbol is sufficient,
//! so this is a plain `RwLock<HashMap<..>>` rather than a `DashMap` —
//! contention is low (one write per tick per symbol, occasional reads).

use std::collections::HashMap;
use std::sync::RwLock;

use crate::prelude::{Money, Tick};

/// Seed values so early REST requests see a price before any provider has
/// connected.
#[derive(Debug, Clone)]
pub struct PriceSeed {
    /// Instrument symbol.
    pub symbol: String,
    /// Fallback last price.
    pub price: Money,
}

/// The last known price per symbol.
#[derive(Debug, Default)]
pub struct LastPriceCache {
    prices: RwLock<HashMap<String, Tick>>,
}

impl LastPriceCache {
    /// Build a cache pre-populated with static fallback values.
    #[must_use]
    pub fn seeded(seeds: impl IntoIterator<Item = PriceSeed>) -> Self {
        let cache = Self::default();
        for seed in seeds {
            cache.update(Tick {
                symbol: seed.symbol,
                price: seed.price,
                time_ms: 0,
            });
        }
        cache
    }

    /// Overwrite the cached tick for `tick.symbol`.
    pub fn update(&self, tick: Tick) {
        let mut prices = self.prices.write().expect("last-price cache lock poisoned");
        prices.insert(tick.symbol.clone(), tick);
    }

    /// The last known tick for `symbol`, if any provider or seed has
    /// published one.
    #[must_use]
    pub fn get(&self, symbol: &str) -> Option<Tick> {
        self.prices
            .read()
            .expect("last-price cache lock poisoned")
            .get(symbol)
            .cloned()
    }

    /// A snapshot of every cached symbol's last price.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Tick> {
        self.prices
            .read()
            .expect("last-price cache lock poisoned")
            .values()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn seeded_values_are_visible_before_any_tick_arrives() {
        let cache = LastPriceCache::seeded([PriceSeed {
            symbol: "BTCUSDT".to_owned(),
            price: dec!(45000),
        }]);

        assert_eq!(cache.get("BTCUSDT").map(|t| t.price), Some(dec!(45000)));
        assert!(cache.get("EURUSD").is_none());
    }

    #[test]
    fn update_replaces_the_previous_value() {
        let cache = LastPriceCache::default();
        cache.update(Tick {
            symbol: "BTCUSDT".to_owned(),
            price: dec!(45000),
            time_ms: 1,
        });
        cache.update(Tick {
            symbol: "BTCUSDT".to_owned(),
            price: dec!(45100),
            time_ms: 2,
        });

        assert_eq!(cache.get("BTCUSDT").map(|t| t.price), Some(dec!(45100)));
    }
}
