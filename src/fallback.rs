use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::quote_provider::Quote;

/// Price served for symbols absent from the fallback table. A valuation must
/// always produce a result for a known holdings set, so an unknown symbol
/// resolves to this neutral constant instead of failing.
pub const NEUTRAL_DEFAULT_PRICE: Decimal = dec!(25.00);

/// A last-known-good price entry, maintained as configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FallbackPrice {
    pub price: Decimal,
    #[serde(default)]
    pub change_percent: Decimal,
}

/// Static symbol→price map consulted when the provider is rate-limited or
/// unreachable. Pure lookup, no I/O; the contents come from config.
pub struct FallbackPriceTable {
    entries: HashMap<String, FallbackPrice>,
}

impl FallbackPriceTable {
    pub fn new(entries: HashMap<String, FallbackPrice>) -> Self {
        Self { entries }
    }

    pub fn lookup(&self, symbol: &str) -> Option<&FallbackPrice> {
        self.entries.get(symbol)
    }

    /// Build a degraded-mode quote for `symbol`, marked stale. Uses the
    /// table entry when present, otherwise [`NEUTRAL_DEFAULT_PRICE`] with
    /// zero variation.
    ///
    /// Previous close is reconstructed from the price and variation:
    /// `previous_close = price / (1 + change_percent/100)`.
    pub fn quote_for(&self, symbol: &str) -> Quote {
        let (price, change_percent) = match self.lookup(symbol) {
            Some(entry) => (entry.price, entry.change_percent),
            None => {
                warn!(
                    symbol,
                    "Symbol missing from fallback table, serving neutral default price"
                );
                (NEUTRAL_DEFAULT_PRICE, Decimal::ZERO)
            }
        };

        let divisor = Decimal::ONE + change_percent / Decimal::ONE_HUNDRED;
        let previous_close = if divisor > Decimal::ZERO {
            price / divisor
        } else {
            price
        };

        let mut quote = Quote::new(symbol, price, previous_close, "BRL", None);
        quote.stale = true;
        quote
    }
}
