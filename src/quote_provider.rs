use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::QuoteError;

/// A priced snapshot of a symbol at a point in time.
///
/// Quotes are immutable: a fresh one is created on every successful fetch
/// and supersedes (never mutates) the previous one.
#[derive(Debug, Clone)]
pub struct Quote {
    pub symbol: String,
    pub price: Decimal,
    pub previous_close: Decimal,
    pub change: Decimal,
    pub change_percent: Decimal,
    pub currency: String,
    pub exchange: Option<String>,
    /// Set when the quote comes from last-known-good data rather than the
    /// provider; consumers can show a "data may be delayed" indicator.
    pub stale: bool,
    pub fetched_at: DateTime<Utc>,
}

impl Quote {
    /// Build a fresh quote, deriving change and change percent.
    /// A non-positive previous close defines change percent as zero rather
    /// than dividing by it.
    pub fn new(
        symbol: impl Into<String>,
        price: Decimal,
        previous_close: Decimal,
        currency: impl Into<String>,
        exchange: Option<String>,
    ) -> Self {
        let change = price - previous_close;
        let change_percent = if previous_close > Decimal::ZERO {
            change / previous_close * Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };
        Self {
            symbol: symbol.into(),
            price,
            previous_close,
            change,
            change_percent,
            currency: currency.into(),
            exchange,
            stale: false,
            fetched_at: Utc::now(),
        }
    }
}

/// Stateless adapter that fetches the current quote for one symbol from a
/// market-data endpoint. Implementations do not cache and do not retry;
/// both policies belong to the caller.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, QuoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn derives_change_and_percent() {
        let q = Quote::new("VALE3.SA", dec!(53.75), dec!(53.46), "BRL", None);
        assert_eq!(q.change, dec!(0.29));
        assert!((q.change_percent - dec!(0.5424)).abs() < dec!(0.001));
        assert!(!q.stale);
    }

    #[test]
    fn zero_previous_close_gives_zero_percent() {
        let q = Quote::new("NEWIPO", dec!(10.00), Decimal::ZERO, "USD", None);
        assert_eq!(q.change, dec!(10.00));
        assert_eq!(q.change_percent, Decimal::ZERO);
    }
}
