use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use crate::cache::Cache;
use crate::error::QuoteError;
use crate::fallback::FallbackPriceTable;
use crate::quote_provider::{Quote, QuoteProvider};

/// Single "give me the current quote for this symbol" contract for all
/// callers.
///
/// Lookup order: cache → provider → fallback table. A fresh cache entry is
/// served as-is; a miss triggers one provider fetch whose result repopulates
/// the cache. When the provider signals degraded availability (rate limiting
/// or a timeout) the fallback table answers instead, marked stale — and is
/// deliberately not cached, so the next lookup retries the provider. Any
/// other provider failure surfaces to the caller.
pub struct QuoteService {
    provider: Arc<dyn QuoteProvider>,
    cache: Cache<String, Quote>,
    fallback: FallbackPriceTable,
    degraded_served: AtomicU64,
}

impl QuoteService {
    pub fn new(
        provider: Arc<dyn QuoteProvider>,
        quote_ttl: Duration,
        fallback: FallbackPriceTable,
    ) -> Self {
        Self {
            provider,
            cache: Cache::new(quote_ttl),
            fallback,
            degraded_served: AtomicU64::new(0),
        }
    }

    /// Full quote, including derived change and change percent.
    pub async fn get_quote(&self, symbol: &str) -> Result<Quote, QuoteError> {
        if let Some(quote) = self.cache.get(&symbol.to_string()).await {
            return Ok(quote);
        }

        match self.provider.fetch_quote(symbol).await {
            Ok(quote) => {
                self.cache.put(symbol.to_string(), quote.clone()).await;
                Ok(quote)
            }
            Err(e) if e.is_degraded() => {
                warn!(symbol, error = %e, "Provider degraded, serving fallback price");
                self.degraded_served.fetch_add(1, Ordering::Relaxed);
                Ok(self.fallback.quote_for(symbol))
            }
            Err(e) => {
                debug!(symbol, error = %e, "Quote fetch failed");
                Err(e)
            }
        }
    }

    /// Current price only.
    pub async fn get_current_price(&self, symbol: &str) -> Result<Decimal, QuoteError> {
        Ok(self.get_quote(symbol).await?.price)
    }

    /// How many lookups were answered from the fallback table. Degraded
    /// failures never fail the call, so this counter is how they stay
    /// observable.
    pub fn degraded_served(&self) -> u64 {
        self.degraded_served.load(Ordering::Relaxed)
    }
}
