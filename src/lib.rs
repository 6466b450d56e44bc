pub mod cache;
pub mod config;
pub mod error;
pub mod fallback;
pub mod log;
pub mod providers;
pub mod quote_provider;
pub mod quote_service;
pub mod ui;
pub mod valuation;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::valuation::{PortfolioValuation, ValuationEngine};

/// Loads configuration, values the portfolio and prints the result.
pub async fn run(config_path: Option<&str>) -> Result<()> {
    info!("Portfolio valuation starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let valuation = value_portfolio(&config).await?;
    println!("{}", valuation.display_as_table(&config.portfolio.name));
    Ok(())
}

/// Wires provider, cache and fallback table together and runs one valuation.
pub async fn value_portfolio(config: &AppConfig) -> Result<PortfolioValuation> {
    let provider = providers::yahoo_chart::YahooChartProvider::new(
        &config.market_data.base_url,
        Duration::from_millis(config.market_data.timeout_ms),
    )?;

    let service = Arc::new(quote_service::QuoteService::new(
        Arc::new(provider),
        Duration::from_secs(config.cache.quote_ttl_secs),
        fallback::FallbackPriceTable::new(config.fallback_prices.clone()),
    ));

    let engine = ValuationEngine::new(
        Arc::clone(&service),
        config.valuation.concurrency,
        Duration::from_millis(config.valuation.timeout_ms),
    );

    let result = engine.value_portfolio(&config.portfolio.holdings).await?;

    let degraded = service.degraded_served();
    if degraded > 0 {
        info!(count = degraded, "Served fallback prices while the provider was degraded");
    }

    Ok(result)
}
