use futures::StreamExt;
use futures::stream;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

use comfy_table::Cell;

use crate::config::{AssetCategory, Holding};
use crate::error::QuoteError;
use crate::quote_provider::Quote;
use crate::quote_service::QuoteService;
use crate::ui;

/// One holding priced at the current quote. Recomputed on every valuation,
/// never persisted.
#[derive(Debug, Clone)]
pub struct PositionValuation {
    pub symbol: String,
    pub category: Option<AssetCategory>,
    pub quantity: i64,
    pub current_price: Decimal,
    pub current_value: Decimal,
    pub invested_amount: Decimal,
    pub profit_loss: Decimal,
    pub profit_loss_percent: Decimal,
    pub daily_variation: Decimal,
    /// True when the price came from degraded-mode or last-resort data.
    pub stale: bool,
}

/// Aggregate valuation of a holdings set.
#[derive(Debug, Clone)]
pub struct PortfolioValuation {
    pub total_current_value: Decimal,
    pub total_invested: Decimal,
    pub total_profit_loss: Decimal,
    pub total_profit_loss_percent: Decimal,
    pub daily_variation: Decimal,
    /// Category display name → share of total current value, in percent.
    pub distribution: HashMap<String, Decimal>,
    pub position_count: usize,
    /// Positions where every quote source failed and the holding's own
    /// last-known price was substituted. Absorbed failures stay countable.
    pub fallback_positions: usize,
    pub positions: Vec<PositionValuation>,
}

impl PortfolioValuation {
    fn empty() -> Self {
        Self {
            total_current_value: Decimal::ZERO,
            total_invested: Decimal::ZERO,
            total_profit_loss: Decimal::ZERO,
            total_profit_loss_percent: Decimal::ZERO,
            daily_variation: Decimal::ZERO,
            distribution: HashMap::new(),
            position_count: 0,
            fallback_positions: 0,
            positions: Vec::new(),
        }
    }

    /// True when any position was priced from stale (delayed) data.
    pub fn has_stale_prices(&self) -> bool {
        self.positions.iter().any(|p| p.stale)
    }

    /// Render the valuation as a terminal table. Rounding to two decimal
    /// places happens here and only here; all stored figures keep full
    /// precision.
    pub fn display_as_table(&self, portfolio_name: &str) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Symbol"),
            ui::header_cell("Qty"),
            ui::header_cell("Price"),
            ui::header_cell("Value"),
            ui::header_cell("Invested"),
            ui::header_cell("P&L"),
            ui::header_cell("P&L (%)"),
            ui::header_cell("Day"),
        ]);

        for position in &self.positions {
            let symbol = if position.stale {
                format!("{} *", position.symbol)
            } else {
                position.symbol.clone()
            };
            table.add_row(vec![
                Cell::new(symbol),
                ui::amount_cell(Decimal::from(position.quantity), 0),
                ui::amount_cell(position.current_price, 2),
                ui::amount_cell(position.current_value, 2),
                ui::amount_cell(position.invested_amount, 2),
                ui::signed_cell(position.profit_loss, 2),
                ui::change_cell(position.profit_loss_percent),
                ui::signed_cell(position.daily_variation, 2),
            ]);
        }

        let mut output = format!(
            "Portfolio: {}\n\n{}",
            ui::style_text(portfolio_name, ui::StyleType::Title),
            table
        );

        output.push_str(&format!(
            "\n\nTotal Value: {}   Invested: {}   P&L: {} ({})   Day: {}",
            ui::style_text(
                &format!("{:.2}", self.total_current_value),
                ui::StyleType::TotalValue
            ),
            format_args!("{:.2}", self.total_invested),
            format_args!("{:+.2}", self.total_profit_loss),
            format_args!("{:+.2}%", self.total_profit_loss_percent),
            format_args!("{:+.2}", self.daily_variation),
        ));

        if !self.distribution.is_empty() {
            let mut groups: Vec<_> = self.distribution.iter().collect();
            groups.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
            let breakdown = groups
                .iter()
                .map(|(name, pct)| format!("{name} {:.2}%", pct))
                .collect::<Vec<_>>()
                .join(", ");
            output.push_str(&format!("\nAllocation: {breakdown}"));
        }

        if self.has_stale_prices() {
            output.push_str(&format!(
                "\n{}",
                ui::style_text("* price may be delayed", ui::StyleType::Subtle)
            ));
        }

        output
    }
}

/// Turns a holdings set plus a quote source into consistent valuation
/// figures.
///
/// Quote lookups fan out concurrently (bounded by `concurrency`) and the
/// whole call is bounded by `timeout`. A single bad symbol never fails the
/// valuation: per-symbol errors and deadline overruns substitute the
/// holding's own last-known price. Aggregates are reduced from full-precision
/// figures, so the result is deterministic for a fixed set of quotes no
/// matter the fetch interleaving.
pub struct ValuationEngine {
    quotes: Arc<QuoteService>,
    concurrency: usize,
    timeout: Duration,
}

impl ValuationEngine {
    pub fn new(quotes: Arc<QuoteService>, concurrency: usize, timeout: Duration) -> Self {
        Self {
            quotes,
            concurrency: concurrency.max(1),
            timeout,
        }
    }

    pub async fn value_portfolio(
        &self,
        holdings: &[Holding],
    ) -> Result<PortfolioValuation, QuoteError> {
        for holding in holdings {
            if holding.quantity < 0 {
                return Err(QuoteError::InvalidHolding(format!(
                    "negative quantity {} for {}",
                    holding.quantity, holding.symbol
                )));
            }
        }

        if holdings.is_empty() {
            debug!("Empty holdings set, returning zero-valued portfolio");
            return Ok(PortfolioValuation::empty());
        }

        let deadline = Instant::now() + self.timeout;
        let mut resolved: Vec<(usize, Quote, bool)> =
            stream::iter(holdings.iter().enumerate())
                .map(|(idx, holding)| {
                    let quotes = Arc::clone(&self.quotes);
                    async move {
                        match timeout_at(deadline, quotes.get_quote(&holding.symbol)).await {
                            Ok(Ok(quote)) => (idx, quote, false),
                            Ok(Err(e)) => {
                                warn!(symbol = %holding.symbol, error = %e,
                                    "Quote lookup failed, using holding's last known price");
                                (idx, last_resort_quote(holding), true)
                            }
                            Err(_) => {
                                warn!(symbol = %holding.symbol,
                                    "Valuation deadline hit, using holding's last known price");
                                (idx, last_resort_quote(holding), true)
                            }
                        }
                    }
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        // Fetches complete in arbitrary order; restore input order so the
        // output is stable.
        resolved.sort_by_key(|(idx, _, _)| *idx);

        let mut positions = Vec::with_capacity(holdings.len());
        let mut fallback_positions = 0;
        for (idx, quote, absorbed) in resolved {
            if absorbed {
                fallback_positions += 1;
            }
            positions.push(value_position(&holdings[idx], &quote));
        }

        Ok(aggregate(positions, fallback_positions))
    }
}

/// Fallback-of-last-resort: price the holding at its own last-known price
/// (or average cost when none was recorded), with no daily movement.
fn last_resort_quote(holding: &Holding) -> Quote {
    let price = holding.last_known_price.unwrap_or(holding.average_cost);
    let mut quote = Quote::new(&holding.symbol, price, price, "BRL", None);
    quote.stale = true;
    quote
}

fn value_position(holding: &Holding, quote: &Quote) -> PositionValuation {
    let quantity = Decimal::from(holding.quantity);
    let current_value = quote.price * quantity;
    let invested_amount = holding.invested();
    let profit_loss = current_value - invested_amount;
    let profit_loss_percent = if invested_amount > Decimal::ZERO {
        profit_loss / invested_amount * Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    };

    PositionValuation {
        symbol: holding.symbol.clone(),
        category: holding.category,
        quantity: holding.quantity,
        current_price: quote.price,
        current_value,
        invested_amount,
        profit_loss,
        profit_loss_percent,
        daily_variation: quote.change * quantity,
        stale: quote.stale,
    }
}

fn aggregate(positions: Vec<PositionValuation>, fallback_positions: usize) -> PortfolioValuation {
    let total_current_value: Decimal = positions.iter().map(|p| p.current_value).sum();
    let total_invested: Decimal = positions.iter().map(|p| p.invested_amount).sum();
    let daily_variation: Decimal = positions.iter().map(|p| p.daily_variation).sum();

    let total_profit_loss = total_current_value - total_invested;
    // Value-weighted, computed once on the totals. Summing per-position
    // percentages would be wrong.
    let total_profit_loss_percent = if total_invested > Decimal::ZERO {
        total_profit_loss / total_invested * Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    };

    let mut group_values: HashMap<String, Decimal> = HashMap::new();
    for position in &positions {
        let key = position
            .category
            .map(|c| c.to_string())
            .unwrap_or_else(|| "Other".to_string());
        *group_values.entry(key).or_insert(Decimal::ZERO) += position.current_value;
    }
    let distribution = if total_current_value > Decimal::ZERO {
        group_values
            .into_iter()
            .map(|(key, value)| (key, value / total_current_value * Decimal::ONE_HUNDRED))
            .collect()
    } else {
        HashMap::new()
    };

    PortfolioValuation {
        total_current_value,
        total_invested,
        total_profit_loss,
        total_profit_loss_percent,
        daily_variation,
        distribution,
        position_count: positions.len(),
        fallback_positions,
        positions,
    }
}
