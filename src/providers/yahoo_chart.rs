use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::time::Duration;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::QuoteError;
use crate::quote_provider::{Quote, QuoteProvider};

/// Market-data adapter for Yahoo's chart endpoint.
///
/// One GET per symbol against `{base_url}/{symbol}?range=1d&interval=1d`,
/// bounded by the configured request timeout. No caching and no retries —
/// refresh and fallback policy live in the quote service.
pub struct YahooChartProvider {
    base_url: String,
    client: reqwest::Client,
}

impl YahooChartProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, QuoteError> {
        let client = reqwest::Client::builder()
            .user_agent("portval/0.2")
            .timeout(timeout)
            .build()?;
        Ok(YahooChartProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[derive(Deserialize, Debug)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    result: Vec<ChartItem>,
}

#[derive(Deserialize, Debug)]
struct ChartItem {
    meta: ChartMeta,
}

#[derive(Deserialize, Debug)]
struct ChartMeta {
    #[serde(alias = "regularMarketPrice")]
    regular_market_price: Option<f64>,
    currency: Option<String>,
    #[serde(alias = "previousClose", alias = "chartPreviousClose")]
    previous_close: Option<f64>,
    #[serde(alias = "exchangeName")]
    exchange_name: Option<String>,
}

fn parse_error(symbol: &str, reason: impl Into<String>) -> QuoteError {
    QuoteError::Parse {
        symbol: symbol.to_string(),
        reason: reason.into(),
    }
}

// Shortest-round-trip conversion: a quoted `32.21` must come out as exactly
// 32.21, not the float's full binary expansion.
fn to_decimal(symbol: &str, field: &str, value: f64) -> Result<Decimal, QuoteError> {
    Decimal::from_f64(value)
        .ok_or_else(|| parse_error(symbol, format!("{field} is not a representable number: {value}")))
}

#[async_trait]
impl QuoteProvider for YahooChartProvider {
    #[instrument(name = "ChartQuoteFetch", skip(self), fields(symbol = %symbol))]
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, QuoteError> {
        let url = format!("{}/{}?range=1d&interval=1d", self.base_url, symbol);
        debug!("Requesting quote from {}", url);

        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            let message = if message.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string()
            } else {
                message
            };
            return Err(QuoteError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let text = response.text().await?;
        let data: ChartResponse = serde_json::from_str(&text)
            .map_err(|e| parse_error(symbol, format!("invalid chart JSON: {e}")))?;

        let item = data
            .chart
            .result
            .into_iter()
            .next()
            .ok_or_else(|| parse_error(symbol, "empty chart result"))?;

        let price = item
            .meta
            .regular_market_price
            .ok_or_else(|| parse_error(symbol, "missing regularMarketPrice"))?;
        let price = to_decimal(symbol, "regularMarketPrice", price)?;

        let previous_close = match item.meta.previous_close {
            Some(value) => to_decimal(symbol, "previousClose", value)?,
            None => Decimal::ZERO,
        };

        let currency = item.meta.currency.unwrap_or_else(|| "BRL".to_string());

        Ok(Quote::new(
            symbol,
            price,
            previous_close,
            currency,
            item.meta.exchange_name,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn create_mock_server(symbol: &str, response: ResponseTemplate) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/{symbol}")))
            .and(query_param("range", "1d"))
            .and(query_param("interval", "1d"))
            .respond_with(response)
            .mount(&mock_server)
            .await;
        mock_server
    }

    fn provider(base_url: &str) -> YahooChartProvider {
        YahooChartProvider::new(base_url, Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn successful_quote_fetch() {
        let body = r#"{
            "chart": {
                "result": [{
                    "meta": {
                        "regularMarketPrice": 32.21,
                        "previousClose": 32.64,
                        "currency": "BRL",
                        "exchangeName": "SAO"
                    }
                }]
            }
        }"#;
        let server =
            create_mock_server("PETR4.SA", ResponseTemplate::new(200).set_body_string(body)).await;

        let quote = provider(&server.uri())
            .fetch_quote("PETR4.SA")
            .await
            .unwrap();
        assert_eq!(quote.symbol, "PETR4.SA");
        assert_eq!(quote.price, dec!(32.21));
        assert_eq!(quote.previous_close, dec!(32.64));
        assert_eq!(quote.change, dec!(-0.43));
        assert!((quote.change_percent - dec!(-1.3174)).abs() < dec!(0.001));
        assert_eq!(quote.currency, "BRL");
        assert_eq!(quote.exchange.as_deref(), Some("SAO"));
        assert!(!quote.stale);
    }

    #[test]
    fn float_conversion_is_exact_for_two_decimal_prices() {
        // No binary-float noise may leak into monetary figures.
        assert_eq!(to_decimal("PETR4.SA", "price", 32.21).unwrap(), dec!(32.21));
        assert_eq!(to_decimal("VALE3.SA", "price", 53.75).unwrap(), dec!(53.75));
        assert_eq!(to_decimal("ITUB4.SA", "price", 0.1).unwrap(), dec!(0.1));
        assert!(to_decimal("BAD", "price", f64::NAN).is_err());
    }

    #[tokio::test]
    async fn chart_previous_close_alias_is_accepted() {
        let body = r#"{
            "chart": {
                "result": [{
                    "meta": {
                        "regularMarketPrice": 150.65,
                        "chartPreviousClose": 149.32,
                        "currency": "USD"
                    }
                }]
            }
        }"#;
        let server =
            create_mock_server("AAPL", ResponseTemplate::new(200).set_body_string(body)).await;

        let quote = provider(&server.uri()).fetch_quote("AAPL").await.unwrap();
        assert_eq!(quote.previous_close, dec!(149.32));
        assert_eq!(quote.exchange, None);
    }

    #[tokio::test]
    async fn missing_price_field_is_a_parse_error() {
        let body = r#"{
            "chart": {
                "result": [{
                    "meta": { "currency": "BRL", "previousClose": 10.0 }
                }]
            }
        }"#;
        let server =
            create_mock_server("VALE3.SA", ResponseTemplate::new(200).set_body_string(body)).await;

        let err = provider(&server.uri())
            .fetch_quote("VALE3.SA")
            .await
            .unwrap_err();
        assert!(matches!(err, QuoteError::Parse { .. }));
        assert!(err.to_string().contains("missing regularMarketPrice"));
        assert!(!err.is_degraded());
    }

    #[tokio::test]
    async fn empty_result_is_a_parse_error() {
        let body = r#"{"chart": {"result": []}}"#;
        let server =
            create_mock_server("NOPE", ResponseTemplate::new(200).set_body_string(body)).await;

        let err = provider(&server.uri()).fetch_quote("NOPE").await.unwrap_err();
        assert!(matches!(err, QuoteError::Parse { .. }));
    }

    #[tokio::test]
    async fn http_429_is_a_degraded_provider_error() {
        let server = create_mock_server("ITUB4.SA", ResponseTemplate::new(429)).await;

        let err = provider(&server.uri())
            .fetch_quote("ITUB4.SA")
            .await
            .unwrap_err();
        assert!(matches!(err, QuoteError::Provider { status: 429, .. }));
        assert!(err.is_degraded());
    }

    #[tokio::test]
    async fn http_500_is_a_plain_provider_error() {
        let server = create_mock_server("ITUB4.SA", ResponseTemplate::new(500)).await;

        let err = provider(&server.uri())
            .fetch_quote("ITUB4.SA")
            .await
            .unwrap_err();
        assert!(matches!(err, QuoteError::Provider { status: 500, .. }));
        assert!(!err.is_degraded());
    }

    #[tokio::test]
    async fn request_timeout_is_a_degraded_transport_error() {
        let response = ResponseTemplate::new(200)
            .set_body_string(r#"{"chart": {"result": []}}"#)
            .set_delay(Duration::from_millis(500));
        let server = create_mock_server("SLOW.SA", response).await;

        let provider =
            YahooChartProvider::new(&server.uri(), Duration::from_millis(50)).unwrap();
        let err = provider.fetch_quote("SLOW.SA").await.unwrap_err();
        assert!(matches!(err, QuoteError::Transport { timed_out: true, .. }));
        assert!(err.is_degraded());
    }
}
