use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, USER_AGENT},
};
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::Result;

/// Anything that can produce the latest price snapshot.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_snapshot(&self) -> Result<Vec<Quote>>;
}

/// One entry of a snapshot. The price is kept as text; the refresher parses it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Quote {
    #[serde(default, deserialize_with = "symbol_text")]
    pub symbol: String,

    #[serde(alias = "price_usd", default, deserialize_with = "price_text")]
    pub price: String,
}

impl Quote {
    pub fn new(symbol: impl Into<String>, price: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            price: price.into(),
        }
    }
}

// A null symbol decodes as empty, which no store tracks.
fn symbol_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// Tickers disagree on whether prices are strings, numbers or null.
fn price_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPrice {
        Text(String),
        Number(f64),
    }

    Ok(match Option::<RawPrice>::deserialize(deserializer)? {
        Some(RawPrice::Text(s)) => s,
        Some(RawPrice::Number(n)) => n.to_string(),
        None => String::new(),
    })
}

/// HTTP client for a ticker endpoint returning a JSON array of `{symbol, price}` objects.
#[derive(Clone)]
pub struct PriceClient {
    client: Client,
    url: String,
    symbol_suffix: Option<String>,
}

impl PriceClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("price-watch/", env!("CARGO_PKG_VERSION"))),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
            symbol_suffix: None,
        })
    }

    /// Strip a quote-asset suffix from source symbols, e.g. `BTCUSDT` -> `BTC`.
    pub fn with_symbol_suffix(mut self, suffix: impl Into<String>) -> Self {
        let suffix = suffix.into().trim().to_uppercase();
        self.symbol_suffix = (!suffix.is_empty()).then_some(suffix);
        self
    }

    pub fn decode_snapshot(&self, body: &[u8]) -> Result<Vec<Quote>> {
        let mut quotes: Vec<Quote> = serde_json::from_slice(body)?;

        if let Some(suffix) = &self.symbol_suffix {
            for quote in &mut quotes {
                let upper = quote.symbol.to_uppercase();
                if let Some(base) = upper.strip_suffix(suffix.as_str())
                    && !base.is_empty()
                {
                    quote.symbol = base.to_string();
                }
            }
        }

        Ok(quotes)
    }
}

#[async_trait]
impl PriceSource for PriceClient {
    async fn fetch_snapshot(&self) -> Result<Vec<Quote>> {
        let body = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        let quotes = self.decode_snapshot(&body)?;
        debug!(url = %self.url, quotes = quotes.len(), "fetched snapshot");
        Ok(quotes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MarketError;

    fn client() -> PriceClient {
        PriceClient::new("http://localhost/ticker", Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_decode_ticker_with_price_usd() {
        let body = br#"[
            {"id": "bitcoin", "symbol": "BTC", "price_usd": "100.00"},
            {"id": "ethereum", "symbol": "ETH", "price_usd": "50.30"}
        ]"#;

        let quotes = client().decode_snapshot(body).unwrap();
        assert_eq!(
            quotes,
            vec![Quote::new("BTC", "100.00"), Quote::new("ETH", "50.30")]
        );
    }

    #[test]
    fn test_decode_numeric_and_missing_prices() {
        let body = br#"[{"symbol": "BTC", "price": 101.5}, {"symbol": "XRP", "price": null}, {"symbol": "ADA"}]"#;

        let quotes = client().decode_snapshot(body).unwrap();
        assert_eq!(quotes[0].price, "101.5");
        assert_eq!(quotes[1].price, "");
        assert_eq!(quotes[2].price, "");
    }

    #[test]
    fn test_decode_tolerates_missing_symbol() {
        let body = br#"[{"symbol": null, "price": "1.00"}, {"price": "2.00"}, {"symbol": "BTC", "price": "3.00"}]"#;

        let quotes = client().decode_snapshot(body).unwrap();
        assert_eq!(quotes.len(), 3);
        assert_eq!(quotes[0].symbol, "");
        assert_eq!(quotes[1].symbol, "");
        assert_eq!(quotes[2], Quote::new("BTC", "3.00"));
    }

    #[test]
    fn test_decode_strips_symbol_suffix() {
        let body = br#"[
            {"symbol": "BTCUSDT", "price": "65000.10"},
            {"symbol": "ETHBTC", "price": "0.05"},
            {"symbol": "USDT", "price": "1.00"}
        ]"#;

        let quotes = client().with_symbol_suffix("usdt").decode_snapshot(body).unwrap();
        let symbols: Vec<&str> = quotes.iter().map(|q| q.symbol.as_str()).collect();
        assert_eq!(symbols, ["BTC", "ETHBTC", "USDT"]);
    }

    #[test]
    fn test_decode_garbage_is_fetch_error() {
        let err = client().decode_snapshot(b"<html>rate limited</html>").unwrap_err();
        assert!(matches!(err, MarketError::Fetch(_)));
    }
}
