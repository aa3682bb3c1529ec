//! Market data access.
//!
//! The engine only sees the `MarketDataSource` trait, so tests and alternative
//! vendors can be swapped in. `BinanceClient` is the production implementation.

use crate::error::ApiError;
use crate::responses::ApiErrorResponse;
use async_trait::async_trait;
use configuration::settings::MarketDataSettings;
use core_types::Candle;
use reqwest::header::{HeaderMap, HeaderValue};
use std::time::Duration;

pub mod error;
pub mod responses;

// --- Public API ---
pub use responses::parse_klines;

/// Interval used to read the latest traded price.
pub const PRICE_INTERVAL: &str = "1m";

/// The abstract interface for a source of OHLCV history.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fetches up to `limit` candles for `symbol` at `interval`, oldest first.
    ///
    /// A series shorter than `limit` is returned as-is.
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, ApiError>;

    /// The close of the most recent one-minute candle.
    async fn latest_price(&self, symbol: &str) -> Result<f64, ApiError> {
        let candles = self.fetch_candles(symbol, PRICE_INTERVAL, 1).await?;
        candles
            .last()
            .map(|c| c.close)
            .ok_or_else(|| ApiError::EmptyResponse(symbol.to_string()))
    }
}

/// A `MarketDataSource` backed by the Binance spot REST API.
#[derive(Clone)]
pub struct BinanceClient {
    client: reqwest::Client,
    base_url: String,
}

impl BinanceClient {
    /// Builds a client whose every request is bounded by the configured timeout.
    pub fn new(settings: &MarketDataSettings) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        if !settings.api_key.is_empty() {
            let value = HeaderValue::from_str(&settings.api_key)
                .map_err(|e| ApiError::InvalidData(format!("Invalid API key header: {e}")))?;
            headers.insert("X-MBX-APIKEY", value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl MarketDataSource for BinanceClient {
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, ApiError> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let symbol = symbol.to_uppercase();
        let limit = limit.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", symbol.as_str()),
                ("interval", interval),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = match serde_json::from_str::<ApiErrorResponse>(&text) {
                Ok(body) => format!("{} (code {})", body.msg, body.code),
                Err(_) => text,
            };
            tracing::warn!(%symbol, interval, status = status.as_u16(), "Kline request rejected.");
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let candles = parse_klines(&text)?;
        tracing::debug!(%symbol, interval, count = candles.len(), "Fetched candles.");
        Ok(candles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSource(Vec<Candle>);

    #[async_trait]
    impl MarketDataSource for FixedSource {
        async fn fetch_candles(&self, _: &str, interval: &str, limit: usize) -> Result<Vec<Candle>, ApiError> {
            assert_eq!(interval, PRICE_INTERVAL);
            assert_eq!(limit, 1);
            Ok(self.0.clone())
        }
    }

    fn candle(close: f64) -> Candle {
        Candle {
            time: 0,
            open: close,
            high: close,
            low: close,
            close,
            volume: 0.0,
        }
    }

    #[tokio::test]
    async fn latest_price_is_last_close() {
        let source = FixedSource(vec![candle(1.2345)]);
        assert_eq!(source.latest_price("EURUSD").await.unwrap(), 1.2345);
    }

    #[tokio::test]
    async fn no_candles_is_an_empty_response() {
        let source = FixedSource(Vec::new());
        assert!(matches!(
            source.latest_price("EURUSD").await,
            Err(ApiError::EmptyResponse(s)) if s == "EURUSD"
        ));
    }

    #[test]
    fn client_builds_from_default_settings() {
        let client = BinanceClient::new(&MarketDataSettings::default()).unwrap();
        assert_eq!(client.base_url, "https://api.binance.com");
    }
}
