//! Bybit REST client implementing `MarketDataProvider`

use backon::{ExponentialBuilder, Retryable};
use chrono::DateTime;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

use super::messages::{Envelope, KlineEntry, ListResult, TickerEntry};
use crate::models::market::{Candle, Ticker};
use crate::services::market_data::{MarketDataError, MarketDataProvider, TickerUniverse};

pub const DEFAULT_BASE_URL: &str = "https://api.bybit.com";
const CATEGORY: &str = "linear";
/// Bybit caps kline requests at 1000 rows.
const MAX_KLINE_LIMIT: usize = 1000;

pub struct BybitClient {
    base_url: String,
    http: Client,
    backoff: ExponentialBuilder,
}

impl BybitClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, MarketDataError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MarketDataError::Unavailable(format!("HTTP client init failed: {}", e)))?;
        Ok(Self::with_client(base_url, http))
    }

    pub fn with_client(base_url: impl Into<String>, http: Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            backoff: ExponentialBuilder::default()
                .with_min_delay(Duration::from_millis(200))
                .with_max_times(2),
        }
    }

    /// Override the retry policy for transient failures.
    pub fn with_backoff(mut self, backoff: ExponentialBuilder) -> Self {
        self.backoff = backoff;
        self
    }

    async fn get_once<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, MarketDataError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| MarketDataError::Unavailable(format!("GET {} failed: {}", path, e)))?;

        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(MarketDataError::Unavailable(format!(
                "GET {} returned HTTP {}",
                path, status
            )));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| MarketDataError::Malformed(format!("GET {}: {}", path, e)))?;

        if envelope.ret_code != 0 {
            return Err(MarketDataError::Api {
                code: envelope.ret_code,
                message: envelope.ret_msg,
            });
        }

        envelope
            .result
            .ok_or_else(|| MarketDataError::Malformed(format!("GET {}: missing result", path)))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, MarketDataError> {
        (|| async move { self.get_once::<T>(path, query).await })
            .retry(self.backoff)
            .sleep(tokio::time::sleep)
            .when(|e: &MarketDataError| e.is_transient())
            .notify(|e: &MarketDataError, delay: Duration| {
                warn!(path = %path, error = %e, delay_ms = delay.as_millis() as u64, "Bybit request failed, retrying");
            })
            .await
    }
}

fn parse_f64(field: &str, raw: &str) -> Result<f64, MarketDataError> {
    raw.parse::<f64>()
        .map_err(|_| MarketDataError::Malformed(format!("invalid {}: '{}'", field, raw)))
}

pub(crate) fn parse_kline(entry: &KlineEntry) -> Result<Candle, MarketDataError> {
    if entry.len() < 6 {
        return Err(MarketDataError::Malformed(format!(
            "kline row has {} fields",
            entry.len()
        )));
    }
    let start_ms: i64 = entry[0]
        .parse()
        .map_err(|_| MarketDataError::Malformed(format!("invalid start time '{}'", entry[0])))?;
    let timestamp = DateTime::from_timestamp_millis(start_ms)
        .ok_or_else(|| MarketDataError::Malformed(format!("start time out of range: {}", start_ms)))?;

    Ok(Candle::new(
        parse_f64("open", &entry[1])?,
        parse_f64("high", &entry[2])?,
        parse_f64("low", &entry[3])?,
        parse_f64("close", &entry[4])?,
        parse_f64("volume", &entry[5])?,
        timestamp,
    ))
}

pub(crate) fn parse_ticker(entry: &TickerEntry) -> Result<Ticker, MarketDataError> {
    let last_price = parse_f64("lastPrice", &entry.last_price)?;
    let change = match entry.price_24h_pcnt.as_deref() {
        Some(raw) if !raw.is_empty() => parse_f64("price24hPcnt", raw)? * 100.0,
        _ => 0.0,
    };
    // Prefer quote turnover; fall back to base volume priced at last.
    let volume_24h = match (entry.turnover_24h.as_deref(), entry.volume_24h.as_deref()) {
        (Some(t), _) if !t.is_empty() => parse_f64("turnover24h", t)?,
        (_, Some(v)) if !v.is_empty() => parse_f64("volume24h", v)? * last_price,
        _ => 0.0,
    };
    Ok(Ticker::new(entry.symbol.clone(), last_price, volume_24h, change))
}

#[async_trait::async_trait]
impl MarketDataProvider for BybitClient {
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        count: usize,
    ) -> Result<Vec<Candle>, MarketDataError> {
        let limit = count.clamp(1, MAX_KLINE_LIMIT);
        let query = [
            ("category", CATEGORY.to_string()),
            ("symbol", symbol.to_string()),
            ("interval", interval.to_string()),
            ("limit", limit.to_string()),
        ];
        let result: ListResult<KlineEntry> = self.get("/v5/market/kline", &query).await?;

        let mut candles = result
            .list
            .iter()
            .map(parse_kline)
            .collect::<Result<Vec<_>, _>>()?;
        candles.sort_by_key(|c| c.timestamp);

        debug!(symbol = %symbol, interval = %interval, count = candles.len(), "Bybit: fetched candles");
        Ok(candles)
    }

    async fn fetch_ticker_universe(&self) -> Result<TickerUniverse, MarketDataError> {
        let query = [("category", CATEGORY.to_string())];
        let result: ListResult<TickerEntry> = self.get("/v5/market/tickers", &query).await?;

        let mut universe = TickerUniverse::with_capacity(result.list.len());
        for entry in &result.list {
            match parse_ticker(entry) {
                Ok(ticker) => {
                    universe.insert(ticker.symbol.clone(), ticker);
                }
                Err(e) => {
                    debug!(symbol = %entry.symbol, error = %e, "Bybit: skipping malformed ticker");
                }
            }
        }

        debug!(count = universe.len(), "Bybit: fetched ticker universe");
        Ok(universe)
    }
}
