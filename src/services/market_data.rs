//! Market data provider interface consumed by the detectors.

use crate::models::market::{Candle, Ticker};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

pub type TickerUniverse = HashMap<String, Ticker>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MarketDataError {
    /// Network or transport failure, including timeouts.
    #[error("market data unavailable: {0}")]
    Unavailable(String),

    /// The exchange answered with an error code.
    #[error("exchange API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("malformed market data: {0}")]
    Malformed(String),
}

impl MarketDataError {
    /// Worth retrying within the same request.
    pub fn is_transient(&self) -> bool {
        matches!(self, MarketDataError::Unavailable(_))
    }
}

#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Candles for `symbol`, ordered oldest first.
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        count: usize,
    ) -> Result<Vec<Candle>, MarketDataError>;

    /// 24h snapshot of every listed instrument.
    async fn fetch_ticker_universe(&self) -> Result<TickerUniverse, MarketDataError>;
}

/// Fetch candles with a deadline; a timeout is reported as `Unavailable`.
pub async fn fetch_candles_with_timeout(
    provider: &dyn MarketDataProvider,
    symbol: &str,
    interval: &str,
    count: usize,
    timeout: Duration,
) -> Result<Vec<Candle>, MarketDataError> {
    match tokio::time::timeout(timeout, provider.fetch_candles(symbol, interval, count)).await {
        Ok(result) => result,
        Err(_) => Err(MarketDataError::Unavailable(format!(
            "candle fetch for {} timed out after {:?}",
            symbol, timeout
        ))),
    }
}

/// Fetch the ticker universe with a deadline.
pub async fn fetch_universe_with_timeout(
    provider: &dyn MarketDataProvider,
    timeout: Duration,
) -> Result<TickerUniverse, MarketDataError> {
    match tokio::time::timeout(timeout, provider.fetch_ticker_universe()).await {
        Ok(result) => result,
        Err(_) => Err(MarketDataError::Unavailable(format!(
            "ticker fetch timed out after {:?}",
            timeout
        ))),
    }
}
