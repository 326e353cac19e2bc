//! Exchange market data records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub timestamp: DateTime<Utc>,
}

impl Candle {
    pub fn new(
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            open,
            high,
            low,
            close,
            volume,
            timestamp,
        }
    }

    /// Absolute body size as a percentage of the open.
    pub fn body_pct(&self) -> f64 {
        if self.open == 0.0 {
            return 0.0;
        }
        ((self.close - self.open) / self.open * 100.0).abs()
    }
}

/// 24h snapshot of one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    pub last_price: f64,
    /// 24h turnover in quote currency.
    pub volume_24h: f64,
    pub change_24h_pct: f64,
}

impl Ticker {
    pub fn new(symbol: impl Into<String>, last_price: f64, volume_24h: f64, change_24h_pct: f64) -> Self {
        Self {
            symbol: symbol.into(),
            last_price,
            volume_24h,
            change_24h_pct,
        }
    }
}
