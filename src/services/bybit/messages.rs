//! Bybit v5 response payloads

use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub ret_code: i64,
    #[serde(default)]
    pub ret_msg: String,
    pub result: Option<T>,
}

#[derive(Debug, Deserialize)]
pub struct ListResult<T> {
    #[serde(default = "Vec::new")]
    pub list: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerEntry {
    pub symbol: String,
    pub last_price: String,
    #[serde(default)]
    pub price_24h_pcnt: Option<String>,
    #[serde(default)]
    pub turnover_24h: Option<String>,
    #[serde(default)]
    pub volume_24h: Option<String>,
}

/// `[startTime, open, high, low, close, volume, turnover]`, newest first.
pub type KlineEntry = Vec<String>;
