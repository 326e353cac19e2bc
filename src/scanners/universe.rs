//! Symbol selection shared by the detectors

use std::cmp::Ordering;

use crate::config::GeneralConfig;
use crate::models::market::Ticker;
use crate::services::market_data::TickerUniverse;

/// Tickers quoted in the configured asset with enough 24h turnover, most
/// liquid first (ties by symbol).
pub fn liquid_universe(universe: &TickerUniverse, general: &GeneralConfig) -> Vec<Ticker> {
    let mut tickers: Vec<Ticker> = universe
        .values()
        .filter(|t| t.symbol.ends_with(general.quote_asset.as_str()))
        .filter(|t| t.volume_24h.is_finite() && t.volume_24h >= general.min_volume_24h)
        .cloned()
        .collect();
    tickers.sort_by(by_volume_desc);
    tickers
}

pub fn by_volume_desc(a: &Ticker, b: &Ticker) -> Ordering {
    b.volume_24h
        .total_cmp(&a.volume_24h)
        .then_with(|| a.symbol.cmp(&b.symbol))
}

/// Strongest 24h change first, ties by symbol.
pub fn by_change_desc(a: &Ticker, b: &Ticker) -> Ordering {
    b.change_24h_pct
        .total_cmp(&a.change_24h_pct)
        .then_with(|| a.symbol.cmp(&b.symbol))
}

/// Weakest 24h change first, ties by symbol.
pub fn by_change_asc(a: &Ticker, b: &Ticker) -> Ordering {
    a.change_24h_pct
        .total_cmp(&b.change_24h_pct)
        .then_with(|| a.symbol.cmp(&b.symbol))
}

/// Top `per_side` gainers followed by the top `per_side` losers, without
/// duplicates.
pub fn top_movers(tickers: &[Ticker], per_side: usize) -> Vec<Ticker> {
    let mut gainers = tickers.to_vec();
    gainers.sort_by(by_change_desc);
    let mut losers = tickers.to_vec();
    losers.sort_by(by_change_asc);

    let mut selected: Vec<Ticker> = gainers.into_iter().take(per_side).collect();
    for ticker in losers.into_iter().take(per_side) {
        if !selected.iter().any(|t| t.symbol == ticker.symbol) {
            selected.push(ticker);
        }
    }
    selected
}
