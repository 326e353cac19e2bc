//! Unit tests for symbol selection

use crypto_scanner::config::GeneralConfig;
use crypto_scanner::models::market::Ticker;
use crypto_scanner::scanners::universe::{liquid_universe, top_movers};
use crypto_scanner::services::market_data::TickerUniverse;

fn universe(tickers: Vec<Ticker>) -> TickerUniverse {
    tickers.into_iter().map(|t| (t.symbol.clone(), t)).collect()
}

fn symbols(tickers: &[Ticker]) -> Vec<&str> {
    tickers.iter().map(|t| t.symbol.as_str()).collect()
}

#[test]
fn test_liquid_universe_filters_quote_and_volume() {
    let general = GeneralConfig {
        min_volume_24h: 1_000_000.0,
        ..GeneralConfig::default()
    };
    let universe = universe(vec![
        Ticker::new("BTCUSDT", 60_000.0, 900_000_000.0, 1.0),
        Ticker::new("ETHUSDT", 3_000.0, 400_000_000.0, 2.0),
        Ticker::new("ETHBTC", 0.05, 900_000_000.0, 0.5),
        Ticker::new("DUSTUSDT", 0.001, 10_000.0, 40.0),
    ]);

    let liquid = liquid_universe(&universe, &general);
    assert_eq!(symbols(&liquid), vec!["BTCUSDT", "ETHUSDT"]);
}

#[test]
fn test_liquid_universe_breaks_volume_ties_by_symbol() {
    let general = GeneralConfig {
        min_volume_24h: 0.0,
        ..GeneralConfig::default()
    };
    let universe = universe(vec![
        Ticker::new("BBBUSDT", 1.0, 5_000.0, 0.0),
        Ticker::new("AAAUSDT", 1.0, 5_000.0, 0.0),
        Ticker::new("CCCUSDT", 1.0, 9_000.0, 0.0),
    ]);

    let liquid = liquid_universe(&universe, &general);
    assert_eq!(symbols(&liquid), vec!["CCCUSDT", "AAAUSDT", "BBBUSDT"]);
}

#[test]
fn test_top_movers_takes_both_sides_without_duplicates() {
    let tickers = vec![
        Ticker::new("AUSDT", 1.0, 1.0, 15.0),
        Ticker::new("BUSDT", 1.0, 1.0, 8.0),
        Ticker::new("CUSDT", 1.0, 1.0, -12.0),
        Ticker::new("DUSDT", 1.0, 1.0, -3.0),
    ];

    let movers = top_movers(&tickers, 2);
    assert_eq!(symbols(&movers), vec!["AUSDT", "BUSDT", "CUSDT", "DUSDT"]);

    let movers = top_movers(&tickers[..3], 2);
    assert_eq!(symbols(&movers), vec!["AUSDT", "BUSDT", "CUSDT"]);
}
