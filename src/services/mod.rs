//! External market data integrations

pub mod bybit;
pub mod market_data;

pub use bybit::BybitClient;
pub use market_data::{MarketDataError, MarketDataProvider, TickerUniverse};
