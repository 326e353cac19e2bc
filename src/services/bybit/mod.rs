//! Bybit v5 REST market data (linear perpetuals)

pub mod client;
pub mod messages;

pub use client::BybitClient;
