//! Trend indicators: EMA and distance to EMA

pub mod ema;

pub use ema::*;
