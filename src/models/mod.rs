//! Shared data models spanning the engine layers.

pub mod indicators;
pub mod market;
pub mod signal;

pub use indicators::{EmaIndicator, Side};
pub use market::{Candle, Ticker};
pub use signal::{
    CooldownKey, FlipDirection, MoverCategory, SignalDetail, SignalDirection, SignalEvent,
    SignalKind,
};
