//! Crate-wide error taxonomy. Every variant is recoverable: detector loops
//! log it and carry on with the next symbol or cycle.

use thiserror::Error;

pub use crate::config::ConfigError;
pub use crate::cooldown::CooldownError;
pub use crate::indicators::IndicatorError;
pub use crate::notifications::NotifyError;
pub use crate::services::market_data::MarketDataError;

#[derive(Debug, Error)]
pub enum ScannerError {
    #[error(transparent)]
    Indicator(#[from] IndicatorError),

    #[error(transparent)]
    MarketData(#[from] MarketDataError),

    #[error(transparent)]
    Cooldown(#[from] CooldownError),

    #[error(transparent)]
    Notify(#[from] NotifyError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("unknown scanner '{0}'")]
    UnknownScanner(String),

    #[error("detector cycle aborted: {0}")]
    CycleAborted(String),
}
