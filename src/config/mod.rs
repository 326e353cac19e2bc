//! Process settings (environment) and scanner settings (JSON file)

pub mod env;
pub mod scanner;
pub mod store;

pub use env::*;
pub use scanner::{
    ChartConfig, DailyFlipConfig, DetectorSchedule, EmaTouchConfig, FlipFilter, FlipReference,
    GeneralConfig, ScannerConfiguration, VolumeConfig, MAX_CANDLES, MAX_COOLDOWN_MINUTES,
    MAX_INTERVAL_MINUTES, MAX_REQUEST_TIMEOUT_SECS,
};
pub use store::ConfigStore;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("configuration file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
