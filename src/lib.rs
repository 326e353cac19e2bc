//! Crypto market scanner: EMA touch, daily flip and volume/mover detectors
//! with persistent alert cooldowns.

pub mod charts;
pub mod common;
pub mod config;
pub mod cooldown;
pub mod core;
pub mod error;
pub mod indicators;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod notifications;
pub mod scanners;
pub mod services;

pub use error::ScannerError;
