//! Alert delivery

pub mod format;
pub mod log;
pub mod telegram;

pub use format::render_alert;
pub use log::LogNotifier;
pub use telegram::TelegramNotifier;

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum NotifyError {
    /// Delivery failed. The alert still counts as consumed.
    #[error("notification dispatch failed: {0}")]
    DispatchFailed(String),
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str, image: Option<&[u8]>) -> Result<(), NotifyError>;

    fn is_configured(&self) -> bool {
        true
    }
}

/// Send with a deadline; a timeout is reported as `DispatchFailed`.
pub async fn send_with_timeout(
    notifier: &dyn Notifier,
    text: &str,
    image: Option<&[u8]>,
    timeout: Duration,
) -> Result<(), NotifyError> {
    match tokio::time::timeout(timeout, notifier.send(text, image)).await {
        Ok(result) => result,
        Err(_) => Err(NotifyError::DispatchFailed(format!(
            "send timed out after {:?}",
            timeout
        ))),
    }
}
