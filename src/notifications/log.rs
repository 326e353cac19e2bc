use super::{Notifier, NotifyError};
use tracing::info;

/// Writes alerts to the log. Used when no chat transport is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, text: &str, image: Option<&[u8]>) -> Result<(), NotifyError> {
        info!(
            image_bytes = image.map(|i| i.len()).unwrap_or(0),
            "ALERT (telegram not configured): {}",
            text
        );
        Ok(())
    }

    fn is_configured(&self) -> bool {
        false
    }
}
