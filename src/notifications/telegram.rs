//! Telegram Bot API transport

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use super::{Notifier, NotifyError};

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

pub struct TelegramNotifier {
    api_url: String,
    token: String,
    chat_id: String,
    http: Client,
}

impl TelegramNotifier {
    pub fn with_client(
        api_url: impl Into<String>,
        token: impl Into<String>,
        chat_id: impl Into<String>,
        http: Client,
    ) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            chat_id: chat_id.into(),
            http,
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }

    async fn send_message(&self, text: &str) -> Result<reqwest::Response, reqwest::Error> {
        self.http
            .post(self.method_url("sendMessage"))
            .json(&json!({
                "chat_id": self.chat_id,
                "text": text,
                "parse_mode": "Markdown",
                "disable_web_page_preview": true,
            }))
            .send()
            .await
    }

    async fn send_photo(&self, caption: &str, image: &[u8]) -> Result<reqwest::Response, reqwest::Error> {
        let photo = Part::bytes(image.to_vec())
            .file_name("chart.png")
            .mime_str("image/png")?;
        let form = Form::new()
            .text("chat_id", self.chat_id.clone())
            .text("caption", caption.to_string())
            .text("parse_mode", "Markdown")
            .part("photo", photo);

        self.http
            .post(self.method_url("sendPhoto"))
            .multipart(form)
            .send()
            .await
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str, image: Option<&[u8]>) -> Result<(), NotifyError> {
        let response = match image {
            Some(bytes) => self.send_photo(text, bytes).await,
            None => self.send_message(text).await,
        }
        .map_err(|e| NotifyError::DispatchFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::DispatchFailed(format!(
                "telegram returned HTTP {}: {}",
                status, body
            )));
        }

        debug!(with_image = image.is_some(), "Telegram: alert delivered");
        Ok(())
    }
}
