//! Environment-derived settings

use std::env;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_SCANNER_CONFIG_PATH: &str = "/data/scanner_config.json";
pub const DEFAULT_COOLDOWN_PATH: &str = "/data/cooldowns.json";

/// Deployment environment, e.g. `production` or `sandbox`.
pub fn get_environment() -> String {
    env::var("ENVIRONMENT").unwrap_or_else(|_| "sandbox".to_string())
}

pub fn get_port() -> u16 {
    env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT)
}

pub fn get_scanner_config_path() -> String {
    env::var("SCANNER_CONFIG_PATH").unwrap_or_else(|_| DEFAULT_SCANNER_CONFIG_PATH.to_string())
}

pub fn get_cooldown_path() -> String {
    env::var("COOLDOWN_PATH").unwrap_or_else(|_| DEFAULT_COOLDOWN_PATH.to_string())
}

pub fn get_bybit_base_url() -> String {
    env::var("BYBIT_BASE_URL")
        .unwrap_or_else(|_| crate::services::bybit::client::DEFAULT_BASE_URL.to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub struct TelegramSettings {
    pub token: String,
    pub chat_id: String,
    pub api_url: String,
}

/// Telegram credentials, `None` unless both token and chat id are set.
pub fn get_telegram_settings() -> Option<TelegramSettings> {
    let token = env::var("TELEGRAM_TOKEN").ok().filter(|t| !t.trim().is_empty())?;
    let chat_id = env::var("TELEGRAM_CHAT_ID").ok().filter(|c| !c.trim().is_empty())?;
    let api_url = env::var("TELEGRAM_API_URL")
        .unwrap_or_else(|_| crate::notifications::telegram::DEFAULT_API_URL.to_string());
    Some(TelegramSettings {
        token,
        chat_id,
        api_url,
    })
}

/// `EMA_TOUCH_THRESHOLD` overrides the touch threshold from the config file.
pub fn get_ema_touch_threshold_override() -> Option<f64> {
    env::var("EMA_TOUCH_THRESHOLD")
        .ok()
        .and_then(|v| v.trim().parse().ok())
}
