//! Crypto scanner service
//!
//! Runs the EMA touch, daily flip and volume detectors on their own
//! intervals and serves the control surface on `PORT`.

use chrono::Utc;
use crypto_scanner::config::{self, ConfigStore};
use crypto_scanner::cooldown::CooldownStore;
use crypto_scanner::core::{start_server, AppState, ScannerManager};
use crypto_scanner::logging::init_logging;
use crypto_scanner::metrics::Metrics;
use crypto_scanner::notifications::{LogNotifier, Notifier, TelegramNotifier};
use crypto_scanner::scanners::ScanContext;
use crypto_scanner::services::BybitClient;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_logging();

    let port = config::get_port();
    info!(
        environment = %config::get_environment(),
        port = port,
        "Starting crypto scanner"
    );

    let config_store = ConfigStore::load_or_default(config::get_scanner_config_path()).await;
    if let Some(threshold) = config::get_ema_touch_threshold_override() {
        match config_store
            .apply_override(|cfg| cfg.ema_touch.touch_threshold_pct = threshold)
            .await
        {
            Ok(_) => info!(threshold_pct = threshold, "EMA touch threshold overridden from environment"),
            Err(e) => warn!(error = %e, "Ignoring EMA_TOUCH_THRESHOLD override"),
        }
    }
    let config_store = Arc::new(config_store);
    let snapshot = config_store.get_config().await;
    let timeout = snapshot.request_timeout();

    let cooldowns = CooldownStore::load(config::get_cooldown_path()).await;
    let evicted = cooldowns.compact(Utc::now()).await;
    if evicted > 0 {
        info!(evicted = evicted, "Dropped expired cooldowns");
        if let Err(e) = cooldowns.save().await {
            warn!(error = %e, "Failed to persist compacted cooldowns");
        }
    }
    let cooldowns = Arc::new(cooldowns);

    let market_data = Arc::new(BybitClient::new(config::get_bybit_base_url(), timeout)?);

    let notifier: Arc<dyn Notifier> = match config::get_telegram_settings() {
        Some(settings) => {
            let http = reqwest::Client::builder().timeout(timeout).build()?;
            info!("Telegram notifications enabled");
            Arc::new(TelegramNotifier::with_client(
                settings.api_url,
                settings.token,
                settings.chat_id,
                http,
            ))
        }
        None => {
            warn!("TELEGRAM_TOKEN/TELEGRAM_CHAT_ID not set, alerts will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let metrics = Arc::new(Metrics::new()?);
    let ctx = Arc::new(
        ScanContext::new(market_data, notifier, cooldowns.clone()).with_metrics(metrics.clone()),
    );
    let manager = Arc::new(ScannerManager::new(config_store, ctx));
    manager.start_all().await;

    let state = AppState::new(manager.clone(), metrics);
    let server = tokio::spawn(async move {
        let shutdown = async {
            let _ = signal::ctrl_c().await;
        };
        if let Err(e) = start_server(port, state, shutdown).await {
            error!(error = %e, "HTTP server error");
        }
    });

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        _ = server => {
            warn!("HTTP server stopped");
        }
    }

    manager.shutdown().await;
    if let Err(e) = cooldowns.save().await {
        error!(error = %e, "Failed to persist cooldowns on shutdown");
    }
    info!("Crypto scanner stopped");

    Ok(())
}
