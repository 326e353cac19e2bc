//! Signal detectors and the shared notification path.
//!
//! Each detector owns its cross-cycle state explicitly and is driven one
//! cycle at a time with a [`Cycle`]: an immutable configuration snapshot,
//! the evaluation timestamp and a stop signal checked between symbols.

pub mod daily_flip;
pub mod ema_touch;
pub mod universe;
pub mod volume;

pub use daily_flip::{DailyFlipDetector, DailyFlipState};
pub use ema_touch::{EmaTouchDetector, EmaTouchState};
pub use volume::VolumeDetector;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::charts::render_chart;
use crate::config::ScannerConfiguration;
use crate::cooldown::CooldownStore;
use crate::core::shutdown::StopSignal;
use crate::error::ScannerError;
use crate::metrics::Metrics;
use crate::models::market::Candle;
use crate::models::signal::{SignalEvent, SignalKind};
use crate::notifications::{render_alert, send_with_timeout, Notifier};
use crate::services::market_data::MarketDataProvider;

/// Collaborators shared by every detector.
pub struct ScanContext {
    pub market_data: Arc<dyn MarketDataProvider>,
    pub notifier: Arc<dyn Notifier>,
    pub cooldowns: Arc<CooldownStore>,
    pub metrics: Option<Arc<Metrics>>,
}

impl ScanContext {
    pub fn new(
        market_data: Arc<dyn MarketDataProvider>,
        notifier: Arc<dyn Notifier>,
        cooldowns: Arc<CooldownStore>,
    ) -> Self {
        Self {
            market_data,
            notifier,
            cooldowns,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// Inputs of a single detector cycle.
pub struct Cycle<'a> {
    pub ctx: &'a ScanContext,
    pub config: &'a ScannerConfiguration,
    pub now: DateTime<Utc>,
    pub stop: &'a StopSignal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanReport {
    pub symbols_scanned: usize,
    pub symbols_skipped: usize,
    pub signals_detected: usize,
    /// Alerts that passed the cooldown and were handed to the notifier,
    /// whether or not delivery succeeded.
    pub alerts_dispatched: usize,
    pub alerts_suppressed: usize,
    /// Fresh signals left over once the per-cycle alert budget ran out.
    pub alerts_dropped: usize,
    pub dispatch_failures: usize,
    pub interrupted: bool,
    pub alerts: Vec<SignalEvent>,
}

#[async_trait::async_trait]
pub trait Detector: Send {
    fn kind(&self) -> SignalKind;

    async fn scan(&mut self, cycle: &Cycle<'_>) -> Result<ScanReport, ScannerError>;
}

/// Gate `events` through the cooldown store and notify the fresh ones.
///
/// A cooldown is recorded before sending and is kept even when delivery
/// fails, so a flaky transport cannot cause repeated alerts. When `chart`
/// holds the candles behind the events and charts are enabled, each alert
/// carries a rendered chart; a rendering failure falls back to text.
///
/// Returns the events that were neither sent nor suppressed because the
/// budget ran out or a stop was requested, so detectors can keep them
/// eligible for a later cycle.
pub(crate) async fn dispatch(
    cycle: &Cycle<'_>,
    kind: SignalKind,
    events: Vec<SignalEvent>,
    chart: Option<&[Candle]>,
    budget: usize,
    report: &mut ScanReport,
) -> Vec<SignalEvent> {
    let ctx = cycle.ctx;
    let cooldown = cycle.config.schedule(kind).cooldown;
    let timeout = cycle.config.request_timeout();
    let label = kind.as_str();
    let mut dropped = Vec::new();

    for event in events {
        report.signals_detected += 1;
        if let Some(m) = &ctx.metrics {
            m.signals_total.with_label_values(&[label]).inc();
        }

        if report.alerts_dispatched >= budget || cycle.stop.is_stopped() {
            report.alerts_dropped += 1;
            report.interrupted |= cycle.stop.is_stopped();
            dropped.push(event);
            continue;
        }

        let key = event.cooldown_key();
        if !ctx.cooldowns.try_acquire(&key, cooldown, cycle.now).await {
            debug!(detector = label, key = %key, "Signal suppressed by cooldown");
            report.alerts_suppressed += 1;
            if let Some(m) = &ctx.metrics {
                m.alerts_suppressed_total.with_label_values(&[label]).inc();
            }
            continue;
        }

        if let Err(e) = ctx.cooldowns.save().await {
            warn!(detector = label, error = %e, "Failed to persist cooldown store");
        }

        let text = render_alert(&event);
        let image = match chart {
            Some(candles) if cycle.config.charts.enabled => chart_image(candles, cycle.config, label).await,
            _ => None,
        };
        match send_with_timeout(ctx.notifier.as_ref(), &text, image.as_deref(), timeout).await {
            Ok(()) => {
                info!(detector = label, symbol = %event.symbol, key = %key, "Alert sent");
            }
            Err(e) => {
                warn!(detector = label, symbol = %event.symbol, error = %e, "Alert delivery failed, not retrying");
                report.dispatch_failures += 1;
                if let Some(m) = &ctx.metrics {
                    m.dispatch_failures_total.with_label_values(&[label]).inc();
                }
            }
        }

        report.alerts_dispatched += 1;
        if let Some(m) = &ctx.metrics {
            m.alerts_sent_total.with_label_values(&[label]).inc();
        }
        report.alerts.push(event);
    }

    dropped
}

/// Render off the async runtime; `None` when rendering fails.
async fn chart_image(candles: &[Candle], config: &ScannerConfiguration, label: &str) -> Option<Vec<u8>> {
    let candles = candles.to_vec();
    let chart_config = config.charts.clone();
    match tokio::task::spawn_blocking(move || render_chart(&candles, &chart_config)).await {
        Ok(Ok(png)) => Some(png),
        Ok(Err(e)) => {
            warn!(detector = label, error = %e, "Chart rendering failed, sending text only");
            None
        }
        Err(e) => {
            warn!(detector = label, error = %e, "Chart rendering task failed, sending text only");
            None
        }
    }
}
