//! EMA touch detector: price within a threshold distance of an EMA, first
//! touch per symbol and period per UTC day.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::universe::liquid_universe;
use super::{dispatch, Cycle, Detector, ScanReport};
use crate::config::EmaTouchConfig;
use crate::error::ScannerError;
use crate::indicators::trend::{calculate_ema, distance_pct};
use crate::models::indicators::Side;
use crate::models::market::Candle;
use crate::models::signal::{SignalDetail, SignalDirection, SignalEvent, SignalKind};
use crate::services::market_data::{fetch_candles_with_timeout, fetch_universe_with_timeout};

/// Day-scoped touch flags. The day rolls over at midnight UTC.
#[derive(Debug, Clone, Default)]
pub struct EmaTouchState {
    day: Option<NaiveDate>,
    touched: HashSet<(String, u32)>,
}

impl EmaTouchState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the flags when `now` falls on a new UTC date.
    pub fn roll_to(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if self.day != Some(today) {
            if self.day.is_some() {
                debug!(day = %today, cleared = self.touched.len(), "EMA touch: new UTC day, resetting touch flags");
            }
            self.touched.clear();
            self.day = Some(today);
        }
    }

    pub fn has_touched(&self, symbol: &str, period: u32) -> bool {
        self.touched.contains(&(symbol.to_string(), period))
    }

    /// Flag a touch. Returns `true` if it is the first one today.
    pub fn mark(&mut self, symbol: &str, period: u32) -> bool {
        self.touched.insert((symbol.to_string(), period))
    }

    /// Withdraw a flag for a touch that was never delivered.
    pub fn unmark(&mut self, symbol: &str, period: u32) {
        self.touched.remove(&(symbol.to_string(), period));
    }
}

/// Evaluate every configured period against the latest close.
///
/// Periods without enough candles are skipped. Novelty is tracked in
/// `state` independently of any notification cooldown.
pub fn evaluate_touches(
    state: &mut EmaTouchState,
    symbol: &str,
    candles: &[Candle],
    config: &EmaTouchConfig,
    now: DateTime<Utc>,
) -> Vec<SignalEvent> {
    state.roll_to(now);

    let Some(last) = candles.last() else {
        return Vec::new();
    };
    let price = last.close;
    let mut events = Vec::new();

    for &period in &config.periods {
        let ema = match calculate_ema(candles, period) {
            Ok(ema) => ema,
            Err(e) => {
                debug!(symbol = %symbol, period = period, error = %e, "EMA touch: skipping period");
                continue;
            }
        };
        let distance = match distance_pct(price, ema.value) {
            Ok(d) => d,
            Err(e) => {
                debug!(symbol = %symbol, period = period, error = %e, "EMA touch: skipping period");
                continue;
            }
        };

        if distance.abs() > config.touch_threshold_pct {
            continue;
        }
        if !state.mark(symbol, period) {
            debug!(symbol = %symbol, period = period, "EMA touch: already touched today");
            continue;
        }

        let side = if price >= ema.value { Side::Above } else { Side::Below };
        let direction = match side {
            Side::Above => SignalDirection::Up,
            Side::Below => SignalDirection::Down,
        };

        events.push(SignalEvent {
            symbol: symbol.to_string(),
            kind: SignalKind::EmaTouch,
            direction,
            magnitude: distance.abs(),
            timestamp: now,
            detail: SignalDetail::EmaTouch {
                period,
                ema: ema.value,
                price,
                distance_pct: distance,
                side,
            },
        });
    }

    events
}

#[derive(Debug, Default)]
pub struct EmaTouchDetector {
    state: EmaTouchState,
}

impl EmaTouchDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: EmaTouchState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &EmaTouchState {
        &self.state
    }
}

#[async_trait::async_trait]
impl Detector for EmaTouchDetector {
    fn kind(&self) -> SignalKind {
        SignalKind::EmaTouch
    }

    async fn scan(&mut self, cycle: &Cycle<'_>) -> Result<ScanReport, ScannerError> {
        let config = &cycle.config.ema_touch;
        let general = &cycle.config.general;
        let timeout = cycle.config.request_timeout();
        let provider = cycle.ctx.market_data.as_ref();
        let mut report = ScanReport::default();

        let universe = fetch_universe_with_timeout(provider, timeout).await?;
        let symbols: Vec<_> = liquid_universe(&universe, general)
            .into_iter()
            .take(general.max_symbols)
            .collect();

        info!(
            symbols = symbols.len(),
            threshold_pct = config.touch_threshold_pct,
            periods = ?config.periods,
            "EMA touch: scanning {} symbols",
            symbols.len()
        );

        for ticker in &symbols {
            if cycle.stop.is_stopped() {
                report.interrupted = true;
                break;
            }
            if report.alerts_dispatched >= general.max_alerts_per_cycle {
                debug!("EMA touch: alert budget exhausted for this cycle");
                break;
            }

            let candles = match fetch_candles_with_timeout(
                provider,
                &ticker.symbol,
                &config.candle_interval,
                config.candle_count,
                timeout,
            )
            .await
            {
                Ok(candles) => candles,
                Err(e) => {
                    warn!(symbol = %ticker.symbol, error = %e, "EMA touch: candle fetch failed, skipping symbol");
                    report.symbols_skipped += 1;
                    continue;
                }
            };
            report.symbols_scanned += 1;

            let events = evaluate_touches(&mut self.state, &ticker.symbol, &candles, config, cycle.now);
            let dropped = dispatch(
                cycle,
                SignalKind::EmaTouch,
                events,
                Some(&candles),
                general.max_alerts_per_cycle,
                &mut report,
            )
            .await;
            for event in dropped {
                if let SignalDetail::EmaTouch { period, .. } = event.detail {
                    self.state.unmark(&event.symbol, period);
                }
            }
        }

        Ok(report)
    }
}
