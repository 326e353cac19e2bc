//! Gainer / loser / volume-surge detector.
//!
//! Rankings are recomputed from scratch every cycle; nothing about previous
//! rankings is kept.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::universe::{by_change_asc, by_change_desc, liquid_universe};
use super::{dispatch, Cycle, Detector, ScanReport};
use crate::common::math::mean;
use crate::config::VolumeConfig;
use crate::error::ScannerError;
use crate::models::market::{Candle, Ticker};
use crate::models::signal::{MoverCategory, SignalDetail, SignalDirection, SignalEvent, SignalKind};
use crate::services::market_data::{fetch_candles_with_timeout, fetch_universe_with_timeout};

/// Volume of the latest candle over the mean volume of the `lookback`
/// candles before it. `None` without a usable baseline.
pub fn volume_ratio(candles: &[Candle], lookback: usize) -> Option<f64> {
    let (last, history) = candles.split_last()?;
    if history.is_empty() || lookback == 0 {
        return None;
    }
    let start = history.len().saturating_sub(lookback);
    let volumes: Vec<f64> = history[start..].iter().map(|c| c.volume).collect();
    let baseline = mean(&volumes)?;
    if baseline <= 0.0 || !baseline.is_finite() || !last.volume.is_finite() {
        return None;
    }
    Some(last.volume / baseline)
}

fn mover_event(
    ticker: &Ticker,
    category: MoverCategory,
    volume_ratio: Option<f64>,
    now: DateTime<Utc>,
) -> SignalEvent {
    let (direction, magnitude) = match category {
        MoverCategory::Gainer => (SignalDirection::Up, ticker.change_24h_pct),
        MoverCategory::Loser => (SignalDirection::Down, ticker.change_24h_pct.abs()),
        MoverCategory::VolumeSurge => (
            if ticker.change_24h_pct >= 0.0 {
                SignalDirection::Up
            } else {
                SignalDirection::Down
            },
            volume_ratio.unwrap_or_default(),
        ),
    };

    SignalEvent {
        symbol: ticker.symbol.clone(),
        kind: SignalKind::VolumeSpike,
        direction,
        magnitude,
        timestamp: now,
        detail: SignalDetail::Mover {
            category,
            price: ticker.last_price,
            change_24h_pct: ticker.change_24h_pct,
            volume_ratio,
            volume_24h: ticker.volume_24h,
        },
    }
}

/// Rank `tickers` and emit events for every enabled category, strongest
/// first, at most `max_per_category` each. Thresholds are inclusive.
pub fn detect_movers(
    tickers: &[Ticker],
    ratios: &HashMap<String, f64>,
    config: &VolumeConfig,
    max_per_category: usize,
    now: DateTime<Utc>,
) -> Vec<SignalEvent> {
    let mut events = Vec::new();

    if config.gainers_enabled {
        let mut gainers: Vec<&Ticker> = tickers
            .iter()
            .filter(|t| t.change_24h_pct >= config.gainer_threshold_pct)
            .collect();
        gainers.sort_by(|a, b| by_change_desc(a, b));
        events.extend(
            gainers
                .into_iter()
                .take(max_per_category)
                .map(|t| mover_event(t, MoverCategory::Gainer, ratios.get(&t.symbol).copied(), now)),
        );
    }

    if config.losers_enabled {
        let mut losers: Vec<&Ticker> = tickers
            .iter()
            .filter(|t| t.change_24h_pct <= -config.loser_threshold_pct)
            .collect();
        losers.sort_by(|a, b| by_change_asc(a, b));
        events.extend(
            losers
                .into_iter()
                .take(max_per_category)
                .map(|t| mover_event(t, MoverCategory::Loser, ratios.get(&t.symbol).copied(), now)),
        );
    }

    if config.volume_spike_enabled {
        let mut surges: Vec<(&Ticker, f64)> = tickers
            .iter()
            .filter_map(|t| ratios.get(&t.symbol).map(|&r| (t, r)))
            .filter(|(_, r)| *r >= config.volume_ratio_threshold)
            .collect();
        surges.sort_by(|(a, ra), (b, rb)| rb.total_cmp(ra).then_with(|| a.symbol.cmp(&b.symbol)));
        events.extend(
            surges
                .into_iter()
                .take(max_per_category)
                .map(|(t, r)| mover_event(t, MoverCategory::VolumeSurge, Some(r), now)),
        );
    }

    events
}

#[derive(Debug, Default)]
pub struct VolumeDetector;

impl VolumeDetector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Detector for VolumeDetector {
    fn kind(&self) -> SignalKind {
        SignalKind::VolumeSpike
    }

    async fn scan(&mut self, cycle: &Cycle<'_>) -> Result<ScanReport, ScannerError> {
        let config = &cycle.config.volume;
        let general = &cycle.config.general;
        let timeout = cycle.config.request_timeout();
        let provider = cycle.ctx.market_data.as_ref();
        let mut report = ScanReport::default();

        let universe = fetch_universe_with_timeout(provider, timeout).await?;
        let liquid = liquid_universe(&universe, general);

        let mut ratios = HashMap::new();
        if config.volume_spike_enabled {
            for ticker in liquid.iter().take(general.max_symbols) {
                if cycle.stop.is_stopped() {
                    report.interrupted = true;
                    return Ok(report);
                }
                match fetch_candles_with_timeout(
                    provider,
                    &ticker.symbol,
                    &config.candle_interval,
                    config.volume_lookback + 1,
                    timeout,
                )
                .await
                {
                    Ok(candles) => match volume_ratio(&candles, config.volume_lookback) {
                        Some(ratio) => {
                            ratios.insert(ticker.symbol.clone(), ratio);
                        }
                        None => debug!(symbol = %ticker.symbol, "Volume: no usable baseline"),
                    },
                    Err(e) => {
                        warn!(symbol = %ticker.symbol, error = %e, "Volume: candle fetch failed, skipping ratio");
                        report.symbols_skipped += 1;
                    }
                }
            }
        }
        report.symbols_scanned = liquid.len();

        if let Some(top) = liquid.iter().max_by(|a, b| by_change_asc(a, b)) {
            info!(symbol = %top.symbol, change_24h_pct = top.change_24h_pct, "Volume: top gainer");
        }
        if let Some(bottom) = liquid.iter().min_by(|a, b| by_change_asc(a, b)) {
            info!(symbol = %bottom.symbol, change_24h_pct = bottom.change_24h_pct, "Volume: top loser");
        }

        let events = detect_movers(&liquid, &ratios, config, general.max_alerts_per_cycle, cycle.now);
        let budget = events.len();
        dispatch(cycle, SignalKind::VolumeSpike, events, None, budget, &mut report).await;

        Ok(report)
    }
}
