//! Daily flip detector: the price/EMA (or EMA/EMA) relationship changes side
//! between two consecutive cycles on a liquid symbol.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::universe::{liquid_universe, top_movers};
use super::{dispatch, Cycle, Detector, ScanReport};
use crate::config::{DailyFlipConfig, FlipFilter, FlipReference};
use crate::error::ScannerError;
use crate::indicators::trend::{calculate_ema, ema_cross_side};
use crate::indicators::IndicatorError;
use crate::models::indicators::Side;
use crate::models::market::{Candle, Ticker};
use crate::models::signal::{FlipDirection, SignalDetail, SignalDirection, SignalEvent, SignalKind};
use crate::services::market_data::{fetch_candles_with_timeout, fetch_universe_with_timeout};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Observation {
    side: Side,
    cycle: u64,
}

/// Side observed per symbol in the previous cycle. In-memory only; after a
/// restart the first cycle just re-establishes the baseline.
#[derive(Debug, Clone, Default)]
pub struct DailyFlipState {
    cycle: u64,
    observations: HashMap<String, Observation>,
}

impl DailyFlipState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance to the next cycle. Must be called once per cycle before
    /// observing symbols.
    pub fn begin_cycle(&mut self) -> u64 {
        self.cycle += 1;
        self.cycle
    }

    /// Side recorded for `symbol` in the current or previous cycle.
    pub fn previous_side(&self, symbol: &str) -> Option<Side> {
        self.observations
            .get(symbol)
            .filter(|o| o.cycle + 1 >= self.cycle)
            .map(|o| o.side)
    }

    /// Record `side` for the current cycle and return the side seen in the
    /// immediately preceding cycle, if any.
    pub fn observe(&mut self, symbol: &str, side: Side) -> Option<Side> {
        let current = self.cycle;
        let previous = self
            .observations
            .insert(symbol.to_string(), Observation { side, cycle: current });
        previous.filter(|o| o.cycle + 1 == current).map(|o| o.side)
    }

    /// Record `side` as this cycle's observation without comparing, so a
    /// flip that was never delivered is detected again next cycle.
    pub fn restore(&mut self, symbol: &str, side: Side) {
        let current = self.cycle;
        self.observations
            .insert(symbol.to_string(), Observation { side, cycle: current });
    }

    /// Keep the last side alive for this cycle when the relationship is
    /// exactly flat.
    fn carry_forward(&mut self, symbol: &str) {
        let current = self.cycle;
        if let Some(o) = self.observations.get_mut(symbol) {
            if o.cycle + 1 == current {
                o.cycle = current;
            }
        }
    }
}

/// Side of the configured relationship on the latest candle; `None` when
/// exactly flat.
pub fn relationship_side(candles: &[Candle], reference: FlipReference) -> Result<Option<Side>, IndicatorError> {
    match reference {
        FlipReference::PriceVsEma { period } => {
            let ema = calculate_ema(candles, period)?;
            let price = candles
                .last()
                .map(|c| c.close)
                .ok_or(IndicatorError::InsufficientData { period, available: 0 })?;
            Ok(Side::of(price, ema.value))
        }
        FlipReference::EmaCross { fast, slow } => ema_cross_side(candles, fast, slow),
    }
}

fn allowed(filter: FlipFilter, flip: FlipDirection) -> bool {
    match filter {
        FlipFilter::Both => true,
        FlipFilter::Bullish => flip == FlipDirection::Bullish,
        FlipFilter::Bearish => flip == FlipDirection::Bearish,
    }
}

/// Update `state` with this cycle's side for `ticker` and return a flip
/// event when the side changed and the flip passes the volume floor and
/// direction filter. State is updated even when the flip is filtered out.
pub fn evaluate_flip(
    state: &mut DailyFlipState,
    ticker: &Ticker,
    candles: &[Candle],
    config: &DailyFlipConfig,
    now: DateTime<Utc>,
) -> Result<Option<SignalEvent>, IndicatorError> {
    let symbol = ticker.symbol.as_str();
    let Some(side) = relationship_side(candles, config.reference)? else {
        state.carry_forward(symbol);
        return Ok(None);
    };

    let Some(previous) = state.observe(symbol, side) else {
        return Ok(None);
    };
    if previous == side {
        return Ok(None);
    }

    let flip = match side {
        Side::Above => FlipDirection::Bullish,
        Side::Below => FlipDirection::Bearish,
    };

    if !allowed(config.flip_filter, flip) {
        debug!(symbol = %symbol, flip = ?flip, "Daily flip: filtered by direction");
        return Ok(None);
    }
    if ticker.volume_24h < config.volume_floor {
        debug!(
            symbol = %symbol,
            volume_24h = ticker.volume_24h,
            floor = config.volume_floor,
            "Daily flip: volume below significance floor"
        );
        return Ok(None);
    }

    // relationship_side succeeded, so there is at least one candle
    let Some(last) = candles.last() else {
        return Ok(None);
    };

    Ok(Some(SignalEvent {
        symbol: symbol.to_string(),
        kind: SignalKind::DailyFlip,
        direction: match flip {
            FlipDirection::Bullish => SignalDirection::Up,
            FlipDirection::Bearish => SignalDirection::Down,
        },
        magnitude: last.body_pct(),
        timestamp: now,
        detail: SignalDetail::DailyFlip {
            flip,
            price: last.close,
            reference: config.reference.label(),
            body_pct: last.body_pct(),
        },
    }))
}

#[derive(Debug, Default)]
pub struct DailyFlipDetector {
    state: DailyFlipState,
}

impl DailyFlipDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: DailyFlipState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &DailyFlipState {
        &self.state
    }
}

#[async_trait::async_trait]
impl Detector for DailyFlipDetector {
    fn kind(&self) -> SignalKind {
        SignalKind::DailyFlip
    }

    async fn scan(&mut self, cycle: &Cycle<'_>) -> Result<ScanReport, ScannerError> {
        let config = &cycle.config.daily_flip;
        let general = &cycle.config.general;
        let timeout = cycle.config.request_timeout();
        let provider = cycle.ctx.market_data.as_ref();
        let mut report = ScanReport::default();

        let universe = fetch_universe_with_timeout(provider, timeout).await?;
        let liquid = liquid_universe(&universe, general);
        let symbols = top_movers(&liquid, config.movers_per_side);

        let cycle_no = self.state.begin_cycle();
        info!(
            cycle = cycle_no,
            symbols = symbols.len(),
            reference = %config.reference.label(),
            "Daily flip: scanning {} movers",
            symbols.len()
        );

        for ticker in &symbols {
            if cycle.stop.is_stopped() {
                report.interrupted = true;
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
                    warn!(symbol = %ticker.symbol, error = %e, "Daily flip: candle fetch failed, skipping symbol");
                    report.symbols_skipped += 1;
                    continue;
                }
            };

            match evaluate_flip(&mut self.state, ticker, &candles, config, cycle.now) {
                Ok(event) => {
                    report.symbols_scanned += 1;
                    if let Some(event) = event {
                        let dropped = dispatch(
                            cycle,
                            SignalKind::DailyFlip,
                            vec![event],
                            Some(&candles),
                            general.max_alerts_per_cycle,
                            &mut report,
                        )
                        .await;
                        for event in dropped {
                            if let SignalDetail::DailyFlip { flip, .. } = event.detail {
                                let before = match flip {
                                    FlipDirection::Bullish => Side::Below,
                                    FlipDirection::Bearish => Side::Above,
                                };
                                self.state.restore(&event.symbol, before);
                            }
                        }
                    }
                }
                Err(e) => {
                    debug!(symbol = %ticker.symbol, error = %e, "Daily flip: skipping symbol");
                    report.symbols_skipped += 1;
                }
            }
        }

        Ok(report)
    }
}
