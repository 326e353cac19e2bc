//! Typed scanner configuration, validated once at load/update time.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::ConfigError;
use crate::models::signal::SignalKind;

/// Longest accepted polling interval: one week.
pub const MAX_INTERVAL_MINUTES: u64 = 7 * 24 * 60;
/// Longest accepted cooldown: one year.
pub const MAX_COOLDOWN_MINUTES: u64 = 365 * 24 * 60;
pub const MAX_REQUEST_TIMEOUT_SECS: u64 = 300;
/// Bybit returns at most this many klines per request.
pub const MAX_CANDLES: u64 = 1000;
const MIN_CHART_SIDE: u32 = 200;
const MAX_CHART_SIDE: u32 = 2560;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Only symbols quoted in this asset are scanned.
    pub quote_asset: String,
    /// Minimum 24h turnover (quote currency) for a symbol to be scanned.
    pub min_volume_24h: f64,
    /// Cap on symbols whose candles are fetched per cycle.
    pub max_symbols: usize,
    pub max_alerts_per_cycle: usize,
    pub request_timeout_secs: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            quote_asset: "USDT".to_string(),
            min_volume_24h: 10_000_000.0,
            max_symbols: 50,
            max_alerts_per_cycle: 10,
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmaTouchConfig {
    pub enabled: bool,
    pub interval_minutes: u64,
    pub cooldown_minutes: u64,
    pub periods: Vec<u32>,
    /// Inclusive distance threshold in percent.
    pub touch_threshold_pct: f64,
    pub candle_interval: String,
    pub candle_count: usize,
}

impl Default for EmaTouchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_minutes: 30,
            cooldown_minutes: 120,
            periods: vec![5, 10, 60, 223],
            touch_threshold_pct: 0.2,
            candle_interval: "30".to_string(),
            candle_count: 250,
        }
    }
}

/// What the flip detector compares.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlipReference {
    PriceVsEma { period: u32 },
    EmaCross { fast: u32, slow: u32 },
}

impl FlipReference {
    pub fn longest_period(&self) -> u32 {
        match *self {
            FlipReference::PriceVsEma { period } => period,
            FlipReference::EmaCross { fast, slow } => fast.max(slow),
        }
    }

    pub fn label(&self) -> String {
        match *self {
            FlipReference::PriceVsEma { period } => format!("EMA {}", period),
            FlipReference::EmaCross { fast, slow } => format!("EMA {}/{}", fast, slow),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlipFilter {
    Both,
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyFlipConfig {
    pub enabled: bool,
    pub interval_minutes: u64,
    pub cooldown_minutes: u64,
    pub reference: FlipReference,
    pub candle_interval: String,
    pub candle_count: usize,
    /// Minimum 24h turnover for a flip to be reported.
    pub volume_floor: f64,
    pub flip_filter: FlipFilter,
    /// Top gainers and top losers scanned per cycle (each side).
    pub movers_per_side: usize,
}

impl Default for DailyFlipConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_minutes: 30,
            cooldown_minutes: 120,
            reference: FlipReference::PriceVsEma { period: 20 },
            candle_interval: "D".to_string(),
            candle_count: 100,
            volume_floor: 10_000_000.0,
            flip_filter: FlipFilter::Both,
            movers_per_side: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    pub enabled: bool,
    pub interval_minutes: u64,
    pub cooldown_minutes: u64,
    pub gainers_enabled: bool,
    /// Inclusive, percent.
    pub gainer_threshold_pct: f64,
    pub losers_enabled: bool,
    /// Inclusive, percent, expressed as a positive number.
    pub loser_threshold_pct: f64,
    pub volume_spike_enabled: bool,
    /// Latest candle volume over the lookback mean.
    pub volume_ratio_threshold: f64,
    pub candle_interval: String,
    pub volume_lookback: usize,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_minutes: 30,
            cooldown_minutes: 120,
            gainers_enabled: true,
            gainer_threshold_pct: 10.0,
            losers_enabled: true,
            loser_threshold_pct: 10.0,
            volume_spike_enabled: true,
            volume_ratio_threshold: 2.0,
            candle_interval: "60".to_string(),
            volume_lookback: 24,
        }
    }
}

/// Chart images attached to EMA touch and daily flip alerts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    pub enabled: bool,
    pub ema_periods: Vec<u32>,
    /// Most recent candles drawn.
    pub bars: usize,
    pub width: u32,
    pub height: u32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ema_periods: vec![5, 10, 60, 223],
            bars: 100,
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfiguration {
    pub general: GeneralConfig,
    pub ema_touch: EmaTouchConfig,
    pub daily_flip: DailyFlipConfig,
    pub volume: VolumeConfig,
    pub charts: ChartConfig,
}

/// Per-detector scheduling knobs read at each cycle boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorSchedule {
    pub enabled: bool,
    pub interval: Duration,
    pub cooldown: chrono::Duration,
}

fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<(), ConfigError> {
    if condition {
        Ok(())
    } else {
        Err(ConfigError::Invalid(message()))
    }
}

fn positive(name: &str, value: f64) -> Result<(), ConfigError> {
    ensure(value.is_finite() && value > 0.0, || {
        format!("{} must be a positive number, got {}", name, value)
    })
}

fn non_negative(name: &str, value: f64) -> Result<(), ConfigError> {
    ensure(value.is_finite() && value >= 0.0, || {
        format!("{} must be zero or positive, got {}", name, value)
    })
}

fn non_zero(name: &str, value: u64) -> Result<(), ConfigError> {
    ensure(value > 0, || format!("{} must be greater than zero", name))
}

fn within(name: &str, value: u64, max: u64) -> Result<(), ConfigError> {
    ensure((1..=max).contains(&value), || {
        format!("{} must be between 1 and {}, got {}", name, max, value)
    })
}

fn not_blank(name: &str, value: &str) -> Result<(), ConfigError> {
    ensure(!value.trim().is_empty(), || format!("{} must not be empty", name))
}

impl ScannerConfiguration {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.general;
        non_negative("general.min_volume_24h", g.min_volume_24h)?;
        non_zero("general.max_symbols", g.max_symbols as u64)?;
        non_zero("general.max_alerts_per_cycle", g.max_alerts_per_cycle as u64)?;
        within("general.request_timeout_secs", g.request_timeout_secs, MAX_REQUEST_TIMEOUT_SECS)?;

        let e = &self.ema_touch;
        within("ema_touch.interval_minutes", e.interval_minutes, MAX_INTERVAL_MINUTES)?;
        within("ema_touch.cooldown_minutes", e.cooldown_minutes, MAX_COOLDOWN_MINUTES)?;
        ensure(!e.periods.is_empty(), || "ema_touch.periods must not be empty".to_string())?;
        ensure(e.periods.iter().all(|&p| p > 0), || {
            "ema_touch.periods must all be greater than zero".to_string()
        })?;
        positive("ema_touch.touch_threshold_pct", e.touch_threshold_pct)?;
        not_blank("ema_touch.candle_interval", &e.candle_interval)?;
        let longest = e.periods.iter().copied().max().unwrap_or(0) as usize;
        ensure(e.candle_count >= longest, || {
            format!(
                "ema_touch.candle_count ({}) must cover the longest period ({})",
                e.candle_count, longest
            )
        })?;
        within("ema_touch.candle_count", e.candle_count as u64, MAX_CANDLES)?;

        let f = &self.daily_flip;
        within("daily_flip.interval_minutes", f.interval_minutes, MAX_INTERVAL_MINUTES)?;
        within("daily_flip.cooldown_minutes", f.cooldown_minutes, MAX_COOLDOWN_MINUTES)?;
        match f.reference {
            FlipReference::PriceVsEma { period } => {
                non_zero("daily_flip.reference.period", period as u64)?;
            }
            FlipReference::EmaCross { fast, slow } => {
                non_zero("daily_flip.reference.fast", fast as u64)?;
                non_zero("daily_flip.reference.slow", slow as u64)?;
                ensure(fast < slow, || {
                    format!("daily_flip.reference.fast ({}) must be below slow ({})", fast, slow)
                })?;
            }
        }
        not_blank("daily_flip.candle_interval", &f.candle_interval)?;
        ensure(f.candle_count >= f.reference.longest_period() as usize, || {
            format!(
                "daily_flip.candle_count ({}) must cover the reference period ({})",
                f.candle_count,
                f.reference.longest_period()
            )
        })?;
        within("daily_flip.candle_count", f.candle_count as u64, MAX_CANDLES)?;
        non_negative("daily_flip.volume_floor", f.volume_floor)?;
        non_zero("daily_flip.movers_per_side", f.movers_per_side as u64)?;

        let v = &self.volume;
        within("volume.interval_minutes", v.interval_minutes, MAX_INTERVAL_MINUTES)?;
        within("volume.cooldown_minutes", v.cooldown_minutes, MAX_COOLDOWN_MINUTES)?;
        positive("volume.gainer_threshold_pct", v.gainer_threshold_pct)?;
        positive("volume.loser_threshold_pct", v.loser_threshold_pct)?;
        positive("volume.volume_ratio_threshold", v.volume_ratio_threshold)?;
        not_blank("volume.candle_interval", &v.candle_interval)?;
        // One extra candle is fetched for the bar under test
        within("volume.volume_lookback", v.volume_lookback as u64, MAX_CANDLES - 1)?;

        let c = &self.charts;
        ensure(c.ema_periods.iter().all(|&p| p > 0), || {
            "charts.ema_periods must all be greater than zero".to_string()
        })?;
        within("charts.bars", c.bars as u64, MAX_CANDLES)?;
        ensure((MIN_CHART_SIDE..=MAX_CHART_SIDE).contains(&c.width), || {
            format!("charts.width must be between {} and {}", MIN_CHART_SIDE, MAX_CHART_SIDE)
        })?;
        ensure((MIN_CHART_SIDE..=MAX_CHART_SIDE).contains(&c.height), || {
            format!("charts.height must be between {} and {}", MIN_CHART_SIDE, MAX_CHART_SIDE)
        })?;

        Ok(())
    }

    pub fn schedule(&self, kind: SignalKind) -> DetectorSchedule {
        let (enabled, interval_minutes, cooldown_minutes) = match kind {
            SignalKind::EmaTouch => (
                self.ema_touch.enabled,
                self.ema_touch.interval_minutes,
                self.ema_touch.cooldown_minutes,
            ),
            SignalKind::DailyFlip => (
                self.daily_flip.enabled,
                self.daily_flip.interval_minutes,
                self.daily_flip.cooldown_minutes,
            ),
            SignalKind::VolumeSpike => (
                self.volume.enabled,
                self.volume.interval_minutes,
                self.volume.cooldown_minutes,
            ),
        };
        // Clamped so a configuration that skipped validation cannot overflow
        let interval_minutes = interval_minutes.clamp(1, MAX_INTERVAL_MINUTES);
        let cooldown_minutes = cooldown_minutes.min(MAX_COOLDOWN_MINUTES) as i64;
        DetectorSchedule {
            enabled,
            interval: Duration::from_secs(interval_minutes * 60),
            cooldown: chrono::Duration::try_minutes(cooldown_minutes).unwrap_or_else(chrono::Duration::zero),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.general.request_timeout_secs.clamp(1, MAX_REQUEST_TIMEOUT_SECS))
    }
}
