//! EMA (Exponential Moving Average) indicator

use crate::common::math;
use crate::indicators::IndicatorError;
use crate::models::indicators::{EmaIndicator, Side};
use crate::models::market::Candle;

fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

fn check_period(candles: &[Candle], period: u32) -> Result<(), IndicatorError> {
    if period == 0 {
        return Err(IndicatorError::InvalidPeriod(period));
    }
    if candles.len() < period as usize {
        return Err(IndicatorError::InsufficientData {
            period,
            available: candles.len(),
        });
    }
    Ok(())
}

/// Calculate the latest EMA for a specific period
pub fn calculate_ema(candles: &[Candle], period: u32) -> Result<EmaIndicator, IndicatorError> {
    check_period(candles, period)?;

    let value = math::ema(&closes(candles), period as usize).ok_or(
        IndicatorError::InsufficientData {
            period,
            available: candles.len(),
        },
    )?;
    if !value.is_finite() {
        return Err(IndicatorError::NonFinite);
    }

    Ok(EmaIndicator { value, period })
}

/// Full EMA series aligned with `candles`
pub fn calculate_ema_series(candles: &[Candle], period: u32) -> Result<Vec<f64>, IndicatorError> {
    check_period(candles, period)?;
    Ok(math::ema_series(&closes(candles), period as usize))
}

/// Signed distance from `ema` to `close`, in percent.
pub fn distance_pct(close: f64, ema: f64) -> Result<f64, IndicatorError> {
    if ema == 0.0 || !ema.is_finite() || !close.is_finite() {
        return Err(IndicatorError::NonFinite);
    }
    Ok((close - ema) / ema * 100.0)
}

/// Side of the fast EMA relative to the slow one, `None` when equal.
pub fn ema_cross_side(
    candles: &[Candle],
    fast_period: u32,
    slow_period: u32,
) -> Result<Option<Side>, IndicatorError> {
    let fast = calculate_ema(candles, fast_period)?;
    let slow = calculate_ema(candles, slow_period)?;
    Ok(Side::of(fast.value, slow.value))
}
