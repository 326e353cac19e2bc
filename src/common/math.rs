//! Numeric helpers for indicator calculations

/// Smoothing factor for an EMA of the given period.
pub fn ema_multiplier(period: usize) -> f64 {
    2.0 / (period as f64 + 1.0)
}

/// Full EMA series seeded with the first value.
///
/// `ema[0] = values[0]`, `ema[i] = values[i] * k + ema[i - 1] * (1 - k)`.
pub fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    if values.is_empty() || period == 0 {
        return Vec::new();
    }

    let k = ema_multiplier(period);
    let mut series = Vec::with_capacity(values.len());
    let mut prev = values[0];
    series.push(prev);

    for &value in &values[1..] {
        prev = value * k + prev * (1.0 - k);
        series.push(prev);
    }

    series
}

/// Latest EMA value, or `None` when fewer than `period` values are available.
pub fn ema(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    ema_series(values, period).last().copied()
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}
