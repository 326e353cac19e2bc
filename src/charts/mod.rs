//! Candlestick + EMA chart images attached to alerts.
//!
//! Charts are drawn with `plotters` into an in-memory RGB buffer and encoded
//! as PNG. No text is drawn: the symbol, levels and link travel in the
//! message caption, so rendering needs no system fonts.

use plotters::prelude::*;
use std::io::Cursor;
use thiserror::Error;

use crate::config::ChartConfig;
use crate::indicators::trend::calculate_ema_series;
use crate::models::market::Candle;

const BACKGROUND: RGBColor = RGBColor(0x1a, 0x1a, 0x2e);
const GAIN: RGBColor = RGBColor(0x26, 0xa6, 0x9a);
const LOSS: RGBColor = RGBColor(0xef, 0x53, 0x50);
const PRICE_LINE: RGBColor = RGBColor(0xea, 0xea, 0xea);
const EMA_COLORS: [RGBColor; 4] = [
    RGBColor(0xef, 0x53, 0x50),
    RGBColor(0xff, 0xd7, 0x00),
    RGBColor(0x64, 0xb5, 0xf6),
    RGBColor(0xab, 0x47, 0xbc),
];

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("no candles to chart")]
    Empty,

    #[error("chart drawing failed: {0}")]
    Draw(String),

    #[error("chart encoding failed: {0}")]
    Encode(String),
}

fn draw_err(e: impl std::fmt::Display) -> ChartError {
    ChartError::Draw(e.to_string())
}

/// EMA lines over the full history, trimmed to the last `bars` points.
/// Periods longer than the history are left out.
/// Each line keeps the index of its period so colors stay stable.
fn ema_lines(candles: &[Candle], periods: &[u32], bars: usize) -> Vec<(usize, Vec<f64>)> {
    let skip = candles.len().saturating_sub(bars);
    periods
        .iter()
        .enumerate()
        .filter_map(|(idx, &p)| {
            let series = calculate_ema_series(candles, p).ok()?;
            Some((idx, series.into_iter().skip(skip).collect()))
        })
        .collect()
}

fn price_bounds<'a>(candles: &[Candle], lines: impl Iterator<Item = &'a f64>) -> (f64, f64) {
    let (mut low, mut high) = candles
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), c| {
            (lo.min(c.low), hi.max(c.high))
        });
    for &v in lines {
        if v.is_finite() {
            low = low.min(v);
            high = high.max(v);
        }
    }
    let pad = ((high - low) * 0.05).max(high.abs() * 1e-4).max(1e-9);
    (low - pad, high + pad)
}

/// Render the last `config.bars` candles with the configured EMA lines as a
/// PNG image.
pub fn render_chart(candles: &[Candle], config: &ChartConfig) -> Result<Vec<u8>, ChartError> {
    if candles.is_empty() {
        return Err(ChartError::Empty);
    }

    let bars = config.bars.max(1);
    let visible = &candles[candles.len().saturating_sub(bars)..];
    let lines = ema_lines(candles, &config.ema_periods, bars);
    let (low, high) = price_bounds(visible, lines.iter().flat_map(|(_, series)| series.iter()));
    if !low.is_finite() || !high.is_finite() {
        return Err(ChartError::Draw("non-finite price range".to_string()));
    }

    let (width, height) = (config.width, config.height);
    let mut buffer = vec![0u8; width as usize * height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        root.fill(&BACKGROUND).map_err(draw_err)?;

        let mut chart = ChartBuilder::on(&root)
            .margin(16)
            .build_cartesian_2d(0usize..visible.len(), low..high)
            .map_err(draw_err)?;

        let body = ((width as usize * 6 / 10) / visible.len()).clamp(1, 24) as u32;
        chart
            .draw_series(visible.iter().enumerate().map(|(i, c)| {
                CandleStick::new(i, c.open, c.high, c.low, c.close, GAIN.filled(), LOSS.filled(), body)
            }))
            .map_err(draw_err)?;

        for (idx, series) in &lines {
            let color = EMA_COLORS[*idx % EMA_COLORS.len()];
            chart
                .draw_series(LineSeries::new(
                    series.iter().copied().enumerate(),
                    color.stroke_width(2),
                ))
                .map_err(draw_err)?;
        }

        if let Some(last) = visible.last() {
            chart
                .draw_series(LineSeries::new(
                    [(0, last.close), (visible.len() - 1, last.close)],
                    PRICE_LINE.mix(0.5).stroke_width(1),
                ))
                .map_err(draw_err)?;
        }

        root.present().map_err(draw_err)?;
    }

    let image = image::RgbImage::from_raw(width, height, buffer)
        .ok_or_else(|| ChartError::Encode("pixel buffer size mismatch".to_string()))?;
    let mut png = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| ChartError::Encode(e.to_string()))?;
    Ok(png)
}
