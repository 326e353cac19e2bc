//! Markdown rendering of signal events

use crate::models::signal::{FlipDirection, MoverCategory, SignalDetail, SignalEvent};

/// TradingView chart link for the Bybit perpetual.
pub fn tradingview_link(symbol: &str) -> String {
    format!(
        "https://www.tradingview.com/chart/?symbol=BYBIT:{}.P",
        symbol
    )
}

pub fn render_alert(event: &SignalEvent) -> String {
    let link = format!("[{}]({})", event.symbol, tradingview_link(&event.symbol));
    let time = event.timestamp.format("%H:%M UTC");

    match &event.detail {
        SignalDetail::EmaTouch {
            period,
            ema,
            price,
            distance_pct,
            side,
        } => format!(
            "🎯 *EMA {} touch* {}\nPrice: {} ({} EMA {:.6})\nDistance: {:.2}%\n🕐 {}",
            period,
            link,
            price,
            side,
            ema,
            distance_pct.abs(),
            time
        ),
        SignalDetail::DailyFlip {
            flip,
            price,
            reference,
            body_pct,
        } => {
            let label = match flip {
                FlipDirection::Bullish => "🔴➡️🟢 *Bullish flip*",
                FlipDirection::Bearish => "🟢➡️🔴 *Bearish flip*",
            };
            format!(
                "{} {}\nPrice: {} vs {}\nCandle body: {:.2}%\n🕐 {}",
                label, link, price, reference, body_pct, time
            )
        }
        SignalDetail::Mover {
            category,
            price,
            change_24h_pct,
            volume_ratio,
            volume_24h,
        } => {
            let label = match category {
                MoverCategory::Gainer => "🚀 *Gainer*",
                MoverCategory::Loser => "📉 *Loser*",
                MoverCategory::VolumeSurge => "📊 *Volume surge*",
            };
            let mut text = format!(
                "{} {}\nPrice: {}\n24h change: {:+.2}%\n24h volume: ${:.0}",
                label, link, price, change_24h_pct, volume_24h
            );
            if let Some(ratio) = volume_ratio {
                text.push_str(&format!("\nVolume ratio: {:.2}x", ratio));
            }
            text.push_str(&format!("\n🕐 {}", time));
            text
        }
    }
}
