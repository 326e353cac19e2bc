//! Detectors driven through full cycles against mocked market data and a
//! recording notifier.

use chrono::{Duration, TimeZone, Utc};
use crypto_scanner::config::ScannerConfiguration;
use crypto_scanner::core::shutdown::{stop_channel, StopSignal};
use crypto_scanner::error::ScannerError;
use crypto_scanner::models::signal::{CooldownKey, SignalKind};
use crypto_scanner::scanners::{
    Cycle, DailyFlipDetector, Detector, EmaTouchDetector, ScanReport, VolumeDetector,
};
use crypto_scanner::services::market_data::MarketDataError;

use crate::test_utils::{flat_then, liquid_ticker, RecordingNotifier, TestContext};

fn movers_config() -> ScannerConfiguration {
    let mut config = ScannerConfiguration::default();
    config.volume.volume_spike_enabled = false;
    config
}

async fn scan(
    detector: &mut dyn Detector,
    t: &TestContext,
    config: &ScannerConfiguration,
    now: chrono::DateTime<Utc>,
) -> Result<ScanReport, ScannerError> {
    let stop = StopSignal::never();
    let cycle = Cycle {
        ctx: t.ctx.as_ref(),
        config,
        now,
        stop: &stop,
    };
    detector.scan(&cycle).await
}

#[tokio::test]
async fn repeated_signal_within_cooldown_notifies_once() {
    let t = TestContext::new();
    t.market.set_ticker(liquid_ticker("PUMPUSDT", 12.0));
    let config = movers_config();
    let mut detector = VolumeDetector::new();
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

    let first = scan(&mut detector, &t, &config, now).await.unwrap();
    assert_eq!(first.signals_detected, 1);
    assert_eq!(first.alerts_dispatched, 1);

    let second = scan(&mut detector, &t, &config, now + Duration::minutes(30)).await.unwrap();
    assert_eq!(second.signals_detected, 1);
    assert_eq!(second.alerts_dispatched, 0);
    assert_eq!(second.alerts_suppressed, 1);

    let sent = t.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("PUMPUSDT"));
    assert!(sent[0].contains("+12.00%"));

    // Cooldown elapsed
    let third = scan(&mut detector, &t, &config, now + Duration::minutes(121)).await.unwrap();
    assert_eq!(third.alerts_dispatched, 1);
    assert_eq!(t.notifier.sent().len(), 2);
}

#[tokio::test]
async fn failed_dispatch_still_consumes_cooldown() {
    let t = TestContext::with_notifier(RecordingNotifier::failing());
    t.market.set_ticker(liquid_ticker("DUMPUSDT", -15.0));
    let config = movers_config();
    let mut detector = VolumeDetector::new();
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

    let first = scan(&mut detector, &t, &config, now).await.unwrap();
    assert_eq!(first.dispatch_failures, 1);
    assert_eq!(t.notifier.attempts(), 1);

    let key = CooldownKey::new("DUMPUSDT", SignalKind::VolumeSpike, Some("loser"));
    assert!(t.cooldowns.is_suppressed(&key, now).await);

    let second = scan(&mut detector, &t, &config, now + Duration::minutes(5)).await.unwrap();
    assert_eq!(second.alerts_suppressed, 1);
    assert_eq!(second.dispatch_failures, 0);
    assert_eq!(t.notifier.attempts(), 1);
}

#[tokio::test]
async fn illiquid_and_foreign_quote_symbols_are_ignored() {
    let t = TestContext::new();
    t.market.set_ticker(crypto_scanner::models::market::Ticker::new(
        "THINUSDT", 1.0, 1_000.0, 50.0,
    ));
    t.market.set_ticker(crypto_scanner::models::market::Ticker::new(
        "ETHBTC", 0.05, 90_000_000.0, 50.0,
    ));
    let mut detector = VolumeDetector::new();

    let report = scan(&mut detector, &t, &movers_config(), Utc::now()).await.unwrap();
    assert_eq!(report.symbols_scanned, 0);
    assert_eq!(report.signals_detected, 0);
    assert!(t.notifier.sent().is_empty());
}

#[tokio::test]
async fn volume_surge_uses_fetched_candles() {
    let t = TestContext::new();
    t.market.set_ticker(liquid_ticker("SURGEUSDT", 1.0));
    let mut candles = flat_then(24, 100.0);
    candles.last_mut().unwrap().volume = 5_000.0;
    t.market.set_candles("SURGEUSDT", candles);

    let config = ScannerConfiguration::default();
    let mut detector = VolumeDetector::new();
    let report = scan(&mut detector, &t, &config, Utc::now()).await.unwrap();

    assert_eq!(report.alerts_dispatched, 1);
    assert!(t.notifier.sent()[0].contains("5.00x"));
}

#[tokio::test]
async fn universe_outage_fails_the_cycle() {
    let t = TestContext::new();
    t.market.set_universe_down(true);
    let mut detector = EmaTouchDetector::new();

    let result = scan(&mut detector, &t, &ScannerConfiguration::default(), Utc::now()).await;
    assert!(matches!(
        result,
        Err(ScannerError::MarketData(MarketDataError::Unavailable(_)))
    ));
    assert!(t.notifier.sent().is_empty());
}

#[tokio::test]
async fn candle_failure_skips_only_that_symbol() {
    let t = TestContext::new();
    t.market.set_ticker(liquid_ticker("BADUSDT", 0.0));
    t.market.set_ticker(liquid_ticker("GOODUSDT", 0.0));
    t.market.fail_symbol("BADUSDT");
    t.market.set_candles("GOODUSDT", flat_then(250, 100.1));

    let mut config = ScannerConfiguration::default();
    config.ema_touch.periods = vec![5];
    let mut detector = EmaTouchDetector::new();

    let report = scan(&mut detector, &t, &config, Utc::now()).await.unwrap();
    assert_eq!(report.symbols_skipped, 1);
    assert_eq!(report.symbols_scanned, 1);
    assert_eq!(report.alerts_dispatched, 1);
    assert_eq!(report.alerts[0].symbol, "GOODUSDT");
}

#[tokio::test]
async fn ema_touch_not_repeated_within_day_even_after_cooldown() {
    let t = TestContext::new();
    t.market.set_ticker(liquid_ticker("BTCUSDT", 0.0));
    t.market.set_candles("BTCUSDT", flat_then(250, 100.1));

    let mut config = ScannerConfiguration::default();
    config.ema_touch.periods = vec![5];
    config.ema_touch.cooldown_minutes = 1;
    let mut detector = EmaTouchDetector::new();
    let morning = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();

    let first = scan(&mut detector, &t, &config, morning).await.unwrap();
    assert_eq!(first.alerts_dispatched, 1);

    let evening = morning + Duration::hours(12);
    let second = scan(&mut detector, &t, &config, evening).await.unwrap();
    assert_eq!(second.signals_detected, 0);

    let next_day = Utc.with_ymd_and_hms(2024, 6, 2, 0, 30, 0).unwrap();
    let third = scan(&mut detector, &t, &config, next_day).await.unwrap();
    assert_eq!(third.alerts_dispatched, 1);
    assert_eq!(t.notifier.sent().len(), 2);
}

#[tokio::test]
async fn alert_budget_caps_dispatches_per_cycle() {
    let t = TestContext::new();
    for symbol in ["AUSDT", "BUSDT", "CUSDT"] {
        t.market.set_ticker(liquid_ticker(symbol, 0.0));
        t.market.set_candles(symbol, flat_then(250, 100.1));
    }

    let mut config = ScannerConfiguration::default();
    config.ema_touch.periods = vec![5];
    config.general.max_alerts_per_cycle = 2;
    let mut detector = EmaTouchDetector::new();

    let report = scan(&mut detector, &t, &config, Utc::now()).await.unwrap();
    assert_eq!(report.alerts_dispatched, 2);
    assert_eq!(t.notifier.sent().len(), 2);
}

#[tokio::test]
async fn touch_cut_by_budget_fires_next_cycle() {
    let t = TestContext::new();
    t.market.set_ticker(liquid_ticker("BTCUSDT", 0.0));
    t.market.set_candles("BTCUSDT", flat_then(250, 100.1));

    let mut config = ScannerConfiguration::default();
    config.ema_touch.periods = vec![5, 10];
    config.general.max_alerts_per_cycle = 1;
    let mut detector = EmaTouchDetector::new();
    let morning = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();

    let first = scan(&mut detector, &t, &config, morning).await.unwrap();
    assert_eq!(first.alerts_dispatched, 1);
    assert_eq!(first.alerts_dropped, 1);
    assert!(!detector.state().has_touched("BTCUSDT", 10));

    let second = scan(&mut detector, &t, &config, morning + Duration::minutes(30)).await.unwrap();
    assert_eq!(second.alerts_dispatched, 1);
    assert_eq!(second.alerts_dropped, 0);

    let sent = t.notifier.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].contains("EMA 5"), "{}", sent[0]);
    assert!(sent[1].contains("EMA 10"), "{}", sent[1]);

    let third = scan(&mut detector, &t, &config, morning + Duration::minutes(60)).await.unwrap();
    assert_eq!(third.signals_detected, 0);
}

#[tokio::test]
async fn flip_cut_by_budget_fires_next_cycle() {
    let t = TestContext::new();
    t.market.set_ticker(liquid_ticker("AUSDT", 4.0));
    t.market.set_ticker(liquid_ticker("BUSDT", 3.0));
    t.market.set_candles("AUSDT", flat_then(60, 99.0));
    t.market.set_candles("BUSDT", flat_then(60, 99.0));

    let mut config = ScannerConfiguration::default();
    config.general.max_alerts_per_cycle = 1;
    let mut detector = DailyFlipDetector::new();
    let now = Utc::now();

    scan(&mut detector, &t, &config, now).await.unwrap();

    t.market.set_candles("AUSDT", flat_then(60, 101.0));
    t.market.set_candles("BUSDT", flat_then(60, 101.0));
    let second = scan(&mut detector, &t, &config, now).await.unwrap();
    assert_eq!(second.alerts_dispatched, 1);
    assert_eq!(second.alerts_dropped, 1);
    assert_eq!(second.alerts[0].symbol, "AUSDT");

    let third = scan(&mut detector, &t, &config, now).await.unwrap();
    assert_eq!(third.signals_detected, 1);
    assert_eq!(third.alerts_dispatched, 1);
    assert_eq!(third.alerts[0].symbol, "BUSDT");
    assert_eq!(t.notifier.sent().len(), 2);
}

#[tokio::test]
async fn touch_alert_carries_chart_image() {
    let t = TestContext::new();
    t.market.set_ticker(liquid_ticker("BTCUSDT", 0.0));
    t.market.set_candles("BTCUSDT", flat_then(250, 100.1));

    let mut config = ScannerConfiguration::default();
    config.ema_touch.periods = vec![5];
    config.charts.width = 400;
    config.charts.height = 300;
    let mut detector = EmaTouchDetector::new();

    let report = scan(&mut detector, &t, &config, Utc::now()).await.unwrap();
    assert_eq!(report.alerts_dispatched, 1);

    let images = t.notifier.images();
    let png = images[0].as_ref().expect("chart attached");
    assert!(png.starts_with(b"\x89PNG"));
}

#[tokio::test]
async fn charts_disabled_sends_text_only() {
    let t = TestContext::new();
    t.market.set_ticker(liquid_ticker("BTCUSDT", 0.0));
    t.market.set_candles("BTCUSDT", flat_then(250, 100.1));

    let mut config = ScannerConfiguration::default();
    config.ema_touch.periods = vec![5];
    config.charts.enabled = false;
    let mut detector = EmaTouchDetector::new();

    scan(&mut detector, &t, &config, Utc::now()).await.unwrap();
    assert_eq!(t.notifier.images(), vec![None]);
}

#[tokio::test]
async fn mover_alerts_are_text_only() {
    let t = TestContext::new();
    t.market.set_ticker(liquid_ticker("PUMPUSDT", 12.0));
    let mut detector = VolumeDetector::new();

    scan(&mut detector, &t, &movers_config(), Utc::now()).await.unwrap();
    assert_eq!(t.notifier.images(), vec![None]);
}

#[tokio::test]
async fn daily_flip_emitted_on_second_cycle() {
    let t = TestContext::new();
    t.market.set_ticker(liquid_ticker("FLIPUSDT", 4.0));
    t.market.set_candles("FLIPUSDT", flat_then(60, 99.0));

    let config = ScannerConfiguration::default();
    let mut detector = DailyFlipDetector::new();
    let now = Utc::now();

    let first = scan(&mut detector, &t, &config, now).await.unwrap();
    assert_eq!(first.symbols_scanned, 1);
    assert_eq!(first.signals_detected, 0);

    t.market.set_candles("FLIPUSDT", flat_then(60, 101.0));
    let second = scan(&mut detector, &t, &config, now).await.unwrap();
    assert_eq!(second.alerts_dispatched, 1);
    assert!(t.notifier.sent()[0].contains("Bullish flip"));
    assert_eq!(detector.state().previous_side("FLIPUSDT").map(|s| s.to_string()), Some("above".to_string()));
}

#[tokio::test]
async fn stop_signal_interrupts_between_symbols() {
    let t = TestContext::new();
    for symbol in ["AUSDT", "BUSDT"] {
        t.market.set_ticker(liquid_ticker(symbol, 0.0));
        t.market.set_candles(symbol, flat_then(250, 100.1));
    }

    let (handle, stop) = stop_channel();
    handle.stop();
    let config = ScannerConfiguration::default();
    let cycle = Cycle {
        ctx: t.ctx.as_ref(),
        config: &config,
        now: Utc::now(),
        stop: &stop,
    };

    let mut detector = EmaTouchDetector::new();
    let report = detector.scan(&cycle).await.unwrap();
    assert!(report.interrupted);
    assert_eq!(report.symbols_scanned, 0);
    assert_eq!(
        t.market
            .candle_requests
            .load(std::sync::atomic::Ordering::SeqCst),
        0
    );
}
