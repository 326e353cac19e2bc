//! Detector lifecycle through the scanner manager

use crypto_scanner::config::{ConfigStore, ScannerConfiguration};
use crypto_scanner::core::ScannerManager;
use crypto_scanner::error::ScannerError;
use crypto_scanner::models::signal::SignalKind;
use std::sync::Arc;
use std::time::Duration;

use crate::test_utils::{flat_then, liquid_ticker, TestContext};

fn manager_with(t: &TestContext, config: ScannerConfiguration) -> ScannerManager {
    let store = Arc::new(ConfigStore::in_memory(config).unwrap());
    ScannerManager::new(store, t.ctx.clone())
}

fn all_disabled() -> ScannerConfiguration {
    let mut config = ScannerConfiguration::default();
    config.ema_touch.enabled = false;
    config.daily_flip.enabled = false;
    config.volume.enabled = false;
    config
}

async fn wait_for_cycles(manager: &ScannerManager, kind: SignalKind, cycles: u64) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if manager.status_of(kind).await.unwrap().cycles >= cycles {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("detector did not complete a cycle in time");
}

#[tokio::test]
async fn manual_run_works_while_disabled() {
    let t = TestContext::new();
    t.market.set_ticker(liquid_ticker("PUMPUSDT", 20.0));
    let manager = manager_with(&t, all_disabled());

    let report = manager.run_once(SignalKind::VolumeSpike).await.unwrap();
    assert_eq!(report.alerts_dispatched, 1);

    let status = manager.status_of(SignalKind::VolumeSpike).await.unwrap();
    assert!(!status.enabled);
    assert!(!status.running);
    assert_eq!(status.cycles, 1);
    assert!(status.last_run.is_some());
    assert_eq!(status.last_report, Some(report));
}

#[tokio::test]
async fn manual_runs_share_detector_state() {
    let t = TestContext::new();
    t.market.set_ticker(liquid_ticker("FLIPUSDT", 5.0));
    t.market.set_candles("FLIPUSDT", flat_then(60, 99.0));
    let manager = manager_with(&t, all_disabled());

    let first = manager.run_once(SignalKind::DailyFlip).await.unwrap();
    assert_eq!(first.signals_detected, 0);

    t.market.set_candles("FLIPUSDT", flat_then(60, 101.0));
    let second = manager.run_once(SignalKind::DailyFlip).await.unwrap();
    assert_eq!(second.alerts_dispatched, 1);
}

#[tokio::test]
async fn failed_cycle_is_reported_in_status() {
    let t = TestContext::new();
    t.market.set_universe_down(true);
    let manager = manager_with(&t, ScannerConfiguration::default());

    let result = manager.run_once(SignalKind::EmaTouch).await;
    assert!(matches!(result, Err(ScannerError::MarketData(_))));

    let status = manager.status_of(SignalKind::EmaTouch).await.unwrap();
    assert_eq!(status.cycles, 1);
    assert!(status.last_error.unwrap().contains("exchange down"));

    t.market.set_universe_down(false);
    manager.run_once(SignalKind::EmaTouch).await.unwrap();
    let status = manager.status_of(SignalKind::EmaTouch).await.unwrap();
    assert_eq!(status.cycles, 2);
    assert!(status.last_error.is_none());
}

#[tokio::test]
async fn start_runs_first_cycle_immediately_and_stop_ends_loop() {
    let t = TestContext::new();
    t.market.set_ticker(liquid_ticker("PUMPUSDT", 20.0));
    let mut config = all_disabled();
    config.volume.enabled = true;
    config.volume.volume_spike_enabled = false;
    let manager = manager_with(&t, config);

    assert!(manager.start(SignalKind::VolumeSpike).await.unwrap());
    assert!(!manager.start(SignalKind::VolumeSpike).await.unwrap());
    wait_for_cycles(&manager, SignalKind::VolumeSpike, 1).await;

    let status = manager.status_of(SignalKind::VolumeSpike).await.unwrap();
    assert!(status.running);
    assert_eq!(status.interval_minutes, 30);
    assert_eq!(t.notifier.sent().len(), 1);

    assert!(manager.stop(SignalKind::VolumeSpike).await.unwrap());
    assert!(!manager.stop(SignalKind::VolumeSpike).await.unwrap());
    assert!(!manager.status_of(SignalKind::VolumeSpike).await.unwrap().running);
}

#[tokio::test]
async fn shutdown_interrupts_manual_runs() {
    let t = TestContext::new();
    t.market.set_ticker(liquid_ticker("PUMPUSDT", 20.0));
    let manager = manager_with(&t, all_disabled());

    manager.start(SignalKind::VolumeSpike).await.unwrap();
    manager.shutdown().await;
    assert!(!manager.status_of(SignalKind::VolumeSpike).await.unwrap().running);

    let report = manager.run_once(SignalKind::VolumeSpike).await.unwrap();
    assert!(report.interrupted);
    assert_eq!(report.alerts_dispatched, 0);
    assert!(t.notifier.sent().is_empty());
}

#[tokio::test]
async fn disabled_detector_loop_stays_idle() {
    let t = TestContext::new();
    t.market.set_ticker(liquid_ticker("PUMPUSDT", 20.0));
    let manager = manager_with(&t, all_disabled());

    manager.start_all().await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    for status in manager.status().await {
        assert!(status.running, "{} should be running", status.name);
        assert_eq!(status.cycles, 0);
    }
    assert!(t.notifier.sent().is_empty());

    manager.stop_all().await;
    assert!(manager.status().await.iter().all(|s| !s.running));
}

#[tokio::test]
async fn config_changes_apply_without_restart() {
    let t = TestContext::new();
    let manager = manager_with(&t, ScannerConfiguration::default());
    assert!(manager.status_of(SignalKind::EmaTouch).await.unwrap().enabled);

    let mut next = manager.config().get_config().await;
    next.ema_touch.enabled = false;
    next.ema_touch.interval_minutes = 5;
    manager.config().set_config(next).await.unwrap();

    let status = manager.status_of(SignalKind::EmaTouch).await.unwrap();
    assert!(!status.enabled);
    assert_eq!(status.interval_minutes, 5);
}

#[tokio::test]
async fn status_lists_every_detector() {
    let t = TestContext::new();
    let manager = manager_with(&t, ScannerConfiguration::default());

    let names: Vec<SignalKind> = manager.status().await.into_iter().map(|s| s.name).collect();
    assert_eq!(
        names,
        vec![SignalKind::EmaTouch, SignalKind::DailyFlip, SignalKind::VolumeSpike]
    );
}
