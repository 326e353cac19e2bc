//! Detector lifecycle: one polling task per detector, manual runs and status.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::shutdown::{stop_channel, StopHandle, StopSignal};
use crate::config::{ConfigStore, ScannerConfiguration};
use crate::error::ScannerError;
use crate::models::signal::SignalKind;
use crate::scanners::{
    Cycle, DailyFlipDetector, Detector, EmaTouchDetector, ScanContext, ScanReport, VolumeDetector,
};

/// How long `stop` waits for the current symbol to finish before aborting.
const STOP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectorStatus {
    pub name: SignalKind,
    pub running: bool,
    pub enabled: bool,
    pub interval_minutes: u64,
    pub cycles: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_report: Option<ScanReport>,
}

#[derive(Debug, Default)]
struct CycleHistory {
    cycles: u64,
    last_run: Option<DateTime<Utc>>,
    last_error: Option<String>,
    last_report: Option<ScanReport>,
}

struct LoopTask {
    stop: StopHandle,
    handle: JoinHandle<()>,
}

struct DetectorSlot {
    kind: SignalKind,
    detector: Arc<Mutex<Box<dyn Detector>>>,
    history: RwLock<CycleHistory>,
    task: Mutex<Option<LoopTask>>,
    /// The cycle task in flight, so a stop that times out can abort it too.
    current: std::sync::Mutex<Option<AbortHandle>>,
}

impl DetectorSlot {
    fn new(detector: Box<dyn Detector>) -> Self {
        Self {
            kind: detector.kind(),
            detector: Arc::new(Mutex::new(detector)),
            history: RwLock::new(CycleHistory::default()),
            task: Mutex::new(None),
            current: std::sync::Mutex::new(None),
        }
    }

    /// Run one cycle on its own task so a panicking detector cannot take the
    /// loop down with it.
    async fn run_cycle(
        &self,
        ctx: &Arc<ScanContext>,
        config: ScannerConfiguration,
        stop: StopSignal,
    ) -> Result<ScanReport, ScannerError> {
        let label = self.kind.as_str();
        let detector = self.detector.clone();
        let cycle_ctx = ctx.clone();
        let now = Utc::now();
        let started = Instant::now();

        let join = tokio::spawn(async move {
            let mut detector = detector.lock().await;
            let cycle = Cycle {
                ctx: cycle_ctx.as_ref(),
                config: &config,
                now,
                stop: &stop,
            };
            detector.scan(&cycle).await
        });
        self.set_current(Some(join.abort_handle()));
        let joined = join.await;
        self.set_current(None);

        let outcome = match joined {
            Ok(result) => result,
            Err(e) => Err(ScannerError::CycleAborted(e.to_string())),
        };

        if let Some(m) = &ctx.metrics {
            m.cycle_duration_seconds
                .with_label_values(&[label])
                .observe(started.elapsed().as_secs_f64());
            m.cycles_total.with_label_values(&[label]).inc();
            if outcome.is_err() {
                m.cycle_errors_total.with_label_values(&[label]).inc();
            }
        }

        let mut history = self.history.write().await;
        history.cycles += 1;
        history.last_run = Some(now);
        match &outcome {
            Ok(report) => {
                info!(
                    detector = label,
                    scanned = report.symbols_scanned,
                    skipped = report.symbols_skipped,
                    signals = report.signals_detected,
                    dispatched = report.alerts_dispatched,
                    suppressed = report.alerts_suppressed,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Cycle complete"
                );
                history.last_error = None;
                history.last_report = Some(report.clone());
            }
            Err(e) => {
                error!(detector = label, error = %e, "Cycle failed");
                history.last_error = Some(e.to_string());
            }
        }

        outcome
    }

    fn set_current(&self, handle: Option<AbortHandle>) {
        if let Ok(mut current) = self.current.lock() {
            *current = handle;
        }
    }

    fn abort_current(&self) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(handle) = current.take() {
                handle.abort();
            }
        }
    }

    async fn is_running(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }
}

/// Polling loop: snapshot the configuration, run a cycle when enabled, then
/// sleep the configured interval. Errors are logged and never end the loop.
async fn run_loop(
    slot: Arc<DetectorSlot>,
    config: Arc<ConfigStore>,
    ctx: Arc<ScanContext>,
    stop: StopSignal,
) {
    info!("Detector loop started");
    loop {
        let snapshot = config.get_config().await;
        let schedule = snapshot.schedule(slot.kind);

        if schedule.enabled {
            // Outcome already recorded in the slot history
            let _ = slot.run_cycle(&ctx, snapshot, stop.clone()).await;
        } else {
            debug!("Detector disabled, skipping cycle");
        }

        if !stop.sleep(schedule.interval).await {
            break;
        }
    }
    info!("Detector loop stopped");
}

/// Owns the detectors and their polling tasks.
pub struct ScannerManager {
    config: Arc<ConfigStore>,
    ctx: Arc<ScanContext>,
    slots: BTreeMap<SignalKind, Arc<DetectorSlot>>,
    /// Stops manual runs; fired once by `shutdown`.
    manual_stop: StopHandle,
    manual_signal: StopSignal,
}

impl ScannerManager {
    /// Manager with the three standard detectors, all stopped.
    pub fn new(config: Arc<ConfigStore>, ctx: Arc<ScanContext>) -> Self {
        Self::with_detectors(
            config,
            ctx,
            vec![
                Box::new(EmaTouchDetector::new()),
                Box::new(DailyFlipDetector::new()),
                Box::new(VolumeDetector::new()),
            ],
        )
    }

    /// A later detector of the same kind replaces an earlier one.
    pub fn with_detectors(
        config: Arc<ConfigStore>,
        ctx: Arc<ScanContext>,
        detectors: Vec<Box<dyn Detector>>,
    ) -> Self {
        let slots = detectors
            .into_iter()
            .map(|d| {
                let slot = DetectorSlot::new(d);
                (slot.kind, Arc::new(slot))
            })
            .collect();
        let (manual_stop, manual_signal) = stop_channel();
        Self {
            config,
            ctx,
            slots,
            manual_stop,
            manual_signal,
        }
    }

    pub fn config(&self) -> &Arc<ConfigStore> {
        &self.config
    }

    pub fn context(&self) -> &Arc<ScanContext> {
        &self.ctx
    }

    pub fn kinds(&self) -> Vec<SignalKind> {
        self.slots.keys().copied().collect()
    }

    fn slot(&self, kind: SignalKind) -> Result<&Arc<DetectorSlot>, ScannerError> {
        self.slots
            .get(&kind)
            .ok_or_else(|| ScannerError::UnknownScanner(kind.to_string()))
    }

    /// Spawn the polling loop for `kind`. Returns `false` if it was already
    /// running.
    pub async fn start(&self, kind: SignalKind) -> Result<bool, ScannerError> {
        let slot = self.slot(kind)?;
        let mut task = slot.task.lock().await;
        if task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            return Ok(false);
        }

        let (handle, signal) = stop_channel();
        let span = info_span!("detector", detector = kind.as_str());
        let join = tokio::spawn(
            run_loop(slot.clone(), self.config.clone(), self.ctx.clone(), signal).instrument(span),
        );
        *task = Some(LoopTask {
            stop: handle,
            handle: join,
        });
        info!(detector = %kind, "Detector started");
        Ok(true)
    }

    /// Signal the loop for `kind` to stop and wait for it. Returns `false` if
    /// it was not running.
    pub async fn stop(&self, kind: SignalKind) -> Result<bool, ScannerError> {
        let slot = self.slot(kind)?;
        let Some(task) = slot.task.lock().await.take() else {
            return Ok(false);
        };

        task.stop.stop();
        let mut handle = task.handle;
        match tokio::time::timeout(STOP_TIMEOUT, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(detector = %kind, error = %e, "Detector loop ended abnormally"),
            Err(_) => {
                warn!(detector = %kind, "Detector did not stop in time, aborting");
                handle.abort();
                slot.abort_current();
            }
        }
        info!(detector = %kind, "Detector stopped");
        Ok(true)
    }

    pub async fn start_all(&self) {
        for kind in self.kinds() {
            if let Err(e) = self.start(kind).await {
                error!(detector = %kind, error = %e, "Failed to start detector");
            }
        }
    }

    pub async fn stop_all(&self) {
        for kind in self.kinds() {
            if let Err(e) = self.stop(kind).await {
                error!(detector = %kind, error = %e, "Failed to stop detector");
            }
        }
    }

    /// Stop every loop and interrupt manual runs, now and later.
    pub async fn shutdown(&self) {
        self.manual_stop.stop();
        self.stop_all().await;
    }

    /// Run one cycle of `kind` now, outside its schedule and regardless of
    /// its enabled flag. Shares state with the polling loop. After
    /// `shutdown` the cycle ends at its first stop check.
    pub async fn run_once(&self, kind: SignalKind) -> Result<ScanReport, ScannerError> {
        let slot = self.slot(kind)?;
        let snapshot = self.config.get_config().await;
        info!(detector = %kind, "Manual scan requested");
        slot.run_cycle(&self.ctx, snapshot, self.manual_signal.clone()).await
    }

    pub async fn status_of(&self, kind: SignalKind) -> Result<DetectorStatus, ScannerError> {
        let slot = self.slot(kind)?;
        let config = self.config.get_config().await;
        Ok(Self::build_status(slot, &config).await)
    }

    pub async fn status(&self) -> Vec<DetectorStatus> {
        let config = self.config.get_config().await;
        let mut statuses = Vec::with_capacity(self.slots.len());
        for slot in self.slots.values() {
            statuses.push(Self::build_status(slot, &config).await);
        }
        statuses
    }

    async fn build_status(slot: &DetectorSlot, config: &ScannerConfiguration) -> DetectorStatus {
        let schedule = config.schedule(slot.kind);
        let running = slot.is_running().await;
        let history = slot.history.read().await;
        DetectorStatus {
            name: slot.kind,
            running,
            enabled: schedule.enabled,
            interval_minutes: schedule.interval.as_secs() / 60,
            cycles: history.cycles,
            last_run: history.last_run,
            last_error: history.last_error.clone(),
            last_report: history.last_report.clone(),
        }
    }
}
