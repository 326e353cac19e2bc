//! Cooperative stop flag shared between a loop and its owner

use std::time::Duration;
use tokio::sync::watch;

/// Owner side; dropping it does not stop the loop.
#[derive(Debug)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    pub fn stop(&self) {
        let _ = self.tx.send(true);
    }
}

#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx }, StopSignal { rx })
}

impl StopSignal {
    /// A signal that never fires, for one-shot runs.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Sleep for `duration` unless stopped first. Returns `false` when the
    /// stop flag is set.
    pub async fn sleep(&self, duration: Duration) -> bool {
        let mut rx = self.rx.clone();
        let deadline = tokio::time::sleep(duration);
        tokio::pin!(deadline);

        loop {
            if *rx.borrow() {
                return false;
            }
            tokio::select! {
                _ = &mut deadline => return !*rx.borrow(),
                changed = rx.changed() => {
                    if changed.is_err() {
                        // Owner gone without stopping: finish the sleep.
                        (&mut deadline).await;
                        return !*rx.borrow();
                    }
                }
            }
        }
    }
}
