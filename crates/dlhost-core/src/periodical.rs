//! Periodic addon tasks.
//!
//! Each addon gets at most one periodic callback. Ticks never overlap: when
//! an invocation is still running as the next tick arrives, that tick is
//! skipped, not queued. Stopping the handle ends future ticks; an in-flight
//! invocation finishes on its blocking thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// The periodic callback. Runs on a blocking thread, so it may do real work.
pub type PeriodicalTask = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// Handle to a running periodical; dropping it does not stop the loop,
/// `stop()` does.
pub struct PeriodicalHandle {
    stop: watch::Sender<bool>,
    name: String,
}

impl PeriodicalHandle {
    /// Stop future ticks. An in-flight invocation is allowed to finish.
    pub fn stop(&self) {
        let _ = self.stop.send(true);
        tracing::debug!(periodical = %self.name, "periodical stopped");
    }
}

/// Spawn a periodic task with the given interval.
pub fn spawn_periodical(name: &str, interval: Duration, task: PeriodicalTask) -> PeriodicalHandle {
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let in_flight = Arc::new(AtomicBool::new(false));
    let task_name = name.to_string();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first interval tick fires immediately; consume it so the task
        // first runs one interval after registration.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = stop_rx.changed() => {
                    if *stop_rx.borrow() {
                        return;
                    }
                    continue;
                }
            }

            if in_flight.swap(true, Ordering::AcqRel) {
                tracing::debug!(periodical = %task_name, "tick skipped, previous run still active");
                continue;
            }

            let task = Arc::clone(&task);
            let in_flight = Arc::clone(&in_flight);
            let task_name = task_name.clone();
            tokio::task::spawn_blocking(move || {
                if let Err(e) = task() {
                    tracing::warn!(periodical = %task_name, "periodical task failed: {:#}", e);
                }
                in_flight.store(false, Ordering::Release);
            });
        }
    });

    PeriodicalHandle {
        stop: stop_tx,
        name: name.to_string(),
    }
}
