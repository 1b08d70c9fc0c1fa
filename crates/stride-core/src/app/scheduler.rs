//! Scheduler - fires a dispatch cycle every period.
//!
//! Missed ticks are skipped, not bursted. Overlap across processes is
//! prevented by the cycle's own lock, not here.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use super::dispatcher::DispatchCycle;

pub struct Scheduler {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl Scheduler {
    /// First cycle runs immediately.
    pub fn spawn(cycle: Arc<DispatchCycle>, period: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(period_secs = period.as_secs(), "scheduler started");

            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = cycle.run_once().await {
                            error!(error = %e, "dispatch cycle failed");
                        }
                    }
                }
            }
            info!("scheduler stopped");
        });

        Self { shutdown_tx, join }
    }

    pub fn request_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        if let Err(e) = self.join.await {
            error!(error = %e, "scheduler task panicked");
        }
    }
}
