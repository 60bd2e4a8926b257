use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use harvester_errors::HarvesterResult;

/// A periodic reconciliation pass. Implementors do one bounded unit of work
/// per call and report how many items they touched.
#[async_trait]
pub trait Sweep: Send + Sync {
    fn name(&self) -> &'static str;

    fn interval_seconds(&self) -> u64;

    async fn sweep(&self) -> HarvesterResult<u64>;
}

/// Drives every registered sweep on its own cadence until shutdown.
///
/// A sweep in flight when shutdown arrives always runs to completion; the
/// select branch that started it is polled to the end before the shutdown
/// branch is observed again.
pub struct SchedulerLoop {
    sweeps: Vec<Arc<dyn Sweep>>,
    shutdown_tx: broadcast::Sender<()>,
    handles: Vec<JoinHandle<()>>,
}

impl SchedulerLoop {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            sweeps: Vec::new(),
            shutdown_tx,
            handles: Vec::new(),
        }
    }

    pub fn register(&mut self, sweep: Arc<dyn Sweep>) {
        self.sweeps.push(sweep);
    }

    /// Spawn one task per registered sweep. Each ticks immediately, then at
    /// its configured cadence.
    pub fn start(&mut self) {
        for sweep in &self.sweeps {
            let sweep = Arc::clone(sweep);
            let mut shutdown_rx = self.shutdown_tx.subscribe();

            let handle = tokio::spawn(async move {
                let mut interval =
                    tokio::time::interval(Duration::from_secs(sweep.interval_seconds()));
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

                info!(
                    sweep = sweep.name(),
                    interval_seconds = sweep.interval_seconds(),
                    "sweep task started"
                );

                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            match sweep.sweep().await {
                                Ok(touched) => {
                                    debug!(sweep = sweep.name(), touched, "sweep tick finished");
                                }
                                Err(e) => {
                                    // a failed tick is skipped, never fatal
                                    error!(sweep = sweep.name(), error = %e, "sweep tick failed");
                                }
                            }
                        }
                        _ = shutdown_rx.recv() => {
                            info!(sweep = sweep.name(), "sweep task stopping");
                            break;
                        }
                    }
                }
            });

            self.handles.push(handle);
        }
    }

    /// Broadcast shutdown and wait for every sweep task to exit.
    pub async fn stop(&mut self) {
        // Err means no live receivers, i.e. nothing was started.
        let _ = self.shutdown_tx.send(());

        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                error!(error = %e, "sweep task panicked during shutdown");
            }
        }

        info!("scheduler loop stopped");
    }
}

impl Default for SchedulerLoop {
    fn default() -> Self {
        Self::new()
    }
}
