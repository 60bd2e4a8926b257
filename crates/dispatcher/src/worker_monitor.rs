use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::{instrument, warn};

use harvester_config::LivenessConfig;
use harvester_domain::{WorkerRepository, WorkerStatus};
use harvester_errors::HarvesterResult;
use harvester_infrastructure::MetricsCollector;

use crate::scheduler_loop::Sweep;

/// Reconciles the stored worker status with the heartbeat stream.
pub struct WorkerLivenessMonitor {
    worker_repo: Arc<dyn WorkerRepository>,
    metrics: Arc<MetricsCollector>,
    config: LivenessConfig,
}

impl WorkerLivenessMonitor {
    pub fn new(
        worker_repo: Arc<dyn WorkerRepository>,
        metrics: Arc<MetricsCollector>,
        config: LivenessConfig,
    ) -> Self {
        Self {
            worker_repo,
            metrics,
            config,
        }
    }

    /// One pass: mark every worker with a stale (or missing) heartbeat as
    /// offline. Workers rejoin simply by heartbeating again.
    #[instrument(skip(self))]
    pub async fn check_once(&self) -> HarvesterResult<u64> {
        let started = Instant::now();
        let cutoff = Utc::now() - Duration::seconds(self.config.heartbeat_timeout_seconds as i64);

        let stale = self.worker_repo.find_stale(cutoff).await?;
        let mut offlined = 0u64;
        for worker in &stale {
            if self.worker_repo.mark_offline(&worker.worker_id).await? {
                warn!(
                    worker_id = %worker.worker_id,
                    last_heartbeat = ?worker.last_heartbeat,
                    "worker heartbeat stale, marked offline"
                );
                offlined += 1;
            }
        }

        let active = self
            .worker_repo
            .list()
            .await?
            .iter()
            .filter(|w| w.status != WorkerStatus::Offline)
            .count();

        self.metrics.record_workers_marked_offline(offlined);
        self.metrics.update_active_workers(active as f64);
        self.metrics
            .record_liveness_check(started.elapsed().as_secs_f64());
        Ok(offlined)
    }
}

#[async_trait]
impl Sweep for WorkerLivenessMonitor {
    fn name(&self) -> &'static str {
        "worker_monitor"
    }

    fn interval_seconds(&self) -> u64 {
        self.config.check_interval_seconds
    }

    async fn sweep(&self) -> HarvesterResult<u64> {
        self.check_once().await
    }
}
