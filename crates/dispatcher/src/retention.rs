use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::{info, instrument};

use harvester_config::RetentionConfig;
use harvester_domain::JobRepository;
use harvester_errors::HarvesterResult;
use harvester_infrastructure::MetricsCollector;

use crate::scheduler_loop::Sweep;

/// Purges terminal jobs older than the retention window.
pub struct RetentionSweeper {
    job_repo: Arc<dyn JobRepository>,
    metrics: Arc<MetricsCollector>,
    config: RetentionConfig,
}

impl RetentionSweeper {
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        metrics: Arc<MetricsCollector>,
        config: RetentionConfig,
    ) -> Self {
        Self {
            job_repo,
            metrics,
            config,
        }
    }

    #[instrument(skip(self))]
    pub async fn purge_once(&self) -> HarvesterResult<u64> {
        let started = Instant::now();
        let cutoff = Utc::now() - Duration::days(self.config.retention_days as i64);

        let deleted = self.job_repo.delete_terminal_before(cutoff).await?;

        self.metrics.record_jobs_purged(deleted);
        self.metrics
            .record_retention_sweep(started.elapsed().as_secs_f64());

        if deleted > 0 {
            info!(deleted, retention_days = self.config.retention_days, "old jobs purged");
        }
        Ok(deleted)
    }
}

#[async_trait]
impl Sweep for RetentionSweeper {
    fn name(&self) -> &'static str {
        "retention"
    }

    fn interval_seconds(&self) -> u64 {
        self.config.sweep_interval_seconds
    }

    async fn sweep(&self) -> HarvesterResult<u64> {
        self.purge_once().await
    }
}
