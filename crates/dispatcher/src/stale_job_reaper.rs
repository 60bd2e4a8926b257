use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::{instrument, warn};

use harvester_config::ReaperConfig;
use harvester_domain::JobRepository;
use harvester_errors::HarvesterResult;
use harvester_infrastructure::MetricsCollector;

use crate::scheduler_loop::Sweep;

/// Force-fails running jobs whose workers have gone silent.
pub struct StaleJobReaper {
    job_repo: Arc<dyn JobRepository>,
    metrics: Arc<MetricsCollector>,
    config: ReaperConfig,
}

impl StaleJobReaper {
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        metrics: Arc<MetricsCollector>,
        config: ReaperConfig,
    ) -> Self {
        Self {
            job_repo,
            metrics,
            config,
        }
    }

    /// One pass: fail every running job whose last sign of life predates the
    /// timeout. The per-row update is guarded on `running`, so a job that
    /// completes mid-sweep is left untouched.
    #[instrument(skip(self))]
    pub async fn reap_once(&self) -> HarvesterResult<u64> {
        let started = Instant::now();
        let cutoff = Utc::now() - Duration::seconds(self.config.job_timeout_seconds as i64);

        let stale = self.job_repo.find_timed_out(cutoff).await?;
        let error = format!(
            "Job timed out after {}s without progress",
            self.config.job_timeout_seconds
        );

        let mut reaped = 0u64;
        for job in &stale {
            if self.job_repo.fail_timed_out(job.id, &error).await? {
                warn!(
                    job_uuid = %job.job_uuid,
                    channel_id = job.channel_id,
                    worker_id = job.worker_id.as_deref().unwrap_or("-"),
                    "reaped stale running job"
                );
                reaped += 1;
            }
        }

        self.metrics.record_jobs_reaped(reaped);
        self.metrics
            .record_reaper_sweep(started.elapsed().as_secs_f64());
        Ok(reaped)
    }
}

#[async_trait]
impl Sweep for StaleJobReaper {
    fn name(&self) -> &'static str {
        "stale_job_reaper"
    }

    fn interval_seconds(&self) -> u64 {
        self.config.sweep_interval_seconds
    }

    async fn sweep(&self) -> HarvesterResult<u64> {
        self.reap_once().await
    }
}
