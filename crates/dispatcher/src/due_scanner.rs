use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, instrument};

use harvester_config::DueScannerConfig;
use harvester_domain::ChannelRepository;
use harvester_errors::HarvesterResult;
use harvester_infrastructure::MetricsCollector;

use crate::job_lifecycle::JobLifecycleService;
use crate::scheduler_loop::Sweep;

/// Periodically turns due channels into pending collection jobs.
pub struct DueChannelScanner {
    channel_repo: Arc<dyn ChannelRepository>,
    lifecycle: Arc<dyn JobLifecycleService>,
    metrics: Arc<MetricsCollector>,
    config: DueScannerConfig,
}

impl DueChannelScanner {
    pub fn new(
        channel_repo: Arc<dyn ChannelRepository>,
        lifecycle: Arc<dyn JobLifecycleService>,
        metrics: Arc<MetricsCollector>,
        config: DueScannerConfig,
    ) -> Self {
        Self {
            channel_repo,
            lifecycle,
            metrics,
            config,
        }
    }

    /// One pass: fetch the most overdue channels and create one update job
    /// each, skipping any channel that acquired an open job in the meantime.
    #[instrument(skip(self))]
    pub async fn scan_once(&self) -> HarvesterResult<u64> {
        let started = Instant::now();
        let now = Utc::now();

        let due = self
            .channel_repo
            .find_due(now, self.config.max_jobs_per_sweep)
            .await?;

        let mut created = 0u64;
        for channel in &due {
            match self
                .lifecycle
                .create_scheduled_job(channel.id, self.config.job_max_retries)
                .await?
            {
                Some(job) => {
                    debug!(
                        channel_id = channel.id,
                        username = %channel.username,
                        job_uuid = %job.job_uuid,
                        "scheduled collection job"
                    );
                    created += 1;
                }
                None => {
                    debug!(
                        channel_id = channel.id,
                        "open job appeared since the due query, skipping"
                    );
                }
            }
        }

        self.metrics.record_jobs_created(created);
        self.metrics.record_due_scan(started.elapsed().as_secs_f64());

        if created > 0 {
            info!(due = due.len(), created, "due-channel scan complete");
        }
        Ok(created)
    }
}

#[async_trait]
impl Sweep for DueChannelScanner {
    fn name(&self) -> &'static str {
        "due_scanner"
    }

    fn interval_seconds(&self) -> u64 {
        self.config.scan_interval_seconds
    }

    async fn sweep(&self) -> HarvesterResult<u64> {
        self.scan_once().await
    }
}
