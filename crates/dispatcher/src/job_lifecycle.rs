use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Value;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use harvester_domain::{
    ChannelRepository, ChannelStatus, Job, JobRepository, JobStats, JobType, NewJob, RetryOutcome,
    WorkerRepository,
};
use harvester_errors::{HarvesterError, HarvesterResult};
use harvester_infrastructure::MetricsCollector;

/// Store-facing job lifecycle operations.
///
/// Workers reach these through plumbing that lives outside this crate; the
/// state machine itself is enforced here and in the repositories.
#[async_trait]
pub trait JobLifecycleService: Send + Sync {
    /// Create a pending job for a channel.
    async fn create_job(
        &self,
        channel_id: i64,
        job_type: JobType,
        priority: i32,
        parameters: Option<Value>,
        created_by: Option<String>,
    ) -> HarvesterResult<Job>;

    /// Scanner entry point: create a scheduled update job unless the channel
    /// already has an open one. `None` means the slot was taken.
    async fn create_scheduled_job(
        &self,
        channel_id: i64,
        max_retries: i32,
    ) -> HarvesterResult<Option<Job>>;

    /// Cancel a job that has not started running. Returns whether a
    /// transition happened.
    async fn cancel_job(&self, job_uuid: Uuid) -> HarvesterResult<bool>;

    /// Clone a failed job into a fresh pending sibling.
    async fn retry_job(&self, job_uuid: Uuid) -> HarvesterResult<Job>;

    /// Claim the highest-priority pending job for a worker.
    async fn claim_job(&self, worker_id: &str) -> HarvesterResult<Option<Job>>;

    /// Transition a claimed (or still pending) job to running.
    async fn start_job(&self, job_uuid: Uuid, worker_id: &str) -> HarvesterResult<Job>;

    /// Record collection progress; keeps the job visibly alive to the reaper.
    async fn report_progress(
        &self,
        job_uuid: Uuid,
        messages_collected: i32,
        progress_percent: f64,
    ) -> HarvesterResult<()>;

    /// Finish a running job and propagate the success to the channel and the
    /// worker's counters.
    async fn complete_job(&self, job_uuid: Uuid, messages_collected: i32) -> HarvesterResult<Job>;

    /// Fail a running job. Exhausted retries flip the owning channel to
    /// `error`.
    async fn fail_job(&self, job_uuid: Uuid, error_message: &str) -> HarvesterResult<Job>;

    /// Job counts by status over the trailing 24 hours.
    async fn job_stats(&self) -> HarvesterResult<JobStats>;
}

pub struct JobLifecycleManager {
    job_repo: Arc<dyn JobRepository>,
    channel_repo: Arc<dyn ChannelRepository>,
    worker_repo: Arc<dyn WorkerRepository>,
    metrics: Arc<MetricsCollector>,
}

impl JobLifecycleManager {
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        channel_repo: Arc<dyn ChannelRepository>,
        worker_repo: Arc<dyn WorkerRepository>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            job_repo,
            channel_repo,
            worker_repo,
            metrics,
        }
    }

    /// Turn a conditional-update miss into the precise domain error.
    async fn state_error(&self, job_uuid: Uuid, expected: &str) -> HarvesterError {
        match self.job_repo.get_by_uuid(job_uuid).await {
            Ok(Some(job)) => {
                HarvesterError::invalid_job_state(job_uuid, expected, job.status.as_str())
            }
            Ok(None) => HarvesterError::job_not_found(job_uuid),
            Err(e) => e,
        }
    }
}

#[async_trait]
impl JobLifecycleService for JobLifecycleManager {
    #[instrument(skip(self, parameters))]
    async fn create_job(
        &self,
        channel_id: i64,
        job_type: JobType,
        priority: i32,
        parameters: Option<Value>,
        created_by: Option<String>,
    ) -> HarvesterResult<Job> {
        let mut new_job = NewJob::new(channel_id, job_type).with_priority(priority);
        if let Some(parameters) = parameters {
            new_job = new_job.with_parameters(parameters);
        }
        if let Some(created_by) = created_by {
            new_job = new_job.with_created_by(created_by);
        }

        let job = self.job_repo.create(&new_job).await?;
        self.metrics.record_jobs_created(1);
        info!(job_uuid = %job.job_uuid, channel_id, job_type = job_type.as_str(), "job created");
        Ok(job)
    }

    async fn create_scheduled_job(
        &self,
        channel_id: i64,
        max_retries: i32,
    ) -> HarvesterResult<Option<Job>> {
        let new_job = NewJob::new(channel_id, JobType::Update)
            .with_created_by("scheduler")
            .with_max_retries(max_retries);
        self.job_repo.create_if_no_open(&new_job).await
    }

    #[instrument(skip(self))]
    async fn cancel_job(&self, job_uuid: Uuid) -> HarvesterResult<bool> {
        let cancelled = self.job_repo.cancel(job_uuid).await?;
        if cancelled {
            info!(%job_uuid, "job cancelled");
        }
        Ok(cancelled)
    }

    #[instrument(skip(self))]
    async fn retry_job(&self, job_uuid: Uuid) -> HarvesterResult<Job> {
        match self.job_repo.retry_as_new(job_uuid).await? {
            RetryOutcome::Retried(job) => {
                self.metrics.record_jobs_created(1);
                info!(original = %job_uuid, replacement = %job.job_uuid, "failed job requeued");
                Ok(job)
            }
            RetryOutcome::NotRetryable(job) => Err(HarvesterError::invalid_job_state(
                job_uuid,
                "failed",
                job.status.as_str(),
            )),
            RetryOutcome::NotFound => Err(HarvesterError::job_not_found(job_uuid)),
        }
    }

    async fn claim_job(&self, worker_id: &str) -> HarvesterResult<Option<Job>> {
        self.job_repo.claim_next_pending(worker_id).await
    }

    async fn start_job(&self, job_uuid: Uuid, worker_id: &str) -> HarvesterResult<Job> {
        match self.job_repo.mark_running(job_uuid, worker_id).await? {
            Some(job) => {
                info!(%job_uuid, worker_id, "job started");
                Ok(job)
            }
            None => Err(self.state_error(job_uuid, "pending or assigned").await),
        }
    }

    async fn report_progress(
        &self,
        job_uuid: Uuid,
        messages_collected: i32,
        progress_percent: f64,
    ) -> HarvesterResult<()> {
        let updated = self
            .job_repo
            .update_progress(job_uuid, messages_collected, progress_percent)
            .await?;
        if !updated {
            return Err(self.state_error(job_uuid, "running").await);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn complete_job(&self, job_uuid: Uuid, messages_collected: i32) -> HarvesterResult<Job> {
        let job = match self
            .job_repo
            .mark_completed(job_uuid, messages_collected)
            .await?
        {
            Some(job) => job,
            None => return Err(self.state_error(job_uuid, "running").await),
        };

        let completed_at = job.completed_at.unwrap_or_else(Utc::now);
        self.channel_repo
            .record_parsed(job.channel_id, completed_at)
            .await?;

        if let Some(ref worker_id) = job.worker_id {
            self.worker_repo
                .record_completion(worker_id, messages_collected as i64)
                .await?;
        }

        self.metrics.record_job_completed();
        info!(%job_uuid, channel_id = job.channel_id, messages_collected, "job completed");
        Ok(job)
    }

    #[instrument(skip(self, error_message))]
    async fn fail_job(&self, job_uuid: Uuid, error_message: &str) -> HarvesterResult<Job> {
        let job = match self.job_repo.mark_failed(job_uuid, error_message).await? {
            Some(job) => job,
            None => return Err(self.state_error(job_uuid, "running").await),
        };

        if let Some(ref worker_id) = job.worker_id {
            self.worker_repo.record_failure(worker_id).await?;
        }

        if job.retries_exhausted() {
            warn!(
                %job_uuid,
                channel_id = job.channel_id,
                retry_count = job.retry_count,
                "retries exhausted, flagging channel"
            );
            self.channel_repo
                .update_status(job.channel_id, ChannelStatus::Error)
                .await?;
        }

        self.metrics.record_job_failed();
        Ok(job)
    }

    async fn job_stats(&self) -> HarvesterResult<JobStats> {
        let cutoff = Utc::now() - Duration::hours(24);
        self.job_repo.stats_since(cutoff).await
    }
}
