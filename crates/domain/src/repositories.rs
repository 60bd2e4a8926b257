use async_trait::async_trait;
use chrono::{DateTime, Utc};
use harvester_errors::HarvesterResult;
use uuid::Uuid;

use crate::entities::{Channel, ChannelStatus, Job, JobStats, NewJob, Worker, WorkerStatus};

#[async_trait]
pub trait ChannelRepository: Send + Sync {
    async fn get_by_id(&self, id: i64) -> HarvesterResult<Option<Channel>>;

    async fn get_by_username(&self, username: &str) -> HarvesterResult<Option<Channel>>;

    /// Channels eligible for a scheduled collection: active, interval elapsed
    /// (or never collected), and no open job. Oldest-collected first, with
    /// never-collected channels ahead of everything.
    async fn find_due(&self, now: DateTime<Utc>, limit: i64) -> HarvesterResult<Vec<Channel>>;

    async fn record_parsed(&self, channel_id: i64, at: DateTime<Utc>) -> HarvesterResult<()>;

    async fn update_status(&self, channel_id: i64, status: ChannelStatus) -> HarvesterResult<()>;
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a new pending job. Fails with `ChannelNotFound` when the channel
    /// does not exist and `DuplicateOpenJob` when the channel already has an
    /// open job.
    async fn create(&self, job: &NewJob) -> HarvesterResult<Job>;

    /// Race-safe variant used by the scheduled scanner: inserts only when the
    /// channel has no open job, returning `None` instead of an error when it
    /// loses the race.
    async fn create_if_no_open(&self, job: &NewJob) -> HarvesterResult<Option<Job>>;

    async fn get_by_uuid(&self, uuid: Uuid) -> HarvesterResult<Option<Job>>;

    /// Cancel a pending or assigned job. Returns false when the job was not in
    /// a cancellable state (or does not exist).
    async fn cancel(&self, uuid: Uuid) -> HarvesterResult<bool>;

    /// Create a fresh pending job cloned from a failed one. Returns the
    /// original job (for state reporting) when it was not in `failed` status.
    async fn retry_as_new(&self, uuid: Uuid) -> HarvesterResult<RetryOutcome>;

    /// Atomically claim the highest-priority pending job for a worker,
    /// moving it to `assigned`. Concurrent claimers never receive the same
    /// job.
    async fn claim_next_pending(&self, worker_id: &str) -> HarvesterResult<Option<Job>>;

    /// Move an assigned job to `running`, stamping `started_at`.
    async fn mark_running(&self, uuid: Uuid, worker_id: &str) -> HarvesterResult<Option<Job>>;

    /// Progress report from a worker; touches `updated_at` so the reaper sees
    /// the job as live. Returns false when the job is not running.
    async fn update_progress(
        &self,
        uuid: Uuid,
        messages_collected: i32,
        progress_percent: f64,
    ) -> HarvesterResult<bool>;

    async fn mark_completed(
        &self,
        uuid: Uuid,
        messages_collected: i32,
    ) -> HarvesterResult<Option<Job>>;

    /// Move a running job to `failed`, recording the error and bumping
    /// `retry_count`.
    async fn mark_failed(&self, uuid: Uuid, error: &str) -> HarvesterResult<Option<Job>>;

    /// Running jobs whose last sign of life (start or latest progress report)
    /// is older than the cutoff.
    async fn find_timed_out(&self, cutoff: DateTime<Utc>) -> HarvesterResult<Vec<Job>>;

    /// Fail a timed-out job by row id. Guarded on `running` so a job that
    /// completed between the scan and the update is left alone.
    async fn fail_timed_out(&self, id: i64, error: &str) -> HarvesterResult<bool>;

    async fn stats_since(&self, cutoff: DateTime<Utc>) -> HarvesterResult<JobStats>;

    /// Purge terminal jobs older than the cutoff. Returns rows deleted.
    async fn delete_terminal_before(&self, cutoff: DateTime<Utc>) -> HarvesterResult<u64>;

    async fn has_open_job(&self, channel_id: i64) -> HarvesterResult<bool>;
}

/// Result of a retry request against a failed job.
#[derive(Debug, Clone)]
pub enum RetryOutcome {
    /// The replacement job that was created.
    Retried(Job),
    /// The job exists but is not in `failed` status.
    NotRetryable(Job),
    NotFound,
}

#[async_trait]
pub trait WorkerRepository: Send + Sync {
    /// Upsert a heartbeat. First heartbeat from an unknown worker registers it.
    async fn record_heartbeat(
        &self,
        worker_id: &str,
        status: WorkerStatus,
        at: DateTime<Utc>,
    ) -> HarvesterResult<()>;

    async fn get_by_id(&self, worker_id: &str) -> HarvesterResult<Option<Worker>>;

    async fn list(&self) -> HarvesterResult<Vec<Worker>>;

    /// Workers not already offline whose last heartbeat predates the cutoff
    /// (including workers that never sent one).
    async fn find_stale(&self, cutoff: DateTime<Utc>) -> HarvesterResult<Vec<Worker>>;

    async fn mark_offline(&self, worker_id: &str) -> HarvesterResult<bool>;

    async fn record_completion(&self, worker_id: &str, messages: i64) -> HarvesterResult<()>;

    async fn record_failure(&self, worker_id: &str) -> HarvesterResult<()>;
}
