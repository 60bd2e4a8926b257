use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: i64,
    pub username: String,
    pub status: ChannelStatus,
    /// Minimum interval between collections, in seconds.
    pub parse_frequency: i32,
    pub last_parsed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Channel {
    pub fn is_active(&self) -> bool {
        matches!(self.status, ChannelStatus::Active)
    }

    /// Due-check rule: active, and either never collected or the configured
    /// interval has elapsed since the last collection. The no-open-job half
    /// of the rule lives in the store query.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if !self.is_active() {
            return false;
        }
        match self.last_parsed_at {
            None => true,
            Some(last) => now - last >= Duration::seconds(self.parse_frequency as i64),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChannelStatus {
    #[serde(rename = "active")]
    Active,
    #[serde(rename = "paused")]
    Paused,
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "deleted")]
    Deleted,
}

impl ChannelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelStatus::Active => "active",
            ChannelStatus::Paused => "paused",
            ChannelStatus::Error => "error",
            ChannelStatus::Deleted => "deleted",
        }
    }
}

impl sqlx::Type<sqlx::Postgres> for ChannelStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for ChannelStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        match s {
            "active" => Ok(ChannelStatus::Active),
            "paused" => Ok(ChannelStatus::Paused),
            "error" => Ok(ChannelStatus::Error),
            "deleted" => Ok(ChannelStatus::Deleted),
            _ => Err(format!("Invalid channel status: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for ChannelStatus {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    /// Immutable external identifier; the numeric `id` never leaves the store.
    pub job_uuid: Uuid,
    pub channel_id: i64,
    pub worker_id: Option<String>,
    pub job_type: JobType,
    pub status: JobStatus,
    pub priority: i32,
    pub parameters: Option<serde_json::Value>,
    pub created_by: Option<String>,
    pub messages_collected: i32,
    pub messages_target: Option<i32>,
    pub progress_percent: f64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
    pub fn can_cancel(&self) -> bool {
        matches!(self.status, JobStatus::Pending | JobStatus::Assigned)
    }
    pub fn retries_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "assigned")]
    Assigned,
    #[serde(rename = "running")]
    Running,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "cancelled")]
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Assigned => "assigned",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
    /// Open statuses count against the one-open-job-per-channel invariant.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            JobStatus::Pending | JobStatus::Assigned | JobStatus::Running
        )
    }
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl sqlx::Type<sqlx::Postgres> for JobStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for JobStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        match s {
            "pending" => Ok(JobStatus::Pending),
            "assigned" => Ok(JobStatus::Assigned),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            _ => Err(format!("Invalid job status: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for JobStatus {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobType {
    #[serde(rename = "initial")]
    Initial,
    #[serde(rename = "update")]
    Update,
    #[serde(rename = "full_sync")]
    FullSync,
    #[serde(rename = "manual")]
    Manual,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Initial => "initial",
            JobType::Update => "update",
            JobType::FullSync => "full_sync",
            JobType::Manual => "manual",
        }
    }
}

impl sqlx::Type<sqlx::Postgres> for JobType {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for JobType {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        match s {
            "initial" => Ok(JobType::Initial),
            "update" => Ok(JobType::Update),
            "full_sync" => Ok(JobType::FullSync),
            "manual" => Ok(JobType::Manual),
            _ => Err(format!("Invalid job type: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for JobType {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
    }
}

/// Insert payload for a new job. The store assigns `id` and the timestamps.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub job_uuid: Uuid,
    pub channel_id: i64,
    pub job_type: JobType,
    pub priority: i32,
    pub parameters: Option<serde_json::Value>,
    pub created_by: Option<String>,
    pub max_retries: i32,
}

impl NewJob {
    pub fn new(channel_id: i64, job_type: JobType) -> Self {
        Self {
            job_uuid: Uuid::new_v4(),
            channel_id,
            job_type,
            priority: 0,
            parameters: None,
            created_by: None,
            max_retries: 3,
        }
    }
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = Some(parameters);
        self
    }
    pub fn with_created_by<S: Into<String>>(mut self, created_by: S) -> Self {
        self.created_by = Some(created_by.into());
        self
    }
    pub fn with_max_retries(mut self, max_retries: i32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Aggregate job counts by status over a reporting window.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct JobStats {
    pub pending: i64,
    pub assigned: i64,
    pub running: i64,
    pub completed: i64,
    pub failed: i64,
    pub cancelled: i64,
}

impl JobStats {
    pub fn total(&self) -> i64 {
        self.pending + self.assigned + self.running + self.completed + self.failed + self.cancelled
    }
    pub fn open(&self) -> i64 {
        self.pending + self.assigned + self.running
    }
    pub fn finished(&self) -> i64 {
        self.completed + self.failed + self.cancelled
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub worker_id: String,
    pub worker_name: Option<String>,
    pub hostname: Option<String>,
    pub location: Option<String>,
    pub status: WorkerStatus,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub started_at: DateTime<Utc>,
    pub jobs_completed: i32,
    pub jobs_failed: i32,
    pub messages_processed: i64,
}

impl Worker {
    /// Live recompute of the liveness signal. The stored `status` column is a
    /// cache that can lag the monitor's sweep by one cadence; read paths that
    /// care about freshness must check heartbeat age directly.
    pub fn is_effectively_offline(&self, now: DateTime<Utc>, threshold_seconds: i64) -> bool {
        match self.last_heartbeat {
            None => true,
            Some(beat) => now - beat > Duration::seconds(threshold_seconds),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WorkerStatus {
    #[serde(rename = "active")]
    Active,
    #[serde(rename = "idle")]
    Idle,
    #[serde(rename = "busy")]
    Busy,
    #[serde(rename = "offline")]
    Offline,
    #[serde(rename = "error")]
    Error,
}

impl WorkerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerStatus::Active => "active",
            WorkerStatus::Idle => "idle",
            WorkerStatus::Busy => "busy",
            WorkerStatus::Offline => "offline",
            WorkerStatus::Error => "error",
        }
    }
}

impl sqlx::Type<sqlx::Postgres> for WorkerStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for WorkerStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        match s {
            "active" => Ok(WorkerStatus::Active),
            "idle" => Ok(WorkerStatus::Idle),
            "busy" => Ok(WorkerStatus::Busy),
            "offline" => Ok(WorkerStatus::Offline),
            "error" => Ok(WorkerStatus::Error),
            _ => Err(format!("Invalid worker status: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for WorkerStatus {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(status: ChannelStatus, last_parsed_at: Option<DateTime<Utc>>) -> Channel {
        let now = Utc::now();
        Channel {
            id: 1,
            username: "newsfeed".to_string(),
            status,
            parse_frequency: 300,
            last_parsed_at,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_channel_never_parsed_is_due() {
        let now = Utc::now();
        assert!(channel(ChannelStatus::Active, None).is_due(now));
    }

    #[test]
    fn test_channel_due_after_interval() {
        let now = Utc::now();
        let stale = channel(ChannelStatus::Active, Some(now - Duration::seconds(301)));
        let fresh = channel(ChannelStatus::Active, Some(now - Duration::seconds(30)));
        assert!(stale.is_due(now));
        assert!(!fresh.is_due(now));
    }

    #[test]
    fn test_inactive_channel_never_due() {
        let now = Utc::now();
        assert!(!channel(ChannelStatus::Paused, None).is_due(now));
        assert!(!channel(ChannelStatus::Error, None).is_due(now));
        assert!(!channel(ChannelStatus::Deleted, None).is_due(now));
    }

    #[test]
    fn test_job_status_open_and_terminal_partition() {
        let open = [JobStatus::Pending, JobStatus::Assigned, JobStatus::Running];
        let terminal = [JobStatus::Completed, JobStatus::Failed, JobStatus::Cancelled];

        for status in open {
            assert!(status.is_open());
            assert!(!status.is_terminal());
        }
        for status in terminal {
            assert!(status.is_terminal());
            assert!(!status.is_open());
        }
    }

    #[test]
    fn test_worker_effectively_offline() {
        let now = Utc::now();
        let mut worker = Worker {
            worker_id: "worker-1".to_string(),
            worker_name: None,
            hostname: Some("host1".to_string()),
            location: None,
            status: WorkerStatus::Idle,
            last_heartbeat: Some(now - Duration::seconds(30)),
            started_at: now - Duration::hours(1),
            jobs_completed: 0,
            jobs_failed: 0,
            messages_processed: 0,
        };
        assert!(!worker.is_effectively_offline(now, 120));

        worker.last_heartbeat = Some(now - Duration::seconds(180));
        assert!(worker.is_effectively_offline(now, 120));

        // a stale heartbeat overrides a live-looking cached status
        worker.status = WorkerStatus::Busy;
        assert!(worker.is_effectively_offline(now, 120));

        worker.last_heartbeat = None;
        assert!(worker.is_effectively_offline(now, 120));
    }

    #[test]
    fn test_job_stats_totals() {
        let stats = JobStats {
            pending: 2,
            assigned: 1,
            running: 3,
            completed: 10,
            failed: 4,
            cancelled: 1,
        };
        assert_eq!(stats.total(), 21);
        assert_eq!(stats.open(), 6);
        assert_eq!(stats.finished(), 15);
    }

    #[test]
    fn test_new_job_builder() {
        let job = NewJob::new(7, JobType::Manual)
            .with_priority(10)
            .with_created_by("operator");
        assert_eq!(job.channel_id, 7);
        assert_eq!(job.priority, 10);
        assert_eq!(job.created_by.as_deref(), Some("operator"));
        assert_eq!(job.max_retries, 3);
    }
}
