//! Test data builders for domain entities.

use chrono::{DateTime, Utc};
use harvester_domain::{Channel, ChannelStatus, Job, JobStatus, JobType, Worker, WorkerStatus};
use uuid::Uuid;

pub struct ChannelBuilder {
    channel: Channel,
}

impl ChannelBuilder {
    pub fn new(id: i64, username: &str) -> Self {
        let now = Utc::now();
        Self {
            channel: Channel {
                id,
                username: username.to_string(),
                status: ChannelStatus::Active,
                parse_frequency: 3600,
                last_parsed_at: None,
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn with_status(mut self, status: ChannelStatus) -> Self {
        self.channel.status = status;
        self
    }

    pub fn with_parse_frequency(mut self, seconds: i32) -> Self {
        self.channel.parse_frequency = seconds;
        self
    }

    pub fn with_last_parsed_at(mut self, at: DateTime<Utc>) -> Self {
        self.channel.last_parsed_at = Some(at);
        self
    }

    pub fn build(self) -> Channel {
        self.channel
    }
}

pub struct JobBuilder {
    job: Job,
}

impl JobBuilder {
    pub fn new(id: i64, channel_id: i64) -> Self {
        let now = Utc::now();
        Self {
            job: Job {
                id,
                job_uuid: Uuid::new_v4(),
                channel_id,
                worker_id: None,
                job_type: JobType::Update,
                status: JobStatus::Pending,
                priority: 0,
                parameters: None,
                created_by: None,
                messages_collected: 0,
                messages_target: None,
                progress_percent: 0.0,
                started_at: None,
                completed_at: None,
                error_message: None,
                retry_count: 0,
                max_retries: 3,
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.job.job_uuid = uuid;
        self
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.job.status = status;
        self
    }

    pub fn with_type(mut self, job_type: JobType) -> Self {
        self.job.job_type = job_type;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.job.priority = priority;
        self
    }

    pub fn with_worker(mut self, worker_id: &str) -> Self {
        self.job.worker_id = Some(worker_id.to_string());
        self
    }

    pub fn with_retry_count(mut self, retry_count: i32) -> Self {
        self.job.retry_count = retry_count;
        self
    }

    pub fn with_max_retries(mut self, max_retries: i32) -> Self {
        self.job.max_retries = max_retries;
        self
    }

    pub fn with_started_at(mut self, at: DateTime<Utc>) -> Self {
        self.job.started_at = Some(at);
        self
    }

    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.job.created_at = at;
        self
    }

    pub fn with_updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.job.updated_at = at;
        self
    }

    pub fn with_completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.job.completed_at = Some(at);
        self
    }

    pub fn build(self) -> Job {
        self.job
    }
}

pub struct WorkerBuilder {
    worker: Worker,
}

impl WorkerBuilder {
    pub fn new(worker_id: &str) -> Self {
        let now = Utc::now();
        Self {
            worker: Worker {
                worker_id: worker_id.to_string(),
                worker_name: None,
                hostname: Some("localhost".to_string()),
                location: None,
                status: WorkerStatus::Idle,
                last_heartbeat: Some(now),
                started_at: now,
                jobs_completed: 0,
                jobs_failed: 0,
                messages_processed: 0,
            },
        }
    }

    pub fn with_status(mut self, status: WorkerStatus) -> Self {
        self.worker.status = status;
        self
    }

    pub fn with_last_heartbeat(mut self, at: DateTime<Utc>) -> Self {
        self.worker.last_heartbeat = Some(at);
        self
    }

    pub fn without_heartbeat(mut self) -> Self {
        self.worker.last_heartbeat = None;
        self
    }

    pub fn build(self) -> Worker {
        self.worker
    }
}
