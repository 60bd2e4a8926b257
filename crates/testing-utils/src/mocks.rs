//! In-memory mock implementations of the repository traits.
//!
//! These keep all state behind `Arc<Mutex<..>>` so clones share storage,
//! letting tests inspect what a service wrote without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use harvester_domain::{
    Channel, ChannelRepository, ChannelStatus, Job, JobRepository, JobStats, JobStatus, NewJob,
    RetryOutcome, Worker, WorkerRepository, WorkerStatus,
};
use harvester_errors::{HarvesterError, HarvesterResult};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Mock implementation of ChannelRepository for testing
#[derive(Debug, Clone, Default)]
pub struct MockChannelRepository {
    channels: Arc<Mutex<HashMap<i64, Channel>>>,
    jobs: Arc<Mutex<Option<MockJobRepository>>>,
}

impl MockChannelRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channels(channels: Vec<Channel>) -> Self {
        let map = channels.into_iter().map(|c| (c.id, c)).collect();
        Self {
            channels: Arc::new(Mutex::new(map)),
            jobs: Arc::default(),
        }
    }

    /// Share job state so `find_due` can exclude channels with an open job,
    /// matching what the store-backed query does.
    pub fn link_jobs(&self, jobs: &MockJobRepository) {
        *self.jobs.lock().unwrap() = Some(jobs.clone());
    }

    pub fn insert(&self, channel: Channel) {
        self.channels.lock().unwrap().insert(channel.id, channel);
    }

    pub fn get_all(&self) -> Vec<Channel> {
        self.channels.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl ChannelRepository for MockChannelRepository {
    async fn get_by_id(&self, id: i64) -> HarvesterResult<Option<Channel>> {
        Ok(self.channels.lock().unwrap().get(&id).cloned())
    }

    async fn get_by_username(&self, username: &str) -> HarvesterResult<Option<Channel>> {
        Ok(self
            .channels
            .lock()
            .unwrap()
            .values()
            .find(|c| c.username == username)
            .cloned())
    }

    async fn find_due(&self, now: DateTime<Utc>, limit: i64) -> HarvesterResult<Vec<Channel>> {
        let mut due: Vec<Channel> = {
            let channels = self.channels.lock().unwrap();
            channels
                .values()
                .filter(|c| c.is_due(now))
                .cloned()
                .collect()
        };
        if let Some(job_repo) = self.jobs.lock().unwrap().clone() {
            let jobs = job_repo.jobs.lock().unwrap();
            due.retain(|c| !jobs.values().any(|j| j.channel_id == c.id && j.is_open()));
        }
        // never-collected first, then oldest collection
        due.sort_by(|a, b| match (a.last_parsed_at, b.last_parsed_at) {
            (None, None) => a.id.cmp(&b.id),
            (None, Some(_)) => std::cmp::Ordering::Less,
            (Some(_), None) => std::cmp::Ordering::Greater,
            (Some(x), Some(y)) => x.cmp(&y),
        });
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn record_parsed(&self, channel_id: i64, at: DateTime<Utc>) -> HarvesterResult<()> {
        let mut channels = self.channels.lock().unwrap();
        let channel = channels
            .get_mut(&channel_id)
            .ok_or_else(|| HarvesterError::channel_not_found(channel_id))?;
        channel.last_parsed_at = Some(at);
        channel.updated_at = Utc::now();
        Ok(())
    }

    async fn update_status(&self, channel_id: i64, status: ChannelStatus) -> HarvesterResult<()> {
        let mut channels = self.channels.lock().unwrap();
        let channel = channels
            .get_mut(&channel_id)
            .ok_or_else(|| HarvesterError::channel_not_found(channel_id))?;
        channel.status = status;
        channel.updated_at = Utc::now();
        Ok(())
    }
}

/// Mock implementation of JobRepository for testing
#[derive(Debug, Clone)]
pub struct MockJobRepository {
    jobs: Arc<Mutex<HashMap<i64, Job>>>,
    next_id: Arc<Mutex<i64>>,
    known_channels: Arc<Mutex<Option<HashSet<i64>>>>,
}

impl MockJobRepository {
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(Mutex::new(1)),
            known_channels: Arc::default(),
        }
    }

    pub fn with_jobs(jobs: Vec<Job>) -> Self {
        let mut map = HashMap::new();
        let mut max_id = 0;
        for job in jobs {
            if job.id > max_id {
                max_id = job.id;
            }
            map.insert(job.id, job);
        }
        Self {
            jobs: Arc::new(Mutex::new(map)),
            next_id: Arc::new(Mutex::new(max_id + 1)),
            known_channels: Arc::default(),
        }
    }

    /// Limit `create` to these channel ids; others fail like a foreign key
    /// violation would. Unset, every channel id is accepted.
    pub fn restrict_channels(&self, channel_ids: &[i64]) {
        *self.known_channels.lock().unwrap() = Some(channel_ids.iter().copied().collect());
    }

    pub fn insert(&self, job: Job) {
        let mut next_id = self.next_id.lock().unwrap();
        if job.id >= *next_id {
            *next_id = job.id + 1;
        }
        self.jobs.lock().unwrap().insert(job.id, job);
    }

    pub fn count(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    pub fn get_all(&self) -> Vec<Job> {
        self.jobs.lock().unwrap().values().cloned().collect()
    }

    fn materialize(&self, new_job: &NewJob, id: i64) -> Job {
        let now = Utc::now();
        Job {
            id,
            job_uuid: new_job.job_uuid,
            channel_id: new_job.channel_id,
            worker_id: None,
            job_type: new_job.job_type,
            status: JobStatus::Pending,
            priority: new_job.priority,
            parameters: new_job.parameters.clone(),
            created_by: new_job.created_by.clone(),
            messages_collected: 0,
            messages_target: None,
            progress_percent: 0.0,
            started_at: None,
            completed_at: None,
            error_message: None,
            retry_count: 0,
            max_retries: new_job.max_retries,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Default for MockJobRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobRepository for MockJobRepository {
    async fn create(&self, job: &NewJob) -> HarvesterResult<Job> {
        if let Some(known) = self.known_channels.lock().unwrap().as_ref() {
            if !known.contains(&job.channel_id) {
                return Err(HarvesterError::channel_not_found(job.channel_id));
            }
        }
        {
            let jobs = self.jobs.lock().unwrap();
            if jobs
                .values()
                .any(|j| j.channel_id == job.channel_id && j.is_open())
            {
                return Err(HarvesterError::DuplicateOpenJob {
                    channel_id: job.channel_id,
                });
            }
        }
        let id = {
            let mut next_id = self.next_id.lock().unwrap();
            let id = *next_id;
            *next_id += 1;
            id
        };
        let created = self.materialize(job, id);
        self.jobs.lock().unwrap().insert(id, created.clone());
        Ok(created)
    }

    async fn create_if_no_open(&self, job: &NewJob) -> HarvesterResult<Option<Job>> {
        match self.create(job).await {
            Ok(created) => Ok(Some(created)),
            Err(HarvesterError::DuplicateOpenJob { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn get_by_uuid(&self, uuid: Uuid) -> HarvesterResult<Option<Job>> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .values()
            .find(|j| j.job_uuid == uuid)
            .cloned())
    }

    async fn cancel(&self, uuid: Uuid) -> HarvesterResult<bool> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .values_mut()
            .find(|j| j.job_uuid == uuid && j.can_cancel());
        match job {
            Some(job) => {
                job.status = JobStatus::Cancelled;
                job.completed_at = Some(Utc::now());
                job.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn retry_as_new(&self, uuid: Uuid) -> HarvesterResult<RetryOutcome> {
        let original = {
            let jobs = self.jobs.lock().unwrap();
            jobs.values().find(|j| j.job_uuid == uuid).cloned()
        };
        let original = match original {
            Some(job) => job,
            None => return Ok(RetryOutcome::NotFound),
        };
        if original.status != JobStatus::Failed {
            return Ok(RetryOutcome::NotRetryable(original));
        }
        let replacement = self
            .create(
                &NewJob {
                    job_uuid: Uuid::new_v4(),
                    channel_id: original.channel_id,
                    job_type: original.job_type,
                    priority: original.priority,
                    parameters: original.parameters.clone(),
                    created_by: original.created_by.clone(),
                    max_retries: original.max_retries,
                },
            )
            .await?;
        Ok(RetryOutcome::Retried(replacement))
    }

    async fn claim_next_pending(&self, worker_id: &str) -> HarvesterResult<Option<Job>> {
        let mut jobs = self.jobs.lock().unwrap();
        let mut pending: Vec<i64> = jobs
            .values()
            .filter(|j| j.status == JobStatus::Pending)
            .map(|j| j.id)
            .collect();
        pending.sort_by(|a, b| {
            let ja = &jobs[a];
            let jb = &jobs[b];
            jb.priority
                .cmp(&ja.priority)
                .then(ja.created_at.cmp(&jb.created_at))
        });
        match pending.first() {
            Some(id) => {
                let job = jobs.get_mut(id).unwrap();
                job.status = JobStatus::Assigned;
                job.worker_id = Some(worker_id.to_string());
                job.updated_at = Utc::now();
                Ok(Some(job.clone()))
            }
            None => Ok(None),
        }
    }

    async fn mark_running(&self, uuid: Uuid, worker_id: &str) -> HarvesterResult<Option<Job>> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.values_mut().find(|j| {
            j.job_uuid == uuid
                && matches!(j.status, JobStatus::Pending | JobStatus::Assigned)
        });
        match job {
            Some(job) => {
                job.status = JobStatus::Running;
                job.worker_id = Some(worker_id.to_string());
                job.started_at = Some(Utc::now());
                job.updated_at = Utc::now();
                Ok(Some(job.clone()))
            }
            None => Ok(None),
        }
    }

    async fn update_progress(
        &self,
        uuid: Uuid,
        messages_collected: i32,
        progress_percent: f64,
    ) -> HarvesterResult<bool> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .values_mut()
            .find(|j| j.job_uuid == uuid && j.status == JobStatus::Running);
        match job {
            Some(job) => {
                job.messages_collected = messages_collected;
                job.progress_percent = progress_percent.clamp(0.0, 100.0);
                job.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_completed(
        &self,
        uuid: Uuid,
        messages_collected: i32,
    ) -> HarvesterResult<Option<Job>> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .values_mut()
            .find(|j| j.job_uuid == uuid && j.status == JobStatus::Running);
        match job {
            Some(job) => {
                job.status = JobStatus::Completed;
                job.messages_collected = messages_collected;
                job.progress_percent = 100.0;
                job.completed_at = Some(Utc::now());
                job.updated_at = Utc::now();
                Ok(Some(job.clone()))
            }
            None => Ok(None),
        }
    }

    async fn mark_failed(&self, uuid: Uuid, error: &str) -> HarvesterResult<Option<Job>> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .values_mut()
            .find(|j| j.job_uuid == uuid && j.status == JobStatus::Running);
        match job {
            Some(job) => {
                job.status = JobStatus::Failed;
                job.error_message = Some(error.to_string());
                job.retry_count += 1;
                job.completed_at = Some(Utc::now());
                job.updated_at = Utc::now();
                Ok(Some(job.clone()))
            }
            None => Ok(None),
        }
    }

    async fn find_timed_out(&self, cutoff: DateTime<Utc>) -> HarvesterResult<Vec<Job>> {
        let jobs = self.jobs.lock().unwrap();
        let mut timed_out: Vec<Job> = jobs
            .values()
            .filter(|j| {
                if j.status != JobStatus::Running {
                    return false;
                }
                let last_alive = match j.started_at {
                    Some(started) => started.max(j.updated_at),
                    None => j.updated_at,
                };
                last_alive < cutoff
            })
            .cloned()
            .collect();
        timed_out.sort_by_key(|j| j.started_at);
        Ok(timed_out)
    }

    async fn fail_timed_out(&self, id: i64, error: &str) -> HarvesterResult<bool> {
        let mut jobs = self.jobs.lock().unwrap();
        match jobs.get_mut(&id) {
            Some(job) if job.status == JobStatus::Running => {
                job.status = JobStatus::Failed;
                job.error_message = Some(error.to_string());
                job.retry_count += 1;
                job.completed_at = Some(Utc::now());
                job.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn stats_since(&self, cutoff: DateTime<Utc>) -> HarvesterResult<JobStats> {
        let jobs = self.jobs.lock().unwrap();
        let mut stats = JobStats::default();
        for job in jobs.values().filter(|j| j.created_at >= cutoff) {
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Assigned => stats.assigned += 1,
                JobStatus::Running => stats.running += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
                JobStatus::Cancelled => stats.cancelled += 1,
            }
        }
        Ok(stats)
    }

    async fn delete_terminal_before(&self, cutoff: DateTime<Utc>) -> HarvesterResult<u64> {
        let mut jobs = self.jobs.lock().unwrap();
        let before = jobs.len();
        jobs.retain(|_, j| {
            !(j.is_terminal() && j.completed_at.map(|at| at < cutoff).unwrap_or(false))
        });
        Ok((before - jobs.len()) as u64)
    }

    async fn has_open_job(&self, channel_id: i64) -> HarvesterResult<bool> {
        let jobs = self.jobs.lock().unwrap();
        Ok(jobs
            .values()
            .any(|j| j.channel_id == channel_id && j.is_open()))
    }
}

/// Mock implementation of WorkerRepository for testing
#[derive(Debug, Clone, Default)]
pub struct MockWorkerRepository {
    workers: Arc<Mutex<HashMap<String, Worker>>>,
}

impl MockWorkerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workers(workers: Vec<Worker>) -> Self {
        let map = workers
            .into_iter()
            .map(|w| (w.worker_id.clone(), w))
            .collect();
        Self {
            workers: Arc::new(Mutex::new(map)),
        }
    }

    pub fn insert(&self, worker: Worker) {
        self.workers
            .lock()
            .unwrap()
            .insert(worker.worker_id.clone(), worker);
    }

    pub fn get_all(&self) -> Vec<Worker> {
        self.workers.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl WorkerRepository for MockWorkerRepository {
    async fn record_heartbeat(
        &self,
        worker_id: &str,
        status: WorkerStatus,
        at: DateTime<Utc>,
    ) -> HarvesterResult<()> {
        let mut workers = self.workers.lock().unwrap();
        match workers.get_mut(worker_id) {
            Some(worker) => {
                worker.status = status;
                worker.last_heartbeat = Some(at);
            }
            None => {
                workers.insert(
                    worker_id.to_string(),
                    Worker {
                        worker_id: worker_id.to_string(),
                        worker_name: None,
                        hostname: None,
                        location: None,
                        status,
                        last_heartbeat: Some(at),
                        started_at: at,
                        jobs_completed: 0,
                        jobs_failed: 0,
                        messages_processed: 0,
                    },
                );
            }
        }
        Ok(())
    }

    async fn get_by_id(&self, worker_id: &str) -> HarvesterResult<Option<Worker>> {
        Ok(self.workers.lock().unwrap().get(worker_id).cloned())
    }

    async fn list(&self) -> HarvesterResult<Vec<Worker>> {
        Ok(self.workers.lock().unwrap().values().cloned().collect())
    }

    async fn find_stale(&self, cutoff: DateTime<Utc>) -> HarvesterResult<Vec<Worker>> {
        let workers = self.workers.lock().unwrap();
        Ok(workers
            .values()
            .filter(|w| {
                w.status != WorkerStatus::Offline
                    && match w.last_heartbeat {
                        Some(beat) => beat < cutoff,
                        None => true,
                    }
            })
            .cloned()
            .collect())
    }

    async fn mark_offline(&self, worker_id: &str) -> HarvesterResult<bool> {
        let mut workers = self.workers.lock().unwrap();
        match workers.get_mut(worker_id) {
            Some(worker) if worker.status != WorkerStatus::Offline => {
                worker.status = WorkerStatus::Offline;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_completion(&self, worker_id: &str, messages: i64) -> HarvesterResult<()> {
        let mut workers = self.workers.lock().unwrap();
        let worker = workers
            .get_mut(worker_id)
            .ok_or_else(|| HarvesterError::worker_not_found(worker_id))?;
        worker.jobs_completed += 1;
        worker.messages_processed += messages;
        Ok(())
    }

    async fn record_failure(&self, worker_id: &str) -> HarvesterResult<()> {
        let mut workers = self.workers.lock().unwrap();
        let worker = workers
            .get_mut(worker_id)
            .ok_or_else(|| HarvesterError::worker_not_found(worker_id))?;
        worker.jobs_failed += 1;
        Ok(())
    }
}
