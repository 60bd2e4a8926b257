use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use harvester_dispatcher::{JobLifecycleManager, JobLifecycleService};
use harvester_domain::{ChannelStatus, JobStatus, JobType};
use harvester_errors::HarvesterError;
use harvester_infrastructure::MetricsCollector;
use harvester_testing_utils::{
    ChannelBuilder, JobBuilder, MockChannelRepository, MockJobRepository, MockWorkerRepository,
    WorkerBuilder,
};

fn setup() -> (
    JobLifecycleManager,
    MockJobRepository,
    MockChannelRepository,
    MockWorkerRepository,
) {
    let job_repo = MockJobRepository::new();
    let channel_repo = MockChannelRepository::new();
    let worker_repo = MockWorkerRepository::new();
    let manager = JobLifecycleManager::new(
        Arc::new(job_repo.clone()),
        Arc::new(channel_repo.clone()),
        Arc::new(worker_repo.clone()),
        Arc::new(MetricsCollector::new()),
    );
    (manager, job_repo, channel_repo, worker_repo)
}

#[tokio::test]
async fn test_create_job_inserts_pending() {
    let (manager, job_repo, channel_repo, _) = setup();
    channel_repo.insert(ChannelBuilder::new(1, "newsfeed").build());

    let job = manager
        .create_job(1, JobType::Manual, 5, None, Some("operator".to_string()))
        .await
        .expect("create failed");

    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.priority, 5);
    assert_eq!(job.created_by.as_deref(), Some("operator"));
    assert_eq!(job_repo.count(), 1);
}

#[tokio::test]
async fn test_create_job_rejects_second_open_job() {
    let (manager, _, channel_repo, _) = setup();
    channel_repo.insert(ChannelBuilder::new(1, "newsfeed").build());

    manager
        .create_job(1, JobType::Update, 0, None, None)
        .await
        .expect("first create failed");

    let err = manager
        .create_job(1, JobType::Update, 0, None, None)
        .await
        .expect_err("second open job must be rejected");
    assert!(matches!(
        err,
        HarvesterError::DuplicateOpenJob { channel_id: 1 }
    ));
}

#[tokio::test]
async fn test_create_job_for_missing_channel() {
    let (manager, job_repo, channel_repo, _) = setup();
    channel_repo.insert(ChannelBuilder::new(1, "newsfeed").build());
    job_repo.restrict_channels(&[1]);

    let err = manager
        .create_job(99, JobType::Update, 0, None, None)
        .await
        .expect_err("unknown channel must be rejected");
    assert!(matches!(err, HarvesterError::ChannelNotFound { id: 99 }));
    assert_eq!(job_repo.count(), 0);
}

#[tokio::test]
async fn test_cancel_only_before_running() {
    let (manager, job_repo, _, _) = setup();
    let pending = JobBuilder::new(1, 1).with_status(JobStatus::Pending).build();
    let running = JobBuilder::new(2, 2).with_status(JobStatus::Running).build();
    let pending_uuid = pending.job_uuid;
    let running_uuid = running.job_uuid;
    job_repo.insert(pending);
    job_repo.insert(running);

    assert!(manager.cancel_job(pending_uuid).await.unwrap());
    assert!(!manager.cancel_job(running_uuid).await.unwrap());

    let cancelled = job_repo
        .get_all()
        .into_iter()
        .find(|j| j.job_uuid == pending_uuid)
        .unwrap();
    assert_eq!(cancelled.status, JobStatus::Cancelled);
    assert!(cancelled.completed_at.is_some());
}

#[tokio::test]
async fn test_retry_clones_failed_job() {
    let (manager, job_repo, _, _) = setup();
    let failed = JobBuilder::new(1, 7)
        .with_status(JobStatus::Failed)
        .with_priority(9)
        .build();
    let original_uuid = failed.job_uuid;
    job_repo.insert(failed);

    let replacement = manager.retry_job(original_uuid).await.expect("retry failed");

    assert_ne!(replacement.job_uuid, original_uuid);
    assert_eq!(replacement.channel_id, 7);
    assert_eq!(replacement.priority, 9);
    assert_eq!(replacement.status, JobStatus::Pending);
    assert_eq!(replacement.retry_count, 0);

    // original left untouched
    let original = job_repo
        .get_all()
        .into_iter()
        .find(|j| j.job_uuid == original_uuid)
        .unwrap();
    assert_eq!(original.status, JobStatus::Failed);
}

#[tokio::test]
async fn test_retry_rejects_non_failed_and_missing() {
    let (manager, job_repo, _, _) = setup();
    let completed = JobBuilder::new(1, 1)
        .with_status(JobStatus::Completed)
        .build();
    let completed_uuid = completed.job_uuid;
    job_repo.insert(completed);

    let err = manager.retry_job(completed_uuid).await.unwrap_err();
    assert!(matches!(err, HarvesterError::InvalidJobState { .. }));

    let err = manager.retry_job(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, HarvesterError::JobNotFound { .. }));
}

#[tokio::test]
async fn test_claim_orders_by_priority_then_age() {
    let (manager, job_repo, _, _) = setup();
    let now = Utc::now();
    let low = JobBuilder::new(1, 1)
        .with_priority(1)
        .with_created_at(now - chrono::Duration::minutes(10))
        .build();
    let high_old = JobBuilder::new(2, 2)
        .with_priority(5)
        .with_created_at(now - chrono::Duration::minutes(5))
        .build();
    let high_new = JobBuilder::new(3, 3)
        .with_priority(5)
        .with_created_at(now)
        .build();
    let high_old_uuid = high_old.job_uuid;
    job_repo.insert(low);
    job_repo.insert(high_old);
    job_repo.insert(high_new);

    let first = manager.claim_job("worker-1").await.unwrap().unwrap();
    assert_eq!(first.job_uuid, high_old_uuid);
    assert_eq!(first.status, JobStatus::Assigned);
    assert_eq!(first.worker_id.as_deref(), Some("worker-1"));

    // three claims drain the queue, a fourth gets nothing
    assert!(manager.claim_job("worker-2").await.unwrap().is_some());
    assert!(manager.claim_job("worker-3").await.unwrap().is_some());
    assert!(manager.claim_job("worker-4").await.unwrap().is_none());
}

#[tokio::test]
async fn test_complete_job_propagates_to_channel_and_worker() {
    let (manager, job_repo, channel_repo, worker_repo) = setup();
    channel_repo.insert(ChannelBuilder::new(4, "newsfeed").build());
    worker_repo.insert(WorkerBuilder::new("worker-1").build());
    let job = JobBuilder::new(1, 4).build();
    let uuid = job.job_uuid;
    job_repo.insert(job);

    manager.start_job(uuid, "worker-1").await.expect("start failed");
    manager
        .report_progress(uuid, 120, 40.0)
        .await
        .expect("progress failed");
    let completed = manager.complete_job(uuid, 300).await.expect("complete failed");

    assert_eq!(completed.status, JobStatus::Completed);
    assert_eq!(completed.messages_collected, 300);
    assert_eq!(completed.progress_percent, 100.0);
    assert!(completed.completed_at.is_some());

    let channel = channel_repo.get_all().pop().unwrap();
    assert!(channel.last_parsed_at.is_some());

    let worker = worker_repo.get_all().pop().unwrap();
    assert_eq!(worker.jobs_completed, 1);
    assert_eq!(worker.messages_processed, 300);
}

#[tokio::test]
async fn test_fail_job_with_retries_left_keeps_channel_active() {
    let (manager, job_repo, channel_repo, worker_repo) = setup();
    channel_repo.insert(ChannelBuilder::new(4, "newsfeed").build());
    worker_repo.insert(WorkerBuilder::new("worker-1").build());
    let job = JobBuilder::new(1, 4).with_max_retries(3).build();
    let uuid = job.job_uuid;
    job_repo.insert(job);

    manager.start_job(uuid, "worker-1").await.unwrap();
    let failed = manager.fail_job(uuid, "flood wait").await.unwrap();

    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.retry_count, 1);
    assert_eq!(failed.error_message.as_deref(), Some("flood wait"));

    let channel = channel_repo.get_all().pop().unwrap();
    assert_eq!(channel.status, ChannelStatus::Active);

    let worker = worker_repo.get_all().pop().unwrap();
    assert_eq!(worker.jobs_failed, 1);
}

#[tokio::test]
async fn test_fail_job_exhausted_retries_flags_channel() {
    let (manager, job_repo, channel_repo, worker_repo) = setup();
    channel_repo.insert(ChannelBuilder::new(4, "newsfeed").build());
    worker_repo.insert(WorkerBuilder::new("worker-1").build());
    let job = JobBuilder::new(1, 4)
        .with_retry_count(2)
        .with_max_retries(3)
        .build();
    let uuid = job.job_uuid;
    job_repo.insert(job);

    manager.start_job(uuid, "worker-1").await.unwrap();
    let failed = manager.fail_job(uuid, "channel gone").await.unwrap();

    assert_eq!(failed.retry_count, 3);
    let channel = channel_repo.get_all().pop().unwrap();
    assert_eq!(channel.status, ChannelStatus::Error);
}

#[tokio::test]
async fn test_start_job_invalid_state() {
    let (manager, job_repo, _, _) = setup();
    let job = JobBuilder::new(1, 1).with_status(JobStatus::Completed).build();
    let uuid = job.job_uuid;
    job_repo.insert(job);

    let err = manager.start_job(uuid, "worker-1").await.unwrap_err();
    assert!(matches!(err, HarvesterError::InvalidJobState { .. }));

    let err = manager.start_job(Uuid::new_v4(), "worker-1").await.unwrap_err();
    assert!(matches!(err, HarvesterError::JobNotFound { .. }));
}

#[tokio::test]
async fn test_job_stats_counts_by_status() {
    let (manager, job_repo, _, _) = setup();
    job_repo.insert(JobBuilder::new(1, 1).with_status(JobStatus::Pending).build());
    job_repo.insert(JobBuilder::new(2, 2).with_status(JobStatus::Running).build());
    job_repo.insert(JobBuilder::new(3, 3).with_status(JobStatus::Completed).build());
    job_repo.insert(JobBuilder::new(4, 4).with_status(JobStatus::Completed).build());
    job_repo.insert(JobBuilder::new(5, 5).with_status(JobStatus::Failed).build());

    let stats = manager.job_stats().await.unwrap();
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.running, 1);
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.total(), 5);
}
