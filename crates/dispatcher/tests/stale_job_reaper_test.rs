use std::sync::Arc;

use chrono::{Duration, Utc};

use harvester_config::ReaperConfig;
use harvester_dispatcher::StaleJobReaper;
use harvester_domain::JobStatus;
use harvester_infrastructure::MetricsCollector;
use harvester_testing_utils::{JobBuilder, MockJobRepository};

fn reaper_with(config: ReaperConfig) -> (StaleJobReaper, MockJobRepository) {
    let job_repo = MockJobRepository::new();
    let reaper = StaleJobReaper::new(
        Arc::new(job_repo.clone()),
        Arc::new(MetricsCollector::new()),
        config,
    );
    (reaper, job_repo)
}

#[tokio::test]
async fn test_reap_fails_silent_running_jobs() {
    let (reaper, job_repo) = reaper_with(ReaperConfig::default());
    let now = Utc::now();
    let stale = JobBuilder::new(1, 1)
        .with_status(JobStatus::Running)
        .with_worker("worker-1")
        .with_started_at(now - Duration::hours(2))
        .with_updated_at(now - Duration::hours(2))
        .with_retry_count(0)
        .build();
    let stale_uuid = stale.job_uuid;
    job_repo.insert(stale);

    let reaped = reaper.reap_once().await.expect("reap failed");
    assert_eq!(reaped, 1);

    let job = job_repo
        .get_all()
        .into_iter()
        .find(|j| j.job_uuid == stale_uuid)
        .unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.retry_count, 1);
    assert!(job.completed_at.is_some());
    let message = job.error_message.expect("error message missing");
    assert!(message.contains("timed out after 1800s"));
}

#[tokio::test]
async fn test_recent_progress_keeps_job_alive() {
    let (reaper, job_repo) = reaper_with(ReaperConfig::default());
    let now = Utc::now();
    // started long ago but reported progress a minute ago
    job_repo.insert(
        JobBuilder::new(1, 1)
            .with_status(JobStatus::Running)
            .with_started_at(now - Duration::hours(3))
            .with_updated_at(now - Duration::minutes(1))
            .build(),
    );

    let reaped = reaper.reap_once().await.unwrap();
    assert_eq!(reaped, 0);
    assert_eq!(job_repo.get_all()[0].status, JobStatus::Running);
}

#[tokio::test]
async fn test_reap_ignores_non_running_jobs() {
    let (reaper, job_repo) = reaper_with(ReaperConfig::default());
    let now = Utc::now();
    let old = now - Duration::hours(5);

    job_repo.insert(
        JobBuilder::new(1, 1)
            .with_status(JobStatus::Pending)
            .with_created_at(old)
            .with_updated_at(old)
            .build(),
    );
    job_repo.insert(
        JobBuilder::new(2, 2)
            .with_status(JobStatus::Completed)
            .with_started_at(old)
            .with_updated_at(old)
            .build(),
    );

    let reaped = reaper.reap_once().await.unwrap();
    assert_eq!(reaped, 0);
}

#[tokio::test]
async fn test_reap_is_idempotent() {
    let (reaper, job_repo) = reaper_with(ReaperConfig::default());
    let now = Utc::now();
    job_repo.insert(
        JobBuilder::new(1, 1)
            .with_status(JobStatus::Running)
            .with_started_at(now - Duration::hours(2))
            .with_updated_at(now - Duration::hours(2))
            .build(),
    );

    assert_eq!(reaper.reap_once().await.unwrap(), 1);
    assert_eq!(reaper.reap_once().await.unwrap(), 0);
}

#[tokio::test]
async fn test_timeout_boundary_respects_config() {
    let config = ReaperConfig {
        sweep_interval_seconds: 60,
        job_timeout_seconds: 300,
    };
    let (reaper, job_repo) = reaper_with(config);
    let now = Utc::now();

    job_repo.insert(
        JobBuilder::new(1, 1)
            .with_status(JobStatus::Running)
            .with_started_at(now - Duration::seconds(400))
            .with_updated_at(now - Duration::seconds(400))
            .build(),
    );
    job_repo.insert(
        JobBuilder::new(2, 2)
            .with_status(JobStatus::Running)
            .with_started_at(now - Duration::seconds(200))
            .with_updated_at(now - Duration::seconds(200))
            .build(),
    );

    assert_eq!(reaper.reap_once().await.unwrap(), 1);
    let jobs = job_repo.get_all();
    let reaped = jobs.iter().find(|j| j.id == 1).unwrap();
    let alive = jobs.iter().find(|j| j.id == 2).unwrap();
    assert_eq!(reaped.status, JobStatus::Failed);
    assert_eq!(alive.status, JobStatus::Running);
}
