use std::sync::Arc;

use chrono::{Duration, Utc};

use harvester_config::LivenessConfig;
use harvester_dispatcher::WorkerLivenessMonitor;
use harvester_domain::{WorkerRepository, WorkerStatus};
use harvester_infrastructure::MetricsCollector;
use harvester_testing_utils::{MockWorkerRepository, WorkerBuilder};

fn monitor_with(config: LivenessConfig) -> (WorkerLivenessMonitor, MockWorkerRepository) {
    let worker_repo = MockWorkerRepository::new();
    let monitor = WorkerLivenessMonitor::new(
        Arc::new(worker_repo.clone()),
        Arc::new(MetricsCollector::new()),
        config,
    );
    (monitor, worker_repo)
}

#[tokio::test]
async fn test_stale_worker_marked_offline() {
    let (monitor, worker_repo) = monitor_with(LivenessConfig::default());
    let now = Utc::now();

    worker_repo.insert(
        WorkerBuilder::new("stale")
            .with_status(WorkerStatus::Busy)
            .with_last_heartbeat(now - Duration::seconds(300))
            .build(),
    );
    worker_repo.insert(
        WorkerBuilder::new("fresh")
            .with_status(WorkerStatus::Idle)
            .with_last_heartbeat(now - Duration::seconds(30))
            .build(),
    );

    let offlined = monitor.check_once().await.expect("check failed");
    assert_eq!(offlined, 1);

    let workers = worker_repo.get_all();
    let stale = workers.iter().find(|w| w.worker_id == "stale").unwrap();
    let fresh = workers.iter().find(|w| w.worker_id == "fresh").unwrap();
    assert_eq!(stale.status, WorkerStatus::Offline);
    assert_eq!(fresh.status, WorkerStatus::Idle);
}

#[tokio::test]
async fn test_worker_without_heartbeat_marked_offline() {
    let (monitor, worker_repo) = monitor_with(LivenessConfig::default());
    worker_repo.insert(WorkerBuilder::new("silent").without_heartbeat().build());

    let offlined = monitor.check_once().await.unwrap();
    assert_eq!(offlined, 1);
}

#[tokio::test]
async fn test_already_offline_worker_not_recounted() {
    let (monitor, worker_repo) = monitor_with(LivenessConfig::default());
    let now = Utc::now();
    worker_repo.insert(
        WorkerBuilder::new("gone")
            .with_status(WorkerStatus::Offline)
            .with_last_heartbeat(now - Duration::hours(1))
            .build(),
    );

    let offlined = monitor.check_once().await.unwrap();
    assert_eq!(offlined, 0);
}

#[tokio::test]
async fn test_worker_returns_via_heartbeat() {
    let (monitor, worker_repo) = monitor_with(LivenessConfig::default());
    let now = Utc::now();
    worker_repo.insert(
        WorkerBuilder::new("flaky")
            .with_status(WorkerStatus::Busy)
            .with_last_heartbeat(now - Duration::seconds(500))
            .build(),
    );

    assert_eq!(monitor.check_once().await.unwrap(), 1);

    // the worker heartbeats again and is live once more
    worker_repo
        .record_heartbeat("flaky", WorkerStatus::Idle, Utc::now())
        .await
        .unwrap();
    assert_eq!(monitor.check_once().await.unwrap(), 0);

    let worker = worker_repo.get_all().pop().unwrap();
    assert_eq!(worker.status, WorkerStatus::Idle);
}

#[tokio::test]
async fn test_first_heartbeat_registers_worker() {
    let (_, worker_repo) = monitor_with(LivenessConfig::default());
    worker_repo
        .record_heartbeat("brand-new", WorkerStatus::Active, Utc::now())
        .await
        .unwrap();

    let worker = worker_repo.get_all().pop().unwrap();
    assert_eq!(worker.worker_id, "brand-new");
    assert_eq!(worker.jobs_completed, 0);
}

#[tokio::test]
async fn test_boundary_uses_configured_threshold() {
    let config = LivenessConfig {
        check_interval_seconds: 10,
        heartbeat_timeout_seconds: 60,
    };
    let (monitor, worker_repo) = monitor_with(config);
    let now = Utc::now();

    worker_repo.insert(
        WorkerBuilder::new("just-under")
            .with_last_heartbeat(now - Duration::seconds(45))
            .build(),
    );
    worker_repo.insert(
        WorkerBuilder::new("just-over")
            .with_last_heartbeat(now - Duration::seconds(90))
            .build(),
    );

    assert_eq!(monitor.check_once().await.unwrap(), 1);
    let workers = worker_repo.get_all();
    assert_eq!(
        workers
            .iter()
            .find(|w| w.worker_id == "just-over")
            .unwrap()
            .status,
        WorkerStatus::Offline
    );
}
