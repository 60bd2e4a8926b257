use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::info;

use harvester_config::AppConfig;
use harvester_dispatcher::{
    DueChannelScanner, JobLifecycleManager, RetentionSweeper, SchedulerLoop, StaleJobReaper,
    WorkerLivenessMonitor,
};
use harvester_infrastructure::{
    create_pool, run_migrations, MetricsCollector, PostgresChannelRepository,
    PostgresJobRepository, PostgresWorkerRepository,
};

/// Wires configuration, the database pool, and the sweep services into a
/// running scheduler.
pub struct Application {
    scheduler: SchedulerLoop,
}

impl Application {
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!(
            database_url = %mask_database_url(&config.database.url),
            "connecting to database"
        );

        let pool = create_pool(&config.database)
            .await
            .context("failed to create database pool")?;
        run_migrations(&pool)
            .await
            .context("failed to run migrations")?;

        let channel_repo = Arc::new(PostgresChannelRepository::new(pool.clone()));
        let job_repo = Arc::new(PostgresJobRepository::new(pool.clone()));
        let worker_repo = Arc::new(PostgresWorkerRepository::new(pool));
        let metrics = Arc::new(MetricsCollector::new());

        let lifecycle = Arc::new(JobLifecycleManager::new(
            job_repo.clone(),
            channel_repo.clone(),
            worker_repo.clone(),
            metrics.clone(),
        ));

        let mut scheduler = SchedulerLoop::new();
        scheduler.register(Arc::new(DueChannelScanner::new(
            channel_repo,
            lifecycle,
            metrics.clone(),
            config.scheduler.due_scanner.clone(),
        )));
        scheduler.register(Arc::new(StaleJobReaper::new(
            job_repo.clone(),
            metrics.clone(),
            config.scheduler.reaper.clone(),
        )));
        scheduler.register(Arc::new(WorkerLivenessMonitor::new(
            worker_repo,
            metrics.clone(),
            config.scheduler.liveness.clone(),
        )));
        scheduler.register(Arc::new(RetentionSweeper::new(
            job_repo,
            metrics,
            config.scheduler.retention.clone(),
        )));

        Ok(Self { scheduler })
    }

    /// Run until the shutdown signal arrives, then drain the sweep tasks.
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        self.scheduler.start();
        info!("scheduler running");

        let _ = shutdown_rx.recv().await;
        info!("shutting down scheduler");
        self.scheduler.stop().await;

        Ok(())
    }
}

/// Strip credentials from a connection string before logging it.
fn mask_database_url(url: &str) -> String {
    if let (Some(scheme_end), Some(at)) = (url.find("://"), url.rfind('@')) {
        let auth_start = scheme_end + 3;
        if at > auth_start {
            return format!("{}***{}", &url[..auth_start], &url[at..]);
        }
    }
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_database_url_hides_credentials() {
        assert_eq!(
            mask_database_url("postgresql://user:secret@db:5432/harvester"),
            "postgresql://***@db:5432/harvester"
        );
    }

    #[test]
    fn test_mask_database_url_without_credentials() {
        assert_eq!(
            mask_database_url("postgresql://localhost/harvester"),
            "postgresql://localhost/harvester"
        );
    }
}
