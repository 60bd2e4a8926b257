use async_trait::async_trait;
use chrono::{DateTime, Utc};
use harvester_domain::{Worker, WorkerRepository, WorkerStatus};
use harvester_errors::{HarvesterError, HarvesterResult};
use sqlx::{PgPool, Row};
use tracing::debug;

pub struct PostgresWorkerRepository {
    pool: PgPool,
}

const WORKER_COLUMNS: &str = "worker_id, worker_name, hostname, location, status, \
     last_heartbeat, started_at, jobs_completed, jobs_failed, messages_processed";

impl PostgresWorkerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_worker(row: &sqlx::postgres::PgRow) -> HarvesterResult<Worker> {
        Ok(Worker {
            worker_id: row.try_get("worker_id")?,
            worker_name: row.try_get("worker_name")?,
            hostname: row.try_get("hostname")?,
            location: row.try_get("location")?,
            status: row.try_get("status")?,
            last_heartbeat: row.try_get("last_heartbeat")?,
            started_at: row.try_get("started_at")?,
            jobs_completed: row.try_get("jobs_completed")?,
            jobs_failed: row.try_get("jobs_failed")?,
            messages_processed: row.try_get("messages_processed")?,
        })
    }
}

#[async_trait]
impl WorkerRepository for PostgresWorkerRepository {
    async fn record_heartbeat(
        &self,
        worker_id: &str,
        status: WorkerStatus,
        at: DateTime<Utc>,
    ) -> HarvesterResult<()> {
        // First heartbeat from an unknown worker registers it.
        sqlx::query(
            r#"
            INSERT INTO workers (worker_id, status, last_heartbeat, started_at)
            VALUES ($1, $2, $3, $3)
            ON CONFLICT (worker_id) DO UPDATE SET
                status = EXCLUDED.status,
                last_heartbeat = EXCLUDED.last_heartbeat
            "#,
        )
        .bind(worker_id)
        .bind(status)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(HarvesterError::Database)?;

        debug!(worker_id, status = status.as_str(), "heartbeat recorded");
        Ok(())
    }

    async fn get_by_id(&self, worker_id: &str) -> HarvesterResult<Option<Worker>> {
        let row = sqlx::query(&format!(
            "SELECT {WORKER_COLUMNS} FROM workers WHERE worker_id = $1"
        ))
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(HarvesterError::Database)?;

        row.as_ref().map(Self::row_to_worker).transpose()
    }

    async fn list(&self) -> HarvesterResult<Vec<Worker>> {
        let rows = sqlx::query(&format!(
            "SELECT {WORKER_COLUMNS} FROM workers ORDER BY started_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(HarvesterError::Database)?;

        rows.iter().map(Self::row_to_worker).collect()
    }

    async fn find_stale(&self, cutoff: DateTime<Utc>) -> HarvesterResult<Vec<Worker>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {WORKER_COLUMNS}
            FROM workers
            WHERE status != 'offline'
              AND (last_heartbeat IS NULL OR last_heartbeat < $1)
            ORDER BY last_heartbeat ASC NULLS FIRST
            "#
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(HarvesterError::Database)?;

        rows.iter().map(Self::row_to_worker).collect()
    }

    async fn mark_offline(&self, worker_id: &str) -> HarvesterResult<bool> {
        let result =
            sqlx::query("UPDATE workers SET status = 'offline' WHERE worker_id = $1 AND status != 'offline'")
                .bind(worker_id)
                .execute(&self.pool)
                .await
                .map_err(HarvesterError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_completion(&self, worker_id: &str, messages: i64) -> HarvesterResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE workers
            SET jobs_completed = jobs_completed + 1,
                messages_processed = messages_processed + $2
            WHERE worker_id = $1
            "#,
        )
        .bind(worker_id)
        .bind(messages)
        .execute(&self.pool)
        .await
        .map_err(HarvesterError::Database)?;

        if result.rows_affected() == 0 {
            return Err(HarvesterError::worker_not_found(worker_id));
        }
        Ok(())
    }

    async fn record_failure(&self, worker_id: &str) -> HarvesterResult<()> {
        let result =
            sqlx::query("UPDATE workers SET jobs_failed = jobs_failed + 1 WHERE worker_id = $1")
                .bind(worker_id)
                .execute(&self.pool)
                .await
                .map_err(HarvesterError::Database)?;

        if result.rows_affected() == 0 {
            return Err(HarvesterError::worker_not_found(worker_id));
        }
        Ok(())
    }
}
