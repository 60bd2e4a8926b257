use async_trait::async_trait;
use chrono::{DateTime, Utc};
use harvester_domain::{Job, JobRepository, JobStats, NewJob, RetryOutcome};
use harvester_errors::{HarvesterError, HarvesterResult};
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

pub struct PostgresJobRepository {
    pool: PgPool,
}

const JOB_COLUMNS: &str = "id, job_uuid, channel_id, worker_id, job_type, status, priority, \
     parameters, created_by, messages_collected, messages_target, progress_percent, \
     started_at, completed_at, error_message, retry_count, max_retries, created_at, updated_at";

impl PostgresJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_job(row: &sqlx::postgres::PgRow) -> HarvesterResult<Job> {
        Ok(Job {
            id: row.try_get("id")?,
            job_uuid: row.try_get("job_uuid")?,
            channel_id: row.try_get("channel_id")?,
            worker_id: row.try_get("worker_id")?,
            job_type: row.try_get("job_type")?,
            status: row.try_get("status")?,
            priority: row.try_get("priority")?,
            parameters: row.try_get("parameters")?,
            created_by: row.try_get("created_by")?,
            messages_collected: row.try_get("messages_collected")?,
            messages_target: row.try_get("messages_target")?,
            progress_percent: row.try_get("progress_percent")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            error_message: row.try_get("error_message")?,
            retry_count: row.try_get("retry_count")?,
            max_retries: row.try_get("max_retries")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    /// Map constraint violations from the insert into domain errors.
    fn map_insert_error(err: sqlx::Error, job: &NewJob) -> HarvesterError {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_foreign_key_violation() {
                return HarvesterError::channel_not_found(job.channel_id);
            }
            if db_err.is_unique_violation() {
                return HarvesterError::DuplicateOpenJob {
                    channel_id: job.channel_id,
                };
            }
        }
        HarvesterError::Database(err)
    }
}

#[async_trait]
impl JobRepository for PostgresJobRepository {
    #[instrument(skip(self, job), fields(channel_id = job.channel_id))]
    async fn create(&self, job: &NewJob) -> HarvesterResult<Job> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO jobs (job_uuid, channel_id, job_type, priority, parameters, created_by, max_retries)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(job.job_uuid)
        .bind(job.channel_id)
        .bind(job.job_type)
        .bind(job.priority)
        .bind(&job.parameters)
        .bind(&job.created_by)
        .bind(job.max_retries)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Self::map_insert_error(e, job))?;

        let created = Self::row_to_job(&row)?;
        debug!(job_uuid = %created.job_uuid, "job created");
        Ok(created)
    }

    async fn create_if_no_open(&self, job: &NewJob) -> HarvesterResult<Option<Job>> {
        // Guarded insert for the scanner. The partial unique index on open
        // jobs backstops this against concurrent writers; a unique violation
        // from losing that race is treated the same as the guard firing.
        let result = sqlx::query(&format!(
            r#"
            INSERT INTO jobs (job_uuid, channel_id, job_type, priority, parameters, created_by, max_retries)
            SELECT $1, $2, $3, $4, $5, $6, $7
            WHERE NOT EXISTS (
                SELECT 1 FROM jobs
                WHERE channel_id = $2 AND status IN ('pending', 'assigned', 'running')
            )
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(job.job_uuid)
        .bind(job.channel_id)
        .bind(job.job_type)
        .bind(job.priority)
        .bind(&job.parameters)
        .bind(&job.created_by)
        .bind(job.max_retries)
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(row) => row.as_ref().map(Self::row_to_job).transpose(),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Ok(None),
            Err(e) => Err(HarvesterError::Database(e)),
        }
    }

    async fn get_by_uuid(&self, uuid: Uuid) -> HarvesterResult<Option<Job>> {
        let row = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE job_uuid = $1"
        ))
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await
        .map_err(HarvesterError::Database)?;

        row.as_ref().map(Self::row_to_job).transpose()
    }

    async fn cancel(&self, uuid: Uuid) -> HarvesterResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'cancelled', completed_at = NOW(), updated_at = NOW()
            WHERE job_uuid = $1 AND status IN ('pending', 'assigned')
            "#,
        )
        .bind(uuid)
        .execute(&self.pool)
        .await
        .map_err(HarvesterError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn retry_as_new(&self, uuid: Uuid) -> HarvesterResult<RetryOutcome> {
        let mut tx = self.pool.begin().await.map_err(HarvesterError::Database)?;

        // Lock the source row so concurrent retries of the same job cannot
        // both clone it.
        let row = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE job_uuid = $1 FOR UPDATE"
        ))
        .bind(uuid)
        .fetch_optional(&mut *tx)
        .await
        .map_err(HarvesterError::Database)?;

        let original = match row {
            Some(ref row) => Self::row_to_job(row)?,
            None => return Ok(RetryOutcome::NotFound),
        };

        if original.status != harvester_domain::JobStatus::Failed {
            return Ok(RetryOutcome::NotRetryable(original));
        }

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO jobs (job_uuid, channel_id, job_type, priority, parameters, created_by, max_retries)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(original.channel_id)
        .bind(original.job_type)
        .bind(original.priority)
        .bind(&original.parameters)
        .bind(&original.created_by)
        .bind(original.max_retries)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.is_unique_violation() {
                    return HarvesterError::DuplicateOpenJob {
                        channel_id: original.channel_id,
                    };
                }
            }
            HarvesterError::Database(e)
        })?;

        let replacement = Self::row_to_job(&row)?;
        tx.commit().await.map_err(HarvesterError::Database)?;

        debug!(original = %uuid, replacement = %replacement.job_uuid, "failed job retried");
        Ok(RetryOutcome::Retried(replacement))
    }

    #[instrument(skip(self))]
    async fn claim_next_pending(&self, worker_id: &str) -> HarvesterResult<Option<Job>> {
        // SKIP LOCKED keeps concurrent claimers from blocking on, or
        // double-claiming, the same row.
        let row = sqlx::query(&format!(
            r#"
            UPDATE jobs
            SET status = 'assigned', worker_id = $1, updated_at = NOW()
            WHERE id = (
                SELECT id FROM jobs
                WHERE status = 'pending'
                ORDER BY priority DESC, created_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(HarvesterError::Database)?;

        let claimed = row.as_ref().map(Self::row_to_job).transpose()?;
        if let Some(ref job) = claimed {
            debug!(job_uuid = %job.job_uuid, worker_id, "job claimed");
        }
        Ok(claimed)
    }

    async fn mark_running(&self, uuid: Uuid, worker_id: &str) -> HarvesterResult<Option<Job>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE jobs
            SET status = 'running', worker_id = $2, started_at = NOW(), updated_at = NOW()
            WHERE job_uuid = $1 AND status IN ('pending', 'assigned')
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(uuid)
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(HarvesterError::Database)?;

        row.as_ref().map(Self::row_to_job).transpose()
    }

    async fn update_progress(
        &self,
        uuid: Uuid,
        messages_collected: i32,
        progress_percent: f64,
    ) -> HarvesterResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET messages_collected = $2, progress_percent = $3, updated_at = NOW()
            WHERE job_uuid = $1 AND status = 'running'
            "#,
        )
        .bind(uuid)
        .bind(messages_collected)
        .bind(progress_percent.clamp(0.0, 100.0))
        .execute(&self.pool)
        .await
        .map_err(HarvesterError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_completed(
        &self,
        uuid: Uuid,
        messages_collected: i32,
    ) -> HarvesterResult<Option<Job>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE jobs
            SET status = 'completed', messages_collected = $2, progress_percent = 100,
                completed_at = NOW(), updated_at = NOW()
            WHERE job_uuid = $1 AND status = 'running'
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(uuid)
        .bind(messages_collected)
        .fetch_optional(&self.pool)
        .await
        .map_err(HarvesterError::Database)?;

        row.as_ref().map(Self::row_to_job).transpose()
    }

    async fn mark_failed(&self, uuid: Uuid, error: &str) -> HarvesterResult<Option<Job>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE jobs
            SET status = 'failed', error_message = $2, retry_count = retry_count + 1,
                completed_at = NOW(), updated_at = NOW()
            WHERE job_uuid = $1 AND status = 'running'
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(uuid)
        .bind(error)
        .fetch_optional(&self.pool)
        .await
        .map_err(HarvesterError::Database)?;

        row.as_ref().map(Self::row_to_job).transpose()
    }

    async fn find_timed_out(&self, cutoff: DateTime<Utc>) -> HarvesterResult<Vec<Job>> {
        // A progress report touches updated_at, so GREATEST picks the last
        // sign of life whether or not the worker ever reported.
        let rows = sqlx::query(&format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM jobs
            WHERE status = 'running'
              AND GREATEST(started_at, updated_at) < $1
            ORDER BY started_at ASC
            "#
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(HarvesterError::Database)?;

        rows.iter().map(Self::row_to_job).collect()
    }

    async fn fail_timed_out(&self, id: i64, error: &str) -> HarvesterResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'failed', error_message = $2, retry_count = retry_count + 1,
                completed_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(HarvesterError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    async fn stats_since(&self, cutoff: DateTime<Utc>) -> HarvesterResult<JobStats> {
        let rows = sqlx::query(
            r#"
            SELECT status, COUNT(*) as count
            FROM jobs
            WHERE created_at >= $1
            GROUP BY status
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(HarvesterError::Database)?;

        let mut stats = JobStats::default();
        for row in rows {
            let status: String = row.try_get("status")?;
            let count: i64 = row.try_get("count")?;
            match status.as_str() {
                "pending" => stats.pending = count,
                "assigned" => stats.assigned = count,
                "running" => stats.running = count,
                "completed" => stats.completed = count,
                "failed" => stats.failed = count,
                "cancelled" => stats.cancelled = count,
                _ => {}
            }
        }

        Ok(stats)
    }

    #[instrument(skip(self))]
    async fn delete_terminal_before(&self, cutoff: DateTime<Utc>) -> HarvesterResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM jobs
            WHERE status IN ('completed', 'failed', 'cancelled')
              AND completed_at IS NOT NULL
              AND completed_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(HarvesterError::Database)?;

        let deleted = result.rows_affected();
        if deleted > 0 {
            debug!(deleted, "purged terminal jobs");
        }
        Ok(deleted)
    }

    async fn has_open_job(&self, channel_id: i64) -> HarvesterResult<bool> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM jobs
                WHERE channel_id = $1 AND status IN ('pending', 'assigned', 'running')
            ) as has_open
            "#,
        )
        .bind(channel_id)
        .fetch_one(&self.pool)
        .await
        .map_err(HarvesterError::Database)?;

        Ok(row.try_get("has_open")?)
    }
}
