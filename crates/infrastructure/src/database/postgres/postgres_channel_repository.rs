use async_trait::async_trait;
use chrono::{DateTime, Utc};
use harvester_domain::{Channel, ChannelRepository, ChannelStatus};
use harvester_errors::{HarvesterError, HarvesterResult};
use sqlx::{PgPool, Row};
use tracing::debug;

pub struct PostgresChannelRepository {
    pool: PgPool,
}

impl PostgresChannelRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_channel(row: &sqlx::postgres::PgRow) -> HarvesterResult<Channel> {
        Ok(Channel {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            status: row.try_get("status")?,
            parse_frequency: row.try_get("parse_frequency")?,
            last_parsed_at: row.try_get("last_parsed_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

const CHANNEL_COLUMNS: &str =
    "id, username, status, parse_frequency, last_parsed_at, created_at, updated_at";

#[async_trait]
impl ChannelRepository for PostgresChannelRepository {
    async fn get_by_id(&self, id: i64) -> HarvesterResult<Option<Channel>> {
        let row = sqlx::query(&format!(
            "SELECT {CHANNEL_COLUMNS} FROM channels WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(HarvesterError::Database)?;

        row.as_ref().map(Self::row_to_channel).transpose()
    }

    async fn get_by_username(&self, username: &str) -> HarvesterResult<Option<Channel>> {
        let row = sqlx::query(&format!(
            "SELECT {CHANNEL_COLUMNS} FROM channels WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(HarvesterError::Database)?;

        row.as_ref().map(Self::row_to_channel).transpose()
    }

    async fn find_due(&self, now: DateTime<Utc>, limit: i64) -> HarvesterResult<Vec<Channel>> {
        // Never-collected channels sort ahead of everything, then oldest
        // collection first. The NOT EXISTS clause keeps channels with an open
        // job out of the sweep entirely.
        let rows = sqlx::query(&format!(
            r#"
            SELECT {CHANNEL_COLUMNS}
            FROM channels c
            WHERE c.status = 'active'
              AND (c.last_parsed_at IS NULL
                   OR c.last_parsed_at + make_interval(secs => c.parse_frequency) <= $1)
              AND NOT EXISTS (
                  SELECT 1 FROM jobs j
                  WHERE j.channel_id = c.id
                    AND j.status IN ('pending', 'assigned', 'running')
              )
            ORDER BY c.last_parsed_at ASC NULLS FIRST
            LIMIT $2
            "#
        ))
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(HarvesterError::Database)?;

        rows.iter().map(Self::row_to_channel).collect()
    }

    async fn record_parsed(&self, channel_id: i64, at: DateTime<Utc>) -> HarvesterResult<()> {
        let result = sqlx::query(
            "UPDATE channels SET last_parsed_at = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(at)
        .bind(channel_id)
        .execute(&self.pool)
        .await
        .map_err(HarvesterError::Database)?;

        if result.rows_affected() == 0 {
            return Err(HarvesterError::channel_not_found(channel_id));
        }

        debug!(channel_id, "recorded channel collection timestamp");
        Ok(())
    }

    async fn update_status(&self, channel_id: i64, status: ChannelStatus) -> HarvesterResult<()> {
        let result =
            sqlx::query("UPDATE channels SET status = $1, updated_at = NOW() WHERE id = $2")
                .bind(status)
                .bind(channel_id)
                .execute(&self.pool)
                .await
                .map_err(HarvesterError::Database)?;

        if result.rows_affected() == 0 {
            return Err(HarvesterError::channel_not_found(channel_id));
        }

        debug!(channel_id, status = status.as_str(), "channel status updated");
        Ok(())
    }
}
