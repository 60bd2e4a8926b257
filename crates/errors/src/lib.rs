use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum HarvesterError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("database operation failed: {0}")]
    DatabaseOperation(String),
    #[error("channel not found: {id}")]
    ChannelNotFound { id: i64 },
    #[error("job not found: {uuid}")]
    JobNotFound { uuid: Uuid },
    #[error("worker not found: {id}")]
    WorkerNotFound { id: String },
    #[error("job {uuid} is {actual}, expected {expected}")]
    InvalidJobState {
        uuid: Uuid,
        expected: String,
        actual: String,
    },
    #[error("channel {channel_id} already has an open job")]
    DuplicateOpenJob { channel_id: i64 },
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("validation failed: {0}")]
    ValidationError(String),
    #[error("operation timed out: {0}")]
    Timeout(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type HarvesterResult<T> = Result<T, HarvesterError>;

impl HarvesterError {
    pub fn database_error<S: Into<String>>(msg: S) -> Self {
        Self::DatabaseOperation(msg.into())
    }
    pub fn channel_not_found(id: i64) -> Self {
        Self::ChannelNotFound { id }
    }
    pub fn job_not_found(uuid: Uuid) -> Self {
        Self::JobNotFound { uuid }
    }
    pub fn worker_not_found<S: Into<String>>(id: S) -> Self {
        Self::WorkerNotFound { id: id.into() }
    }
    pub fn invalid_job_state<E, A>(uuid: Uuid, expected: E, actual: A) -> Self
    where
        E: Into<String>,
        A: Into<String>,
    {
        Self::InvalidJobState {
            uuid,
            expected: expected.into(),
            actual: actual.into(),
        }
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn validation_error<S: Into<String>>(msg: S) -> Self {
        Self::ValidationError(msg.into())
    }
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HarvesterError::Internal(_) | HarvesterError::Configuration(_)
        )
    }
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HarvesterError::Database(_)
                | HarvesterError::DatabaseOperation(_)
                | HarvesterError::Timeout(_)
        )
    }
}

impl From<serde_json::Error> for HarvesterError {
    fn from(err: serde_json::Error) -> Self {
        HarvesterError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for HarvesterError {
    fn from(err: anyhow::Error) -> Self {
        HarvesterError::Internal(err.to_string())
    }
}
