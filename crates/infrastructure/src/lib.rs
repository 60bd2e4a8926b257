pub mod database;
pub mod observability;

pub use database::postgres::{
    PostgresChannelRepository, PostgresJobRepository, PostgresWorkerRepository,
};
pub use database::{create_pool, run_migrations};
pub use observability::MetricsCollector;
