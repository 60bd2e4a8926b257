pub mod postgres_channel_repository;
pub mod postgres_job_repository;
pub mod postgres_worker_repository;

pub use postgres_channel_repository::PostgresChannelRepository;
pub use postgres_job_repository::PostgresJobRepository;
pub use postgres_worker_repository::PostgresWorkerRepository;
