pub mod entities;
pub mod repositories;

pub use entities::{
    Channel, ChannelStatus, Job, JobStats, JobStatus, JobType, NewJob, Worker, WorkerStatus,
};
pub use repositories::{ChannelRepository, JobRepository, RetryOutcome, WorkerRepository};
