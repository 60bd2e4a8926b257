//! Scheduling core: job lifecycle management and the periodic sweeps that
//! keep channels collected, stuck jobs failed, and worker liveness honest.

pub mod due_scanner;
pub mod job_lifecycle;
pub mod retention;
pub mod scheduler_loop;
pub mod stale_job_reaper;
pub mod worker_monitor;

pub use due_scanner::DueChannelScanner;
pub use job_lifecycle::{JobLifecycleManager, JobLifecycleService};
pub use retention::RetentionSweeper;
pub use scheduler_loop::{SchedulerLoop, Sweep};
pub use stale_job_reaper::StaleJobReaper;
pub use worker_monitor::WorkerLivenessMonitor;
