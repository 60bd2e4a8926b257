use metrics::{counter, gauge, histogram, Counter, Gauge, Histogram};
use tracing::info;

/// Metrics collector for the harvester scheduler.
pub struct MetricsCollector {
    // Job lifecycle metrics
    jobs_created_total: Counter,
    jobs_completed_total: Counter,
    jobs_failed_total: Counter,
    jobs_reaped_total: Counter,
    jobs_purged_total: Counter,

    // Worker metrics
    workers_marked_offline_total: Counter,
    active_workers: Gauge,

    // Sweep timings
    due_scan_duration: Histogram,
    reaper_sweep_duration: Histogram,
    liveness_check_duration: Histogram,
    retention_sweep_duration: Histogram,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            jobs_created_total: counter!("harvester_jobs_created_total"),
            jobs_completed_total: counter!("harvester_jobs_completed_total"),
            jobs_failed_total: counter!("harvester_jobs_failed_total"),
            jobs_reaped_total: counter!("harvester_jobs_reaped_total"),
            jobs_purged_total: counter!("harvester_jobs_purged_total"),
            workers_marked_offline_total: counter!("harvester_workers_marked_offline_total"),
            active_workers: gauge!("harvester_active_workers"),
            due_scan_duration: histogram!("harvester_due_scan_duration_seconds"),
            reaper_sweep_duration: histogram!("harvester_reaper_sweep_duration_seconds"),
            liveness_check_duration: histogram!("harvester_liveness_check_duration_seconds"),
            retention_sweep_duration: histogram!("harvester_retention_sweep_duration_seconds"),
        }
    }

    pub fn record_jobs_created(&self, count: u64) {
        self.jobs_created_total.increment(count);
    }

    pub fn record_job_completed(&self) {
        self.jobs_completed_total.increment(1);
    }

    pub fn record_job_failed(&self) {
        self.jobs_failed_total.increment(1);
    }

    pub fn record_jobs_reaped(&self, count: u64) {
        if count > 0 {
            info!(count, "running jobs reaped after timeout");
        }
        self.jobs_reaped_total.increment(count);
    }

    pub fn record_jobs_purged(&self, count: u64) {
        self.jobs_purged_total.increment(count);
    }

    pub fn record_workers_marked_offline(&self, count: u64) {
        self.workers_marked_offline_total.increment(count);
    }

    pub fn update_active_workers(&self, count: f64) {
        self.active_workers.set(count);
    }

    pub fn record_due_scan(&self, duration_seconds: f64) {
        self.due_scan_duration.record(duration_seconds);
    }

    pub fn record_reaper_sweep(&self, duration_seconds: f64) {
        self.reaper_sweep_duration.record(duration_seconds);
    }

    pub fn record_liveness_check(&self, duration_seconds: f64) {
        self.liveness_check_duration.record(duration_seconds);
    }

    pub fn record_retention_sweep(&self, duration_seconds: f64) {
        self.retention_sweep_duration.record(duration_seconds);
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
