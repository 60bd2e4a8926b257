use crate::validation::{ConfigValidator, ValidationUtils};
use serde::{Deserialize, Serialize};

/// Settings for the periodic sweeps run by the scheduler loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub due_scanner: DueScannerConfig,
    pub reaper: ReaperConfig,
    pub liveness: LivenessConfig,
    pub retention: RetentionConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            due_scanner: DueScannerConfig::default(),
            reaper: ReaperConfig::default(),
            liveness: LivenessConfig::default(),
            retention: RetentionConfig::default(),
        }
    }
}

impl ConfigValidator for SchedulerConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        self.due_scanner.validate()?;
        self.reaper.validate()?;
        self.liveness.validate()?;
        self.retention.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DueScannerConfig {
    pub scan_interval_seconds: u64,
    /// Cap on jobs created in a single sweep.
    pub max_jobs_per_sweep: i64,
    pub job_max_retries: i32,
}

impl Default for DueScannerConfig {
    fn default() -> Self {
        Self {
            scan_interval_seconds: 300,
            max_jobs_per_sweep: 10,
            job_max_retries: 3,
        }
    }
}

impl ConfigValidator for DueScannerConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_seconds(
            self.scan_interval_seconds,
            "scheduler.due_scanner.scan_interval_seconds",
        )?;
        ValidationUtils::validate_count(
            self.max_jobs_per_sweep as usize,
            "scheduler.due_scanner.max_jobs_per_sweep",
        )?;
        if self.job_max_retries < 0 {
            return Err(crate::ConfigError::Validation(
                "scheduler.due_scanner.job_max_retries cannot be negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaperConfig {
    pub sweep_interval_seconds: u64,
    /// Running jobs silent for longer than this are failed.
    pub job_timeout_seconds: u64,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            sweep_interval_seconds: 600,
            job_timeout_seconds: 1800,
        }
    }
}

impl ConfigValidator for ReaperConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_seconds(
            self.sweep_interval_seconds,
            "scheduler.reaper.sweep_interval_seconds",
        )?;
        ValidationUtils::validate_seconds(
            self.job_timeout_seconds,
            "scheduler.reaper.job_timeout_seconds",
        )?;
        if self.job_timeout_seconds <= self.sweep_interval_seconds {
            return Err(crate::ConfigError::Validation(
                "scheduler.reaper.job_timeout_seconds must exceed the sweep interval".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessConfig {
    pub check_interval_seconds: u64,
    pub heartbeat_timeout_seconds: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            check_interval_seconds: 60,
            heartbeat_timeout_seconds: 120,
        }
    }
}

impl ConfigValidator for LivenessConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_seconds(
            self.check_interval_seconds,
            "scheduler.liveness.check_interval_seconds",
        )?;
        ValidationUtils::validate_seconds(
            self.heartbeat_timeout_seconds,
            "scheduler.liveness.heartbeat_timeout_seconds",
        )?;
        if self.heartbeat_timeout_seconds <= self.check_interval_seconds {
            return Err(crate::ConfigError::Validation(
                "scheduler.liveness.heartbeat_timeout_seconds must exceed the check interval"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    pub sweep_interval_seconds: u64,
    pub retention_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            sweep_interval_seconds: 3600,
            retention_days: 7,
        }
    }
}

impl ConfigValidator for RetentionConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_seconds(
            self.sweep_interval_seconds,
            "scheduler.retention.sweep_interval_seconds",
        )?;
        ValidationUtils::validate_count(
            self.retention_days as usize,
            "scheduler.retention.retention_days",
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_config_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.due_scanner.scan_interval_seconds, 300);
        assert_eq!(config.due_scanner.max_jobs_per_sweep, 10);
        assert_eq!(config.reaper.job_timeout_seconds, 1800);
        assert_eq!(config.liveness.heartbeat_timeout_seconds, 120);
        assert_eq!(config.retention.retention_days, 7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_reaper_timeout_must_exceed_interval() {
        let mut config = ReaperConfig::default();
        config.job_timeout_seconds = config.sweep_interval_seconds;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_liveness_timeout_must_exceed_interval() {
        let mut config = LivenessConfig::default();
        config.heartbeat_timeout_seconds = 30;
        assert!(config.validate().is_err());
    }
}
