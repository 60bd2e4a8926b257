use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    database::DatabaseConfig, logging::LoggingConfig, scheduler::SchedulerConfig,
};
use crate::validation::ConfigValidator;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            scheduler: SchedulerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration in layers: TOML file (explicit path, or the first
    /// well-known location found), then HARVESTER_* environment overrides.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("config file not found: {}", path));
            }
        } else {
            let default_paths = [
                "config/harvester.toml",
                "harvester.toml",
                "/etc/harvester/config.toml",
            ];

            let mut config_file_found = false;
            for path in &default_paths {
                if Path::new(path).exists() {
                    builder = builder.add_source(File::new(path, FileFormat::Toml));
                    config_file_found = true;
                    break;
                }
            }

            if !config_file_found {
                builder = builder
                    .set_default("database.url", "postgresql://localhost/harvester")?
                    .set_default("database.max_connections", 10)?
                    .set_default("database.min_connections", 1)?
                    .set_default("database.connection_timeout_seconds", 30)?
                    .set_default("database.idle_timeout_seconds", 600)?
                    .set_default("scheduler.due_scanner.scan_interval_seconds", 300)?
                    .set_default("scheduler.due_scanner.max_jobs_per_sweep", 10)?
                    .set_default("scheduler.due_scanner.job_max_retries", 3)?
                    .set_default("scheduler.reaper.sweep_interval_seconds", 600)?
                    .set_default("scheduler.reaper.job_timeout_seconds", 1800)?
                    .set_default("scheduler.liveness.check_interval_seconds", 60)?
                    .set_default("scheduler.liveness.heartbeat_timeout_seconds", 120)?
                    .set_default("scheduler.retention.sweep_interval_seconds", 3600)?
                    .set_default("scheduler.retention.retention_days", 7)?
                    .set_default("logging.level", "info")?
                    .set_default("logging.format", "pretty")?;
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("HARVESTER")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("failed to assemble configuration")?
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("failed to parse TOML config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize config to TOML")
    }
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        self.database.validate()?;
        self.scheduler.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.scheduler.due_scanner.scan_interval_seconds, 300);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_app_config_from_toml() {
        let toml_str = r#"
[database]
url = "postgresql://localhost/harvester_test"
max_connections = 20
min_connections = 2
connection_timeout_seconds = 15
idle_timeout_seconds = 300

[scheduler.due_scanner]
scan_interval_seconds = 60
max_jobs_per_sweep = 5
job_max_retries = 2

[scheduler.reaper]
sweep_interval_seconds = 120
job_timeout_seconds = 900

[scheduler.liveness]
check_interval_seconds = 30
heartbeat_timeout_seconds = 90

[scheduler.retention]
sweep_interval_seconds = 1800
retention_days = 14

[logging]
level = "debug"
format = "json"
"#;

        let config = AppConfig::from_toml(toml_str).expect("Failed to parse TOML");
        assert_eq!(config.database.max_connections, 20);
        assert_eq!(config.scheduler.due_scanner.max_jobs_per_sweep, 5);
        assert_eq!(config.scheduler.retention.retention_days, 14);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_app_config_toml_roundtrip() {
        let config = AppConfig::default();
        let toml_str = config.to_toml().expect("Failed to serialize");
        let parsed = AppConfig::from_toml(&toml_str).expect("Failed to parse");
        assert_eq!(
            config.scheduler.reaper.job_timeout_seconds,
            parsed.scheduler.reaper.job_timeout_seconds
        );
    }

    #[test]
    fn test_app_config_rejects_invalid_section() {
        let toml_str = r#"
[database]
url = "postgresql://localhost/harvester"
max_connections = 10
min_connections = 1
connection_timeout_seconds = 30
idle_timeout_seconds = 600

[scheduler.due_scanner]
scan_interval_seconds = 0
max_jobs_per_sweep = 10
job_max_retries = 3

[scheduler.reaper]
sweep_interval_seconds = 600
job_timeout_seconds = 1800

[scheduler.liveness]
check_interval_seconds = 60
heartbeat_timeout_seconds = 120

[scheduler.retention]
sweep_interval_seconds = 3600
retention_days = 7

[logging]
level = "info"
format = "pretty"
"#;
        assert!(AppConfig::from_toml(toml_str).is_err());
    }
}
