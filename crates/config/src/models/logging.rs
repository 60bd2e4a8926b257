use crate::validation::ConfigValidator;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// "json" or "pretty"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl ConfigValidator for LoggingConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.level.as_str()) {
            return Err(crate::ConfigError::Validation(format!(
                "logging.level must be one of trace, debug, info, warn, error (got {})",
                self.level
            )));
        }
        if self.format != "json" && self.format != "pretty" {
            return Err(crate::ConfigError::Validation(format!(
                "logging.format must be json or pretty (got {})",
                self.format
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_validation() {
        assert!(LoggingConfig::default().validate().is_ok());

        let invalid = LoggingConfig {
            level: "verbose".to_string(),
            format: "pretty".to_string(),
        };
        assert!(invalid.validate().is_err());

        let invalid = LoggingConfig {
            level: "info".to_string(),
            format: "xml".to_string(),
        };
        assert!(invalid.validate().is_err());
    }
}
