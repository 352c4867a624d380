//! Codeweave Configuration Management
//!
//! Provides configuration loading with support for:
//! - Global config: `~/.codeweave/config.toml`
//! - Local config: `.codeweave/config.toml` (in workspace)
//! - CLI overrides via `ConfigOverrides`
//!
//! Configuration is merged in order: global → local → CLI overrides.

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for Codeweave.
///
/// Represents the fully merged configuration from all sources.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct WeaveConfig {
    /// Edit session limits
    pub session: SessionConfig,

    /// Analysis configuration
    pub analysis: AnalysisConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Limits applied to an edit session.
///
/// # Example TOML
///
/// ```toml
/// [session]
/// max_transactions = 500
/// max_seconds = 30
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum number of transactions queued during one session
    pub max_transactions: Option<usize>,

    /// Maximum wall-clock seconds a session may spend before commit stops
    pub max_seconds: Option<u64>,
}

impl SessionConfig {
    /// Time budget as a `Duration`, if one is configured.
    pub fn max_duration(&self) -> Option<Duration> {
        self.max_seconds.map(Duration::from_secs)
    }
}

/// Analysis configuration for code parsing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// File patterns to exclude (glob patterns)
    pub exclude_patterns: Vec<String>,

    /// Stop discovery after this many files (None = unlimited)
    pub max_files: Option<usize>,

    /// Restrict analysis to one language (`python`, `typescript`, ...)
    pub language: Option<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            exclude_patterns: vec![
                "**/node_modules/**".to_string(),
                "**/.git/**".to_string(),
                "**/__pycache__/**".to_string(),
                "**/.venv/**".to_string(),
                "**/dist/**".to_string(),
                "**/build/**".to_string(),
            ],
            max_files: None,
            language: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Known log level names accepted by `[logging] level`.
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// CLI overrides for configuration values.
///
/// Used to apply command-line arguments over file-based config.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override the transaction limit
    pub max_transactions: Option<usize>,

    /// Override the session time limit
    pub max_seconds: Option<u64>,

    /// Override the analyzed language
    pub language: Option<String>,

    /// Override log level
    pub log_level: Option<String>,
}

impl WeaveConfig {
    /// Apply CLI overrides to this configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(max) = overrides.max_transactions {
            self.session.max_transactions = Some(max);
        }

        if let Some(secs) = overrides.max_seconds {
            self.session.max_seconds = Some(secs);
        }

        if let Some(ref language) = overrides.language {
            self.analysis.language = Some(language.clone());
        }

        if let Some(ref level) = overrides.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::invalid_value(
                "logging.level",
                format!("unknown level '{}'", self.logging.level),
            ));
        }
        if self.analysis.max_files == Some(0) {
            return Err(ConfigError::invalid_value(
                "analysis.max_files",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WeaveConfig::default();
        assert_eq!(config.session.max_transactions, None);
        assert_eq!(config.session.max_seconds, None);
        assert_eq!(config.logging.level, "info");
        assert!(config
            .analysis
            .exclude_patterns
            .contains(&"**/node_modules/**".to_string()));
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = WeaveConfig::default();
        let overrides = ConfigOverrides {
            max_transactions: Some(10),
            language: Some("python".to_string()),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };

        config.apply_overrides(&overrides);

        assert_eq!(config.session.max_transactions, Some(10));
        assert_eq!(config.session.max_seconds, None);
        assert_eq!(config.analysis.language.as_deref(), Some("python"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_max_duration() {
        let session = SessionConfig {
            max_transactions: None,
            max_seconds: Some(5),
        };
        assert_eq!(session.max_duration(), Some(Duration::from_secs(5)));
        assert_eq!(SessionConfig::default().max_duration(), None);
    }

    #[test]
    fn test_validate_rejects_unknown_level() {
        let mut config = WeaveConfig::default();
        config.logging.level = "chatty".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("logging.level"));
    }

    #[test]
    fn test_validate_rejects_zero_max_files() {
        let mut config = WeaveConfig::default();
        config.analysis.max_files = Some(0);
        assert!(config.validate().is_err());
        config.analysis.max_files = Some(3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_session_toml_parse() {
        let config: WeaveConfig = toml::from_str(
            r#"
            [session]
            max_transactions = 0
            max_seconds = 12
            "#,
        )
        .unwrap();

        assert_eq!(config.session.max_transactions, Some(0));
        assert_eq!(config.session.max_seconds, Some(12));
        // Untouched sections fall back to defaults
        assert_eq!(config.logging.level, "info");
    }
}
