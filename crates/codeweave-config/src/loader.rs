//! Configuration loader with inheritance support.
//!
//! Loads configuration from multiple sources and merges them:
//! 1. Global config: `~/.codeweave/config.toml`
//! 2. Local config: `.codeweave/config.toml` (in workspace)
//! 3. CLI overrides
//!
//! Later sources override earlier ones.

use crate::error::ConfigError;
use crate::{AnalysisConfig, ConfigOverrides, LoggingConfig, SessionConfig, WeaveConfig};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

const CONFIG_FILE_NAME: &str = "config.toml";

/// Directory name used both under `$HOME` and in a workspace.
const CONFIG_DIR: &str = ".codeweave";

/// Configuration loader with caching and inheritance support.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Global config directory (e.g., `~/.codeweave`)
    global_config_dir: Option<PathBuf>,

    /// Cached global config
    global_config: Option<WeaveConfig>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader.
    ///
    /// Automatically detects the global config directory (`~/.codeweave`).
    pub fn new() -> Self {
        let global_config_dir = dirs::home_dir().map(|h| h.join(CONFIG_DIR));

        Self {
            global_config_dir,
            global_config: None,
        }
    }

    /// Create a loader with a custom global config directory.
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_config_dir: Some(global_dir.into()),
            global_config: None,
        }
    }

    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_config_dir
            .as_ref()
            .map(|d| d.join(CONFIG_FILE_NAME))
    }

    pub fn local_config_path(&self, workspace_root: &Path) -> PathBuf {
        workspace_root.join(CONFIG_DIR).join(CONFIG_FILE_NAME)
    }

    /// Load configuration for a workspace with optional CLI overrides.
    ///
    /// Merges config in order: global → local → overrides.
    pub fn load(
        &mut self,
        workspace_root: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<WeaveConfig, ConfigError> {
        let mut config = WeaveConfig::default();

        if let Some(global_config) = self.load_global()? {
            config = merge_configs(config, global_config);
        }

        if let Some(local_config) = self.load_local(workspace_root)? {
            config = merge_configs(config, local_config);
        }

        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load only the global configuration.
    pub fn load_global(&mut self) -> Result<Option<WeaveConfig>, ConfigError> {
        if let Some(ref config) = self.global_config {
            return Ok(Some(config.clone()));
        }

        let Some(global_path) = self.global_config_path() else {
            debug!("No home directory found, skipping global config");
            return Ok(None);
        };

        if !global_path.exists() {
            trace!("Global config not found at {:?}", global_path);
            return Ok(None);
        }

        debug!("Loading global config from {:?}", global_path);
        let config = load_config_file(&global_path)?;
        self.global_config = Some(config.clone());

        Ok(Some(config))
    }

    /// Load only the local configuration for a workspace.
    pub fn load_local(&self, workspace_root: &Path) -> Result<Option<WeaveConfig>, ConfigError> {
        let local_path = self.local_config_path(workspace_root);

        if !local_path.exists() {
            trace!("Local config not found at {:?}", local_path);
            return Ok(None);
        }

        debug!("Loading local config from {:?}", local_path);
        load_config_file(&local_path).map(Some)
    }
}

fn load_config_file(path: &Path) -> Result<WeaveConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read(path, e))?;

    toml::from_str(&content).map_err(|e| ConfigError::parse(path, e))
}

/// Merge two configurations, with `overlay` taking precedence.
fn merge_configs(base: WeaveConfig, overlay: WeaveConfig) -> WeaveConfig {
    WeaveConfig {
        session: merge_session(base.session, overlay.session),
        analysis: merge_analysis(base.analysis, overlay.analysis),
        logging: merge_logging(base.logging, overlay.logging),
    }
}

fn merge_session(base: SessionConfig, overlay: SessionConfig) -> SessionConfig {
    SessionConfig {
        max_transactions: overlay.max_transactions.or(base.max_transactions),
        max_seconds: overlay.max_seconds.or(base.max_seconds),
    }
}

/// Overlay exclude patterns extend the base set.
fn merge_analysis(base: AnalysisConfig, overlay: AnalysisConfig) -> AnalysisConfig {
    let mut patterns = base.exclude_patterns;
    for pattern in overlay.exclude_patterns {
        if !patterns.contains(&pattern) {
            patterns.push(pattern);
        }
    }

    AnalysisConfig {
        exclude_patterns: patterns,
        max_files: overlay.max_files.or(base.max_files),
        language: overlay.language.or(base.language),
    }
}

fn merge_logging(base: LoggingConfig, overlay: LoggingConfig) -> LoggingConfig {
    LoggingConfig {
        level: if overlay.level != "info" {
            overlay.level
        } else {
            base.level
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn create_local_config(content: &str, dir: &Path) -> PathBuf {
        let config_dir = dir.join(CONFIG_DIR);
        std::fs::create_dir_all(&config_dir).unwrap();
        let path = config_dir.join(CONFIG_FILE_NAME);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn create_global_config(content: &str, global_dir: &Path) {
        std::fs::create_dir_all(global_dir).unwrap();
        std::fs::write(global_dir.join(CONFIG_FILE_NAME), content).unwrap();
    }

    #[test]
    fn test_load_default_config() {
        let temp = TempDir::new().unwrap();
        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        let config = loader.load(temp.path(), None).unwrap();

        assert_eq!(config, WeaveConfig::default());
    }

    #[test]
    fn test_load_local_config() {
        let temp = TempDir::new().unwrap();
        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        create_local_config(
            r#"
            [session]
            max_transactions = 25

            [analysis]
            language = "typescript"
            "#,
            temp.path(),
        );

        let config = loader.load(temp.path(), None).unwrap();

        assert_eq!(config.session.max_transactions, Some(25));
        assert_eq!(config.analysis.language.as_deref(), Some("typescript"));
    }

    #[test]
    fn test_local_overrides_global() {
        let temp = TempDir::new().unwrap();
        let global_dir = temp.path().join("global");

        create_global_config(
            r#"
            [logging]
            level = "debug"

            [session]
            max_seconds = 60
            "#,
            &global_dir,
        );

        create_local_config(
            r#"
            [session]
            max_seconds = 5
            "#,
            temp.path(),
        );

        let mut loader = ConfigLoader::with_global_dir(&global_dir);
        let config = loader.load(temp.path(), None).unwrap();

        assert_eq!(config.session.max_seconds, Some(5));
        // Global value survives when local is silent
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_cli_overrides_all() {
        let temp = TempDir::new().unwrap();

        create_local_config(
            r#"
            [session]
            max_transactions = 25
            "#,
            temp.path(),
        );

        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));

        let overrides = ConfigOverrides {
            max_transactions: Some(3),
            log_level: Some("trace".to_string()),
            ..Default::default()
        };

        let config = loader.load(temp.path(), Some(&overrides)).unwrap();

        assert_eq!(config.session.max_transactions, Some(3));
        assert_eq!(config.logging.level, "trace");
    }

    #[test]
    fn test_invalid_local_config_is_reported() {
        let temp = TempDir::new().unwrap();
        create_local_config("[session\nmax_transactions = ", temp.path());

        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));
        let err = loader.load(temp.path(), None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_out_of_range_value_names_key() {
        let temp = TempDir::new().unwrap();
        create_local_config("[analysis]\nmax_files = 0\n", temp.path());

        let mut loader = ConfigLoader::with_global_dir(temp.path().join("global"));
        let err = loader.load(temp.path(), None).unwrap_err();
        assert_eq!(err.key(), Some("analysis.max_files"));
    }

    #[test]
    fn test_exclude_patterns_merge() {
        let base = AnalysisConfig {
            exclude_patterns: vec!["**/node_modules/**".to_string()],
            ..Default::default()
        };

        let overlay = AnalysisConfig {
            exclude_patterns: vec!["**/generated/**".to_string()],
            ..Default::default()
        };

        let merged = merge_analysis(base, overlay);

        assert!(merged
            .exclude_patterns
            .contains(&"**/node_modules/**".to_string()));
        assert!(merged
            .exclude_patterns
            .contains(&"**/generated/**".to_string()));
    }
}
