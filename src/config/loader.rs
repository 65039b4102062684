//! Configuration Loader
//!
//! Environment-aware configuration loading. Sources are layered, later
//! sources overriding earlier ones:
//!
//! 1. Built-in defaults (`DashboardConfig::default()`)
//! 2. `<config_dir>/dashboard.toml` (optional)
//! 3. `<config_dir>/dashboard-<environment>.toml` (optional)
//! 4. Environment variables such as `DASHBOARD__POLLING__INTERVAL_MS=500`

use config::{Config, Environment, File};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::DashboardConfig;
use crate::error::{DashboardError, DashboardResult};

const ENV_PREFIX: &str = "DASHBOARD";
const ENV_SEPARATOR: &str = "__";

/// Loaded configuration together with the context it was loaded from
#[derive(Debug)]
pub struct ConfigManager {
    config: DashboardConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> DashboardResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> DashboardResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    ///
    /// Useful for tests that must not touch global environment variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> DashboardResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            environment = %environment,
            directory = %config_directory.display(),
            "Loading dashboard configuration"
        );

        let config = Self::build(&config_directory, environment)?;
        config.validate()?;

        info!(
            environment = %environment,
            collaboration_id = config.routing.collaboration_id,
            variables = config.variables.len(),
            regions = config.regions.len(),
            poll_interval_ms = config.polling.interval_ms,
            poll_timeout_seconds = config.polling.timeout_seconds,
            persistence_enabled = config.persistence.enabled,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    fn build(config_directory: &Path, environment: &str) -> DashboardResult<DashboardConfig> {
        let defaults = Config::try_from(&DashboardConfig::default())
            .map_err(|e| load_error("defaults", e))?;

        let base_file = config_directory.join("dashboard.toml");
        let environment_file = config_directory.join(format!("dashboard-{environment}.toml"));

        Config::builder()
            .add_source(defaults)
            .add_source(File::from(base_file).required(false))
            .add_source(File::from(environment_file).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| load_error("sources", e))?
            .try_deserialize::<DashboardConfig>()
            .map_err(|e| load_error("deserialization", e))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Wrap an already-built configuration, validating it first
    pub fn from_config(config: DashboardConfig, environment: &str) -> DashboardResult<Arc<Self>> {
        config.validate()?;
        Ok(Arc::new(Self {
            config,
            environment: environment.to_string(),
            config_directory: Self::default_config_directory(),
        }))
    }

    fn detect_environment() -> String {
        crate::logging::get_environment()
    }

    fn default_config_directory() -> PathBuf {
        env::var("DASHBOARD_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }
}

fn load_error(stage: &str, error: config::ConfigError) -> DashboardError {
    DashboardError::Configuration(format!("Failed to load configuration ({stage}): {error}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_directory_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let manager =
            ConfigManager::load_from_directory_with_env(Some(dir.path().join("absent")), "test")
                .unwrap();

        assert_eq!(manager.environment(), "test");
        assert_eq!(manager.config().polling.interval_ms, 3_000);
        assert_eq!(manager.config().variables.len(), 9);
    }

    #[test]
    fn test_environment_file_overrides_base_file() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("dashboard.toml"),
            "[polling]\ninterval_ms = 1000\ntimeout_seconds = 60\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("dashboard-test.toml"),
            "[polling]\ninterval_ms = 250\n",
        )
        .unwrap();

        let manager =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
                .unwrap();
        let polling = &manager.config().polling;

        assert_eq!(polling.interval_ms, 250);
        assert_eq!(polling.timeout_seconds, 60);
        assert_eq!(polling.max_interval_ms, 30_000);
    }

    #[test]
    fn test_file_can_replace_filter_table() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("dashboard.toml"),
            r#"
[[variables]]
id = "Gender"
label = "Gender"
categories = ["C16576", "C20197"]
"#,
        )
        .unwrap();

        let manager =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
                .unwrap();
        let table = manager.config().filter_table();

        assert_eq!(table.len(), 1);
        assert!(table.contains("Gender"));
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("dashboard.toml"),
            "[polling]\nbackoff_multiplier = 0.25\n",
        )
        .unwrap();

        let result =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test");
        assert!(matches!(result, Err(DashboardError::Configuration(_))));
    }
}
