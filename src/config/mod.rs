//! Application configuration loading, validation, and management.
//!
//! This module provides the top-level `Config` structure that aggregates the
//! logging, monitor, polling, store, publisher and metric-catalog settings.
//! It handles loading from TOML files, environment overrides and validation.
//!
//! The configuration is loaded early in the application lifecycle and is
//! intended to remain immutable thereafter.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use validator::Validate;

use self::{
    logger::LoggerConfig,
    metrics::MetricsConfig,
    monitor::{MonitorConfig, PollerConfig},
    store::{PublisherConfig, StoreConfig},
};

pub mod logger;
pub mod metrics;
pub mod monitor;
pub mod store;

/// Environment variable naming the TOML config file.
pub const CONFIG_ENV: &str = "HWPULSE_CONFIG";
/// Config file used when `HWPULSE_CONFIG` is not set.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/hwpulse/config.toml";

const MONITOR_URL_ENV: &str = "HARDWARE_MONITOR_URL";
const STORE_ADDR_ENV: &str = "UPSTASH_REDIS_ADDR";
const STORE_PASSWORD_ENV: &str = "UPSTASH_REDIS_PASSWORD";
const METRICS_ENV: &str = "HWPULSE_METRICS";

/// Timestamp prefix for the `print_*` macros.
#[doc(hidden)]
pub fn early_timestamp() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}

/// Simple macros for printing timestamped messages before the tracing subscriber
/// is initialized. These are used during early configuration loading.
#[macro_export]
macro_rules! print_info {
    ($($arg:tt)*) => {
        println!("{}  {} {}",
            console::style($crate::config::early_timestamp()).dim(),
            console::style("INFO").green(),
            format_args!($($arg)*)
        );
    };
}

#[macro_export]
macro_rules! print_warn {
    ($($arg:tt)*) => {
        println!("{}  {} {}",
            console::style($crate::config::early_timestamp()).dim(),
            console::style("WARN").yellow(),
            format_args!($($arg)*)
        );
    };
}

#[macro_export]
macro_rules! print_error {
    ($($arg:tt)*) => {
        eprintln!("{}  {} {}",
            console::style($crate::config::early_timestamp()).dim(),
            console::style("ERROR").red(),
            format_args!($($arg)*)
        );
    };
}

/// Errors that can occur during configuration loading, parsing, validation,
/// or serialization.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Generic configuration-related error with a descriptive message.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error while accessing configuration files.
    #[error("IO error while reading configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// Failure to parse a configuration document.
    #[error("Parse error while reading configuration: {0}")]
    ParseError(String),

    /// Validation failure after successful parsing.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A mandatory setting is absent from both the file and the environment.
    #[error("Missing required setting: {0}")]
    Missing(String),
}

/// Top-level application configuration.
#[derive(Serialize, Deserialize, Debug, Validate, Clone, Default)]
#[serde(default)]
pub struct Config {
    /// Logging subsystem configuration.
    #[validate(nested)]
    pub logger: LoggerConfig,

    /// Hardware-monitor endpoint.
    #[validate(nested)]
    pub monitor: MonitorConfig,

    /// Cycle cadence and retry budget.
    #[validate(nested)]
    pub poller: PollerConfig,

    /// Store connection.
    #[validate(nested)]
    pub store: StoreConfig,

    /// Persistence strategy.
    #[validate(nested)]
    pub publisher: PublisherConfig,

    /// Metric catalog location and payload options.
    #[validate(nested)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Builds the process configuration from the config file (if any) and the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if an explicitly named file cannot be read or
    /// parsed, validation fails, or the store address/password are missing.
    pub fn new() -> Result<Self, ConfigError> {
        let mut config = match Self::get_config_path()? {
            Some(path) => Self::load(&path)?,
            None => {
                print_warn!("No configuration file found, using built-in defaults");
                Config::default()
            }
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.finalize()?;
        Ok(config)
    }

    /// Determines the configuration file path.
    ///
    /// Priority:
    /// 1. `HWPULSE_CONFIG` environment variable
    /// 2. `/etc/hwpulse/config.toml`
    ///
    /// Returns `None` when neither is available.
    fn get_config_path() -> Result<Option<PathBuf>, ConfigError> {
        if let Ok(config_path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(config_path);
            print_info!("Using config from {}: {}", CONFIG_ENV, path.display());
            if !path.exists() {
                return Err(ConfigError::Config(format!(
                    "{} points to a missing file: {}",
                    CONFIG_ENV,
                    path.display()
                )));
            }
            return Ok(Some(path));
        }

        let fallback = Path::new(DEFAULT_CONFIG_PATH);
        if fallback.exists() {
            print_info!("Using default config path: {}", fallback.display());
            return Ok(Some(fallback.to_path_buf()));
        }

        Ok(None)
    }

    /// Loads configuration from the specified TOML file.
    ///
    /// Validation happens in [`Config::finalize`], after environment
    /// overrides have been applied.
    ///
    /// # Errors
    ///
    /// Propagates IO and parsing errors as `ConfigError`.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        print_info!("Loading configuration from: {}", path.display());

        let config_str = fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&config_str).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        print_info!("Successfully loaded config from: {}", path.display());
        Ok(config)
    }

    /// Overlays values taken from the environment.
    ///
    /// `lookup` returns the value of a variable; empty values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = lookup(MONITOR_URL_ENV) {
            self.monitor.url = url;
        }
        if let Some(address) = lookup(STORE_ADDR_ENV) {
            self.store.address = Some(address);
        }
        if let Some(password) = lookup(STORE_PASSWORD_ENV) {
            self.store.password = Some(password);
        }
        if let Some(definitions) = lookup(METRICS_ENV) {
            self.metrics.definitions = definitions;
        }
    }

    /// Validates every section and checks the mandatory store credentials.
    ///
    /// # Errors
    ///
    /// `ValidationError` for out-of-range values, `Missing` when the store
    /// address or password is absent.
    pub fn finalize(&self) -> Result<(), ConfigError> {
        self.validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        if self.store.address.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::Missing(format!(
                "store.address ({})",
                STORE_ADDR_ENV
            )));
        }
        if self.store.password.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::Missing(format!(
                "store.password ({})",
                STORE_PASSWORD_ENV
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, io::Write};

    use tempfile::NamedTempFile;

    use super::{
        store::{PublishMode, TrimMode},
        *,
    };

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_require_credentials() {
        let config = Config::default();
        let err = config.finalize().unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
        assert!(err.to_string().contains(STORE_ADDR_ENV));
    }

    #[test]
    fn test_missing_password_is_reported() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[(STORE_ADDR_ENV, "eu1.example.io:6379")]));
        let err = config.finalize().unwrap_err();
        assert!(err.to_string().contains(STORE_PASSWORD_ENV));
    }

    #[test]
    fn test_env_overrides_apply() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[
            (STORE_ADDR_ENV, "eu1.example.io:6379"),
            (STORE_PASSWORD_ENV, "secret"),
            (MONITOR_URL_ENV, "http://172.20.96.1:8085/data.json"),
            (METRICS_ENV, "/opt/hwpulse/metrics.json"),
        ]));

        assert!(config.finalize().is_ok());
        assert_eq!(config.store.address.as_deref(), Some("eu1.example.io:6379"));
        assert_eq!(config.store.password.as_deref(), Some("secret"));
        assert_eq!(config.monitor.url, "http://172.20.96.1:8085/data.json");
        assert_eq!(config.metrics.definitions, "/opt/hwpulse/metrics.json");
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[(MONITOR_URL_ENV, "  ")]));
        assert_eq!(config.monitor.url, monitor::DEFAULT_MONITOR_URL);
    }

    #[test]
    fn test_load_toml_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[logger]
level = "debug"

[monitor]
url = "http://10.0.0.5:8085/data.json"

[poller]
interval = 30
max_attempts = 3
retry_interval = 2

[store]
address = "localhost:6379"
password = "pw"
tls = false

[publisher]
mode = "latest"
key = "hw:last"

[metrics]
definitions = "catalog.json"
report_unresolved = true
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert!(config.finalize().is_ok());
        assert_eq!(config.logger.level, "debug");
        assert_eq!(config.poller.interval, 30);
        assert_eq!(config.poller.max_attempts, 3);
        assert!(!config.store.tls);
        assert_eq!(config.store.username, "default");
        assert_eq!(config.publisher.mode, PublishMode::Latest);
        assert_eq!(config.publisher.trim, TrimMode::Approximate);
        assert!(config.metrics.report_unresolved);
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[store]
address = "file:6379"
password = "pw"
"#
        )
        .unwrap();

        let mut config = Config::load(file.path()).unwrap();
        config.apply_env_overrides(env(&[(STORE_ADDR_ENV, "env:6379")]));
        assert_eq!(config.store.address.as_deref(), Some("env:6379"));
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[poller\ninterval = ").unwrap();
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_nested_validation_runs() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[
            (STORE_ADDR_ENV, "localhost:6379"),
            (STORE_PASSWORD_ENV, "pw"),
        ]));
        config.poller.max_attempts = 0;
        let err = config.finalize().unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Config::load(Path::new("/nonexistent/hwpulse.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
