//! Redis connection settings and the choice of persistence mode.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// `[store]` section: how to reach the Redis-compatible store.
///
/// `address` and `password` are normally supplied through the
/// `UPSTASH_REDIS_ADDR` / `UPSTASH_REDIS_PASSWORD` environment variables.
#[derive(Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct StoreConfig {
    /// `host:port` of the store.
    pub address: Option<String>,

    #[validate(length(min = 1, message = "Store username must not be empty"))]
    pub username: String,

    pub password: Option<String>,

    /// Connect with TLS (`rediss://`).
    pub tls: bool,

    /// Upper bound for connecting plus one command, in seconds.
    #[validate(range(min = 1, message = "Command timeout must be at least 1 second"))]
    pub command_timeout: u64,
}

impl StoreConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout)
    }
}

// Keeps the password out of `debug!("{:#?}", cfg)` output.
impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("tls", &self.tls)
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            address: None,
            username: "default".to_string(),
            password: None,
            tls: true,
            command_timeout: 5,
        }
    }
}

/// Persistence strategy for published snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishMode {
    /// `SET key payload`: only the most recent snapshot is kept.
    Latest,
    /// `XADD key MAXLEN .. * field payload`: bounded history.
    Stream,
}

impl Default for PublishMode {
    fn default() -> Self {
        PublishMode::Stream
    }
}

impl std::fmt::Display for PublishMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishMode::Latest => write!(f, "latest"),
            PublishMode::Stream => write!(f, "stream"),
        }
    }
}

/// How strictly a stream is held to its maximum length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrimMode {
    /// `MAXLEN ~ n`: the store may keep a few extra entries.
    Approximate,
    /// `MAXLEN = n`: the cap holds after every write.
    Exact,
}

impl Default for TrimMode {
    fn default() -> Self {
        TrimMode::Approximate
    }
}

/// `[publisher]` section.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PublisherConfig {
    pub mode: PublishMode,

    /// Key (latest mode) or stream name (stream mode).
    #[validate(length(min = 1, message = "Publisher key must not be empty"))]
    pub key: String,

    /// Entry field holding the payload, stream mode only.
    #[validate(length(min = 1, message = "Stream field must not be empty"))]
    pub field: String,

    /// Stream length cap, stream mode only.
    #[validate(range(min = 1, message = "Stream max_len must be at least 1"))]
    pub max_len: usize,

    pub trim: TrimMode,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            mode: PublishMode::default(),
            key: "hardware:metrics".to_string(),
            field: "data".to_string(),
            max_len: 1000,
            trim: TrimMode::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_debug_hides_password() {
        let config = StoreConfig {
            password: Some("hunter2".into()),
            ..Default::default()
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn test_store_defaults() {
        let config = StoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.username, "default");
        assert!(config.tls);
        assert_eq!(config.command_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_publisher_defaults() {
        let config = PublisherConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.mode, PublishMode::Stream);
        assert_eq!(config.key, "hardware:metrics");
        assert_eq!(config.field, "data");
        assert_eq!(config.max_len, 1000);
        assert_eq!(config.trim, TrimMode::Approximate);
    }

    #[test]
    fn test_publisher_modes_from_toml() {
        let config: PublisherConfig =
            toml::from_str("mode = \"latest\"\nkey = \"hw:last\"\ntrim = \"exact\"").unwrap();
        assert_eq!(config.mode, PublishMode::Latest);
        assert_eq!(config.key, "hw:last");
        assert_eq!(config.trim, TrimMode::Exact);
        assert_eq!(config.max_len, 1000);
    }

    #[test]
    fn test_publisher_rejects_unknown_mode() {
        let result: Result<PublisherConfig, _> = toml::from_str("mode = \"queue\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_publisher_rejects_zero_max_len() {
        let config = PublisherConfig {
            max_len: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
