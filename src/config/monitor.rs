//! Hardware-monitor endpoint and polling cadence.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Default endpoint of the monitor's JSON export.
pub const DEFAULT_MONITOR_URL: &str = "http://localhost:8085/data.json";

/// `[monitor]` section: where the sensor tree is fetched from.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MonitorConfig {
    /// URL answering a plain GET with the sensor tree document.
    #[validate(custom(function = "validate_http_url"))]
    pub url: String,

    /// Client-side timeout for one request, in seconds.
    #[validate(range(min = 1, message = "Request timeout must be at least 1 second"))]
    pub request_timeout: u64,
}

fn validate_http_url(url: &str) -> Result<(), ValidationError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        return Ok(());
    }
    let mut err = ValidationError::new("invalid_monitor_url");
    err.message = Some(format!("Monitor URL must be http(s): {}", url).into());
    Err(err)
}

impl MonitorConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_MONITOR_URL.to_string(),
            request_timeout: 5,
        }
    }
}

/// `[poller]` section: cycle cadence and the per-cycle retry budget.
///
/// With the defaults a dead endpoint costs at most `4 * 12s` of retry sleeps
/// plus request timeouts per cycle, followed by the regular 10s pause.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PollerConfig {
    /// Pause between the end of one cycle and the start of the next, in seconds.
    #[validate(range(min = 1, message = "Poll interval must be at least 1 second"))]
    pub interval: u64,

    /// Fetch attempts per cycle before the cycle is abandoned.
    #[validate(range(min = 1, message = "At least one fetch attempt is required"))]
    pub max_attempts: u32,

    /// Fixed delay between failed attempts, in seconds.
    pub retry_interval: u64,
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval)
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: 10,
            max_attempts: 5,
            retry_interval: 12,
        }
    }
}
