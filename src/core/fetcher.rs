//! Fetching the sensor tree from the hardware monitor, with per-cycle retries.

use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::{
    backoff::FixedBackoff,
    error::{FetchError, FetchResult},
    sensors::SensorTree,
};
use crate::config::monitor::MonitorConfig;

/// Anything that can produce one sensor tree snapshot per call.
#[async_trait::async_trait]
pub trait SensorSource: Send + Sync {
    /// Performs a single fetch attempt.
    async fn fetch(&self) -> FetchResult<SensorTree>;

    /// Short description used in log lines.
    fn describe(&self) -> String;
}

/// Fetches the tree with a plain HTTP GET.
#[derive(Debug, Clone)]
pub struct HttpSensorSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSensorSource {
    /// Builds a client with the given request timeout.
    ///
    /// # Errors
    ///
    /// Fails only if the TLS backend cannot be initialised.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn from_config(config: &MonitorConfig) -> Result<Self, reqwest::Error> {
        Self::new(config.url.clone(), config.request_timeout())
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl SensorSource for HttpSensorSource {
    async fn fetch(&self) -> FetchResult<SensorTree> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: self.url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|source| FetchError::Body {
            url: self.url.clone(),
            source,
        })?;

        debug!("Received {} bytes from {}", body.len(), self.url);
        Ok(serde_json::from_slice(&body)?)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Fetches a tree, retrying failed attempts with a fixed delay.
///
/// The first success ends the loop. After `backoff.max_attempts()` failures
/// the cycle is given up with `RetriesExhausted`; no delay follows the last
/// attempt. Cancellation is honoured during attempts and delays.
pub async fn fetch_with_retry(
    source: &dyn SensorSource,
    backoff: &mut FixedBackoff,
    cancel: &CancellationToken,
) -> FetchResult<SensorTree> {
    backoff.reset();
    let max_attempts = backoff.max_attempts();

    loop {
        let attempt = backoff.attempt();

        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            result = source.fetch() => result,
        };

        let err = match result {
            Ok(tree) => {
                if attempt > 1 {
                    debug!("Fetched sensor tree on attempt {}/{}", attempt, max_attempts);
                }
                return Ok(tree);
            }
            Err(err) => err,
        };

        warn!(
            "Fetching sensor tree from {} failed (attempt {}/{}): {}",
            source.describe(),
            attempt,
            max_attempts,
            error_chain(&err)
        );

        match backoff.next_sleep() {
            Ok(delay) => {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                    _ = sleep(delay) => {}
                }
            }
            Err(_) => {
                error!(
                    "Failed to fetch sensor tree after {} attempts, skipping this cycle",
                    max_attempts
                );
                return Err(FetchError::RetriesExhausted {
                    attempts: max_attempts,
                });
            }
        }
    }
}

/// Renders an error with its `source()` chain on one line.
pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
