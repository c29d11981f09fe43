//! Redis-backed [`SnapshotStore`].
//!
//! The connection is opened lazily on first use and cached. Any failed
//! command drops the cached connection so the next cycle reconnects instead
//! of reusing a broken socket.

use std::{future::Future, time::Duration};

use redis::{aio::MultiplexedConnection, streams::StreamMaxlen, AsyncCommands, Client};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::store::{SnapshotStore, StoreError, StreamTrim};
use crate::config::{store::StoreConfig, ConfigError};

pub struct RedisStore {
    client: Client,
    connection: Mutex<Option<MultiplexedConnection>>,
    timeout: Duration,
    endpoint: String,
}

impl RedisStore {
    /// Builds the client from `config`; no connection is opened yet.
    ///
    /// # Errors
    ///
    /// `ConfigError::Missing` when address or password is absent,
    /// `ConfigError::Config` when they do not form a valid Redis URL.
    pub fn from_config(config: &StoreConfig) -> Result<Self, ConfigError> {
        let address = config
            .address
            .as_deref()
            .filter(|a| !a.is_empty())
            .ok_or_else(|| ConfigError::Missing("store.address".into()))?;
        let password = config
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ConfigError::Missing("store.password".into()))?;

        let url = connection_url(address, &config.username, password, config.tls)?;
        let client = Client::open(url.as_str())
            .map_err(|e| ConfigError::Config(format!("invalid store address '{}': {}", address, e)))?;

        Ok(Self {
            client,
            connection: Mutex::new(None),
            timeout: config.command_timeout(),
            endpoint: address.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        let mut cached = self.connection.lock().await;
        if let Some(conn) = cached.as_ref() {
            return Ok(conn.clone());
        }

        debug!("Connecting to store at {}", self.endpoint);
        let conn = self
            .bounded(self.client.get_multiplexed_async_connection())
            .await?
            .map_err(StoreError::Connection)?;
        info!("Connected to store at {}", self.endpoint);

        *cached = Some(conn.clone());
        Ok(conn)
    }

    async fn bounded<F, T>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = T>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))
    }

    /// Runs one command, forgetting the connection if it fails.
    async fn run<T, F, Fut>(&self, command: F) -> Result<T, StoreError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: Future<Output = redis::RedisResult<T>>,
    {
        let conn = self.connection().await?;
        let outcome = match self.bounded(command(conn)).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => StoreError::Command(e),
            Err(timeout) => timeout,
        };

        self.connection.lock().await.take();
        Err(outcome)
    }
}

#[async_trait::async_trait]
impl SnapshotStore for RedisStore {
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.run(|mut conn| async move { conn.set::<_, _, ()>(key, value).await })
            .await
    }

    async fn append_trimmed(
        &self,
        stream: &str,
        field: &str,
        value: &str,
        trim: StreamTrim,
    ) -> Result<String, StoreError> {
        let maxlen = match trim {
            StreamTrim::Approximate(n) => StreamMaxlen::Approx(n),
            StreamTrim::Exact(n) => StreamMaxlen::Equals(n),
        };

        self.run(|mut conn| async move {
            conn.xadd_maxlen::<_, _, _, _, String>(stream, maxlen, "*", &[(field, value)])
                .await
        })
        .await
    }
}

/// `redis://` or `rediss://` URL with percent-encoded credentials.
fn connection_url(
    address: &str,
    username: &str,
    password: &str,
    tls: bool,
) -> Result<reqwest::Url, ConfigError> {
    let scheme = if tls { "rediss" } else { "redis" };
    let mut url = reqwest::Url::parse(&format!("{}://{}", scheme, address))
        .map_err(|e| ConfigError::Config(format!("invalid store address '{}': {}", address, e)))?;

    if url.host_str().map_or(true, str::is_empty) {
        return Err(ConfigError::Config(format!(
            "store address '{}' has no host",
            address
        )));
    }

    url.set_username(username)
        .and_then(|_| url.set_password(Some(password)))
        .map_err(|_| ConfigError::Config(format!("cannot attach credentials to '{}'", address)))?;

    Ok(url)
}
