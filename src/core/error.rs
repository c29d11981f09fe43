use thiserror::Error;

/// Failure of one fetch attempt, or of a whole fetch cycle.
///
/// The first four variants are per-attempt and are retried uniformly; the last
/// two end the cycle.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The request could not be sent or no response arrived in time.
    #[error("HTTP request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The monitor answered with a non-success status.
    #[error("HTTP request to {url} returned status {status}")]
    Status { url: String, status: u16 },

    /// The response body could not be read.
    #[error("Failed to read response body from {url}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The body is not a sensor tree document.
    #[error("Failed to decode sensor tree: {0}")]
    Decode(#[from] serde_json::Error),

    /// Every attempt of the cycle failed.
    #[error("Failed to fetch sensor tree after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// Shutdown was requested while fetching.
    #[error("Fetch cancelled")]
    Cancelled,
}

/// Result of a single fetch attempt.
pub type FetchResult<T> = std::result::Result<T, FetchError>;
