use thiserror::Error;

use airlift_store::StoreError;

#[derive(Debug, Error)]
pub enum OtaError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to encode {what}: {message}")]
    Encode {
        what: &'static str,
        message: String,
    },

    #[error("failed to build update HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("update request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("update endpoint {url} answered HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("failed to parse update payload from {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("checksum validation failed")]
    ChecksumMismatch,

    #[error("no rollback data available")]
    NoRollbackData,
}

impl OtaError {
    pub fn encode(what: &'static str, source: &serde_json::Error) -> Self {
        Self::Encode {
            what,
            message: source.to_string(),
        }
    }

    /// Whether another attempt against the same endpoint can help.
    ///
    /// A definitive HTTP status is final for that endpoint; transport and
    /// payload-parse failures are worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Request { .. } | Self::Parse { .. })
    }
}
