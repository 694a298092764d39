//! Error types shared by the sync job and its collaborators.

use std::path::PathBuf;

use thiserror::Error;

use crate::model::MalformedRecord;

pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that end a sync pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The retry budget for one remote call ran out.
    #[error("remote catalog unavailable after {attempts} attempts ({url}): {last_error}")]
    RemoteUnavailable {
        url: String,
        attempts: u32,
        last_error: String,
    },

    #[error("invalid response body from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// Elements of a remote response that failed validation. Nothing from
    /// the pass is stored, so the same window is queried again next time.
    #[error("{} malformed products in remote response", .rejected.len())]
    Malformed { rejected: Vec<MalformedRecord> },

    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("cursor file {path} holds an unreadable timestamp: {value:?}")]
    InvalidCursor { path: PathBuf, value: String },

    #[error("cursor file {path}: {source}")]
    Cursor {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("database error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Outcome of a single failed HTTP attempt. Recovered inside the client.
#[derive(Debug, Error)]
pub enum FetchFailure {
    #[error("rate limited (429)")]
    RateLimited,

    #[error("unexpected status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl FetchFailure {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FetchFailure::RateLimited)
    }
}
