use thiserror::Error;

use crate::advisor::AdvisorError;
use crate::upload::UploadError;

/// Errors returned by collage service operations.
#[derive(Error, Debug)]
pub enum CollageError {
    /// Client-side validation of the upload set failed. Raised before any
    /// network traffic.
    #[error(transparent)]
    Upload(#[from] UploadError),

    /// A grid-advisor apply action was refused.
    #[error(transparent)]
    Advisor(#[from] AdvisorError),

    /// The service rejected the request with HTTP 429. The message comes
    /// from the rate limiter's `error` body field.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// The service returned a non-success HTTP status. The message is the
    /// body's `detail` field when present, otherwise the raw body.
    #[error("Collage service returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The response was 2xx but missing expected fields.
    #[error("{0}")]
    InvalidResponse(String),

    /// The submitted configuration is malformed (e.g. bad color hex).
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The job has not reached `completed`, so its artifact cannot be
    /// fetched yet.
    #[error("Job {0} has not completed")]
    NotCompleted(String),

    /// No job is currently active in the session.
    #[error("No active job")]
    NoActiveJob,

    /// Network-level request failure with context.
    #[error("{context}: {source}")]
    Network {
        context: String,
        source: reqwest::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for CollageError {
    fn from(err: anyhow::Error) -> Self {
        CollageError::Other(err.to_string())
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, CollageError>;
