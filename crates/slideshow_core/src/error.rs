//! crates/slideshow_core/src/error.rs
//!
//! The closed set of failures a pipeline stage can report.

use crate::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum SlideshowError {
    /// Login returned no usable session token.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The NAS advertised no usable version for an operation.
    #[error("Invalid API version {version} for {api}")]
    InvalidApiVersion { api: String, version: i64 },

    /// The search start response carried no task id.
    #[error("Failed to initiate search: no task id returned")]
    FailedToInitiateSearch,

    /// The search job did not finish in time.
    #[error("Search timed out: {0}")]
    SearchTimedOut(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,
}

impl From<PortError> for SlideshowError {
    fn from(err: PortError) -> Self {
        SlideshowError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for SlideshowError {
    fn from(err: serde_json::Error) -> Self {
        SlideshowError::Transport(format!("invalid response body: {}", err))
    }
}

/// A convenience type alias for `Result<T, SlideshowError>`.
pub type SlideshowResult<T> = Result<T, SlideshowError>;
