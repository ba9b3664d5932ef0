//! Error types for a single scrape of the kubelet summary endpoint.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for scrape operations.
pub type ScrapeResult<T> = Result<T, ScrapeError>;

/// Failure category reported on the `type` label of the error counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    TokenRead,
    RequestConstruction,
    Transport,
    Status,
    BodyRead,
    Parse,
}

impl ErrorKind {
    /// Every category, in pipeline order.
    pub const ALL: [ErrorKind; 6] = [
        ErrorKind::TokenRead,
        ErrorKind::RequestConstruction,
        ErrorKind::Transport,
        ErrorKind::Status,
        ErrorKind::BodyRead,
        ErrorKind::Parse,
    ];

    /// Stable label value for this category.
    pub const fn label(self) -> &'static str {
        match self {
            ErrorKind::TokenRead => "token-read-error",
            ErrorKind::RequestConstruction => "request-construction-error",
            ErrorKind::Transport => "transport-error",
            ErrorKind::Status => "status-error",
            ErrorKind::BodyRead => "body-read-error",
            ErrorKind::Parse => "parse-error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors that can occur while fetching or decoding a summary.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("unable to load token from {path}: {source}")]
    TokenRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("token file {0} is empty")]
    EmptyToken(PathBuf),

    #[error("failed to build request: {0}")]
    Request(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("unexpected status: {0}")]
    Status(http::StatusCode),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("failed to parse summary: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ScrapeError {
    /// The category this error is counted under.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScrapeError::TokenRead { .. } | ScrapeError::EmptyToken(_) => ErrorKind::TokenRead,
            ScrapeError::Request(_) => ErrorKind::RequestConstruction,
            ScrapeError::Transport(_) | ScrapeError::Timeout(_) => ErrorKind::Transport,
            ScrapeError::Status(_) => ErrorKind::Status,
            ScrapeError::Body(_) => ErrorKind::BodyRead,
            ScrapeError::Parse(_) => ErrorKind::Parse,
        }
    }
}
