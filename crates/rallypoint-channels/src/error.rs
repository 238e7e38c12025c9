//! Error types for rallypoint-channels

use thiserror::Error;

/// Channel error type
#[derive(Debug, Error)]
pub enum Error {
    /// The session already holds a live connection
    #[error("already connected")]
    AlreadyConnected,

    /// Endpoint URL could not be parsed
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    /// HTTP request against the legacy chat backend failed
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Core-level failure (protocol, registry)
    #[error(transparent)]
    Core(#[from] rallypoint_core::Error),

    /// Channel plumbing failure
    #[error("channel error: {0}")]
    Channel(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
