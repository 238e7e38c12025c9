//! Error types for rallypoint-core

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Inbound payload could not be parsed as a known frame
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A group with the same id already exists in the registry
    #[error("duplicate group id: {0}")]
    DuplicateGroup(String),

    /// Group id is not present in the registry
    #[error("unknown group: {0}")]
    UnknownGroup(String),

    /// Transport-level failure reported through the sink seam
    #[error("transport error: {0}")]
    Transport(String),

    /// Internal error (serialization, channel plumbing)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
