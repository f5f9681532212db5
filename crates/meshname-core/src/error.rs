//! Error types for meshname

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// meshname error types
#[derive(Debug, Error)]
pub enum Error {
    /// Serialization/deserialization error
    #[error("codec error: {0}")]
    Codec(#[from] postcard::Error),

    /// Malformed peer name string
    #[error("invalid peer name: {0:?}")]
    InvalidPeerName(String),

    /// Malformed address string
    #[error("invalid address: {0:?}")]
    InvalidAddress(String),
}
