//! Error types for the pkgsearch service.

use thiserror::Error;

/// Main error type for pkgsearch operations.
///
/// Exceeding a client's quota is not an error: the limiter reports it as a
/// denied decision.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rate limiter lifecycle errors
    #[error("Rate limit error: {0}")]
    RateLimit(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for pkgsearch operations.
pub type Result<T> = std::result::Result<T, Error>;
