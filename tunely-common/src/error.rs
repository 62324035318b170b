//! Common error types for Tunely

use thiserror::Error;

/// Common result type for Tunely operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across Tunely services
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),
}
