//! Error types for hc-core

use thiserror::Error;

/// Main error type for hc-core
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for hc-core
pub type Result<T> = std::result::Result<T, Error>;
