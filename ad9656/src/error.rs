//! Common error types for the ad9656 driver.
//!
//! This module provides a centralized Error enum using thiserror, used by
//! transports and configuration loading. Chip-level failures live next to
//! the driver in [`crate::peripheral::ad9656::Ad9656Error`].

use thiserror::Error;

/// Main error type for transport and configuration failures.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors from tokio or std
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// SPI transport reported a failure on open, transfer or close
    #[error("SPI transport error: {0}")]
    Transport(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed configuration documents
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience type alias for Results using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
