//! Error types for tpcreco-core.
//!
//! Only resource-level failures are errors. Empty events, unresolved
//! ancestry and attribution misses are absorbed by the engine with a
//! documented default and never show up here.

use thiserror::Error;

/// Result type alias for tpcreco operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for tpcreco operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The step source could not be opened or lacks its expected framing.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// The row sink could not be opened or written.
    #[error("sink unavailable: {0}")]
    SinkUnavailable(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}
