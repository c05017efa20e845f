//! I/O error types.

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Memory mapping error.
    #[error("memory mapping error: {0}")]
    MmapError(String),

    /// Invalid file format.
    #[error("invalid file format: {0}")]
    InvalidFormat(String),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] tpcreco_core::Error),

    /// HDF5 library error.
    #[cfg(feature = "hdf5")]
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),
}

impl Error {
    /// Converts a reader-side failure into the engine's error taxonomy.
    #[must_use]
    pub fn into_source(self) -> tpcreco_core::Error {
        match self {
            Self::CoreError(inner) => inner,
            other => tpcreco_core::Error::SourceUnavailable(other.to_string()),
        }
    }

    /// Converts a writer-side failure into the engine's error taxonomy.
    #[must_use]
    pub fn into_sink(self) -> tpcreco_core::Error {
        match self {
            Self::CoreError(inner) => inner,
            other => tpcreco_core::Error::SinkUnavailable(other.to_string()),
        }
    }
}
