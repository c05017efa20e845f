//! tpcreco-io: File-backed sources and sinks for tpcreco.
//!
//! This crate provides the step table reader (memory-mapped JSON Lines via
//! memmap2), CSV / JSON Lines / HDF5 row sinks, and loading of the JSON
//! configuration file.
//!

pub mod config;
mod error;
#[cfg(feature = "hdf5")]
pub mod hdf5;
mod reader;
mod writer;

pub use config::{from_json, load_config};
pub use error::{Error, Result};
#[cfg(feature = "hdf5")]
pub use hdf5::{Hdf5RowSink, RowWriteOptions};
pub use reader::{MappedFileReader, StepFileReader, STEP_TABLE_NAME, STEP_TABLE_VERSION};
pub use writer::{create_sink, CsvRowSink, JsonLinesRowSink, OutputFormat};
