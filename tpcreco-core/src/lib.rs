//! tpcreco-core: Core types and traits for step-to-cluster reconstruction.
//!
//! This crate provides the data model shared by the reconstruction engine
//! and its collaborators: step records coming out of the transport engine,
//! finalized cluster rows, the run configuration, and the source/sink traits
//! the stream driver talks to.
//!

pub mod cluster;
pub mod config;
pub mod error;
pub mod source;
pub mod step;

pub use cluster::{AttributedSecondary, Attribution, ClusterRow, HitPoint};
pub use config::{
    AttributionTarget, Axis, ContainmentPolicy, EnergyUnit, GeometryConfig, ReconstructionConfig,
};
pub use error::{Error, Result};
pub use source::{EventSource, MemorySource, RowSink};
pub use step::{
    particle_name, CandidateSecondary, Interaction, ProcessHandle, StepEvent, StepRecord, Vec3,
};
