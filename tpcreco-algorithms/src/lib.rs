//! tpcreco-algorithms: Step-to-cluster reconstruction engine.
//!
//! This crate turns per-event step records into per-primary clusters:
//! - **Ancestry** - online trackID → (root, generation) resolution
//! - **Geometry** - containment of hits in the accepted gas volume
//! - **Attribution** - linking a flagged interaction to its product secondary
//! - **Builder** - grouping, ordering and per-cluster derived quantities
//! - **Driver** - event loop between a source and a sink
//!
#![warn(missing_docs)]

mod ancestry;
mod attribution;
mod builder;
mod driver;
mod geometry;

pub use ancestry::{AncestryEntry, AncestryTracker};
pub use attribution::SecondaryAttributor;
pub use builder::{ClusterBuilder, ClusterStatistics};
pub use driver::{run, run_streams, RunSummary, StreamDriver};
pub use geometry::ContainmentVolume;

// Re-export core configuration
pub use tpcreco_core::config::{
    AttributionTarget, ContainmentPolicy, GeometryConfig, ReconstructionConfig,
};
