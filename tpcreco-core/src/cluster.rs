//! Finalized cluster rows.

use crate::step::Vec3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One member hit of a cluster, in time order.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct HitPoint {
    #[cfg_attr(feature = "serde", serde(rename = "trackID"))]
    pub track_id: i32,
    pub pdg: i32,
    /// Position (mm).
    pub position: Vec3,
    /// Global time (ns).
    pub time: f64,
    /// Momentum (MeV/c).
    pub momentum: Vec3,
    /// Energy deposit, in the configured output unit.
    pub energy_deposit: f64,
    /// Step length (mm).
    pub step_length: f64,
}

/// The secondary linked to a flagged interaction step.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct AttributedSecondary {
    #[cfg_attr(feature = "serde", serde(rename = "trackID"))]
    pub track_id: i32,
    /// Momentum (MeV/c).
    pub momentum: Vec3,
    /// Kinetic energy, in the configured output unit.
    pub kinetic_energy: f64,
    /// `acos(pz / |p|)` in the lab frame.
    pub polar_angle: f64,
    /// `atan2(py, px)` in `[0, 2π)`, lab frame.
    pub azimuthal_angle: f64,
}

/// Result of attributing a flagged step to one of its secondaries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attribution {
    pub secondary: AttributedSecondary,
    /// Whether the pick came from a creator-process identity match rather
    /// than the highest-energy fallback.
    pub matched_process: bool,
    /// Number of candidates of the product species, before tie resolution.
    pub candidate_count: usize,
}

/// Flattened snapshot of one finalized cluster.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ClusterRow {
    #[cfg_attr(feature = "serde", serde(rename = "eventID"))]
    pub event_id: i32,
    #[cfg_attr(feature = "serde", serde(rename = "rootID"))]
    pub root_id: i32,
    pub hit_count: usize,
    /// Sum of member deposits, in the configured output unit.
    pub total_energy_deposit: f64,
    /// Sum of distances between consecutive time-ordered hits (mm).
    pub path_length: f64,
    /// Sum of transport-reported step lengths (mm).
    pub step_length_sum: f64,
    /// Estimated number of ionisation electrons.
    pub ion_pairs: f64,
    /// Most frequent PDG code among member steps.
    pub particle_label: i32,
    pub particle_name: String,
    /// Deepest ancestry generation among member steps.
    pub max_generation: u32,
    /// Creator process type of the earliest hit's track (-1 for primaries).
    pub creator_type: i32,
    /// Creator process subtype of the earliest hit's track (-1 for primaries).
    pub creator_sub_type: i32,
    /// Whether every hit lies inside the accepted volume.
    pub contained: bool,
    pub start_position: Vec3,
    pub start_momentum: Vec3,
    pub start_azimuth: f64,
    pub start_inclination: f64,
    /// Whether a secondary was attributed; mirrors `secondary.is_some()`.
    pub attributed: bool,
    pub secondary: Option<AttributedSecondary>,
    pub candidate_secondary_count: usize,
    pub hits: Vec<HitPoint>,
}
