//! Step records produced by the particle-transport engine.
//!
//! A step is one simulated sub-step of a particle track inside the gas
//! volume. Steps arrive grouped by event, in arrival order, which is not
//! guaranteed to be time order.

use std::borrow::Cow;
use std::f64::consts::TAU;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Opaque identity of a physics process instance inside the transport engine.
///
/// Two handles compare equal only if they refer to the very same process
/// object, which is what ties a secondary to the interaction that made it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct ProcessHandle(pub u64);

/// Three-vector in the lab frame.
///
/// Used for positions (mm) and momenta (MeV/c). Serialized as `[x, y, z]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(from = "[f64; 3]", into = "[f64; 3]")
)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Creates a new vector.
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean norm.
    #[inline]
    #[must_use]
    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Euclidean distance to another point.
    #[inline]
    #[must_use]
    pub fn distance(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Polar angle `acos(z / |v|)` in `[0, π]`; zero for the null vector.
    #[must_use]
    pub fn polar_angle(&self) -> f64 {
        let norm = self.norm();
        if norm > 0.0 {
            (self.z / norm).clamp(-1.0, 1.0).acos()
        } else {
            0.0
        }
    }

    /// Azimuthal angle `atan2(y, x)` normalized to `[0, 2π)`; zero for the null vector.
    #[must_use]
    pub fn azimuthal_angle(&self) -> f64 {
        if self.norm() > 0.0 {
            normalize_angle(self.y.atan2(self.x))
        } else {
            0.0
        }
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<Vec3> for [f64; 3] {
    fn from(v: Vec3) -> Self {
        [v.x, v.y, v.z]
    }
}

/// Maps an `atan2` result from `(-π, π]` onto `[0, 2π)`.
#[inline]
#[must_use]
pub fn normalize_angle(angle: f64) -> f64 {
    let wrapped = if angle < 0.0 { angle + TAU } else { angle };
    // -0.0 and tiny negatives can round up to exactly 2π.
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// A secondary particle produced during a step, offered for attribution.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct CandidateSecondary {
    #[cfg_attr(feature = "serde", serde(rename = "trackID"))]
    pub track_id: i32,
    pub pdg: i32,
    /// Momentum (MeV/c).
    pub momentum: Vec3,
    /// Kinetic energy (MeV).
    pub kinetic_energy: f64,
    /// Process that created this secondary, if the engine reported one.
    #[cfg_attr(feature = "serde", serde(default))]
    pub creator_process: Option<ProcessHandle>,
}

impl CandidateSecondary {
    /// Creates a candidate with no creator process.
    #[must_use]
    pub fn new(track_id: i32, pdg: i32, momentum: Vec3, kinetic_energy: f64) -> Self {
        Self {
            track_id,
            pdg,
            momentum,
            kinetic_energy,
            creator_process: None,
        }
    }

    /// Sets the creator process handle.
    #[must_use]
    pub fn with_creator(mut self, process: ProcessHandle) -> Self {
        self.creator_process = Some(process);
        self
    }
}

/// Interaction marker attached to a step whose post-step point was defined
/// by a discrete physics process.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Interaction {
    /// Handle of the process that limited this step.
    #[cfg_attr(feature = "serde", serde(default))]
    pub process: Option<ProcessHandle>,
    /// Secondaries produced in this step, in engine order.
    #[cfg_attr(feature = "serde", serde(default))]
    pub secondaries: Vec<CandidateSecondary>,
}

/// One step record as produced by the transport engine.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct StepRecord {
    /// Owning event; file sources fill it in from the event framing.
    #[cfg_attr(feature = "serde", serde(rename = "eventID", default))]
    pub event_id: i32,
    #[cfg_attr(feature = "serde", serde(rename = "trackID"))]
    pub track_id: i32,
    /// Parent track; 0 for primaries.
    #[cfg_attr(feature = "serde", serde(rename = "parentID"))]
    pub parent_id: i32,
    pub pdg: i32,
    /// Pre-step position (mm).
    pub position: Vec3,
    /// Global time (ns).
    #[cfg_attr(feature = "serde", serde(rename = "t"))]
    pub time: f64,
    /// Pre-step momentum (MeV/c).
    pub momentum: Vec3,
    /// Energy deposited in this step (MeV).
    #[cfg_attr(feature = "serde", serde(rename = "edep"))]
    pub energy_deposit: f64,
    /// Step length (mm).
    #[cfg_attr(feature = "serde", serde(rename = "stepLen"))]
    pub step_length: f64,
    /// Process that created this track; `None` for primaries.
    #[cfg_attr(feature = "serde", serde(default))]
    pub creator_process: Option<ProcessHandle>,
    /// Type of the process that created this track (-1 for primaries).
    #[cfg_attr(feature = "serde", serde(default = "no_process"))]
    pub creator_type: i32,
    /// Subtype of the process that created this track (-1 for primaries).
    #[cfg_attr(feature = "serde", serde(default = "no_process"))]
    pub creator_sub_type: i32,
    /// Type of the process that limited this step (-1 if none).
    #[cfg_attr(feature = "serde", serde(rename = "stepType", default = "no_process"))]
    pub step_process_type: i32,
    /// Subtype of the process that limited this step (-1 if none).
    #[cfg_attr(feature = "serde", serde(rename = "stepSubType", default = "no_process"))]
    pub step_process_sub_type: i32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub interaction: Option<Interaction>,
}

#[cfg(feature = "serde")]
fn no_process() -> i32 {
    -1
}

impl StepRecord {
    /// Creates a step at the origin with zero deposit and no process information.
    #[must_use]
    pub fn new(event_id: i32, track_id: i32, parent_id: i32, pdg: i32) -> Self {
        Self {
            event_id,
            track_id,
            parent_id,
            pdg,
            position: Vec3::default(),
            time: 0.0,
            momentum: Vec3::default(),
            energy_deposit: 0.0,
            step_length: 0.0,
            creator_process: None,
            creator_type: -1,
            creator_sub_type: -1,
            step_process_type: -1,
            step_process_sub_type: -1,
            interaction: None,
        }
    }

    /// Sets the pre-step position (mm).
    #[must_use]
    pub fn with_position(mut self, x: f64, y: f64, z: f64) -> Self {
        self.position = Vec3::new(x, y, z);
        self
    }

    /// Sets the global time (ns).
    #[must_use]
    pub fn with_time(mut self, time: f64) -> Self {
        self.time = time;
        self
    }

    /// Sets the pre-step momentum (MeV/c).
    #[must_use]
    pub fn with_momentum(mut self, px: f64, py: f64, pz: f64) -> Self {
        self.momentum = Vec3::new(px, py, pz);
        self
    }

    /// Sets the energy deposit (MeV).
    #[must_use]
    pub fn with_energy_deposit(mut self, edep: f64) -> Self {
        self.energy_deposit = edep;
        self
    }

    /// Sets the step length (mm).
    #[must_use]
    pub fn with_step_length(mut self, length: f64) -> Self {
        self.step_length = length;
        self
    }

    /// Sets the type/subtype of the process that limited this step.
    #[must_use]
    pub fn with_step_process(mut self, process_type: i32, process_sub_type: i32) -> Self {
        self.step_process_type = process_type;
        self.step_process_sub_type = process_sub_type;
        self
    }

    /// Sets the type/subtype of the process that created this track.
    #[must_use]
    pub fn with_creator_process(mut self, creator_type: i32, creator_sub_type: i32) -> Self {
        self.creator_type = creator_type;
        self.creator_sub_type = creator_sub_type;
        self
    }

    /// Attaches an interaction marker.
    #[must_use]
    pub fn with_interaction(mut self, interaction: Interaction) -> Self {
        self.interaction = Some(interaction);
        self
    }
}

/// All steps of one event, in arrival order.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StepEvent {
    #[cfg_attr(feature = "serde", serde(rename = "eventID"))]
    pub event_id: i32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub steps: Vec<StepRecord>,
}

impl StepEvent {
    /// Creates an event from its steps.
    #[must_use]
    pub fn new(event_id: i32, steps: Vec<StepRecord>) -> Self {
        Self { event_id, steps }
    }

    /// Returns true if the event carries no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Display name for a PDG code, falling back to the number itself.
#[must_use]
pub fn particle_name(pdg: i32) -> Cow<'static, str> {
    match pdg {
        11 => Cow::Borrowed("e-"),
        -11 => Cow::Borrowed("e+"),
        22 => Cow::Borrowed("gamma"),
        2212 => Cow::Borrowed("proton"),
        2112 => Cow::Borrowed("neutron"),
        1_000_020_040 => Cow::Borrowed("alpha"),
        other => Cow::Owned(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_vec3_distance() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(3.0, 4.0, 0.0);
        assert_relative_eq!(a.distance(&b), 5.0);
    }

    #[test]
    fn test_angles_of_null_vector_are_zero() {
        let v = Vec3::default();
        assert_eq!(v.polar_angle(), 0.0);
        assert_eq!(v.azimuthal_angle(), 0.0);
    }

    #[test]
    fn test_azimuth_is_normalized() {
        assert_relative_eq!(Vec3::new(0.0, -1.0, 0.0).azimuthal_angle(), 1.5 * PI);
        assert_relative_eq!(Vec3::new(0.0, 1.0, 0.0).azimuthal_angle(), FRAC_PI_2);
        assert_eq!(Vec3::new(1.0, -0.0, 0.0).azimuthal_angle(), 0.0);
    }

    #[test]
    fn test_polar_angle() {
        assert_relative_eq!(Vec3::new(0.0, 0.0, 2.0).polar_angle(), 0.0);
        assert_relative_eq!(Vec3::new(0.0, 0.0, -2.0).polar_angle(), PI);
        assert_relative_eq!(Vec3::new(1.0, 0.0, 0.0).polar_angle(), FRAC_PI_2);
    }

    #[test]
    fn test_particle_names() {
        assert_eq!(particle_name(11), "e-");
        assert_eq!(particle_name(22), "gamma");
        assert_eq!(particle_name(13), "13");
    }

    #[test]
    fn test_step_builder() {
        let step = StepRecord::new(4, 2, 1, 11)
            .with_position(1.0, 2.0, 3.0)
            .with_time(0.5)
            .with_energy_deposit(0.01)
            .with_step_process(2, 12);
        assert_eq!(step.event_id, 4);
        assert_eq!(step.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(step.step_process_sub_type, 12);
        assert!(step.interaction.is_none());
    }
}
