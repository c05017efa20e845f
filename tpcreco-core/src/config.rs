//! Reconstruction configuration.
#![allow(clippy::doc_markdown)]

use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Acceptance policy applied to every hit of a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ContainmentPolicy {
    /// Point must lie within `radius - margin` of the cylinder axis.
    RadialCylinder,
    /// Point must lie within the radial cut, or inside the angular wedge
    /// around the negative transverse direction.
    #[default]
    CylinderWithWedge,
}

/// Cylinder axis in detector coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Axis {
    X,
    #[default]
    Y,
    Z,
}

/// Output unit for energy columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EnergyUnit {
    #[default]
    MeV,
    #[cfg_attr(feature = "serde", serde(rename = "keV"))]
    KeV,
}

impl EnergyUnit {
    /// Converts a value in MeV to this unit.
    #[inline]
    #[must_use]
    pub fn from_mev(self, value: f64) -> f64 {
        match self {
            Self::MeV => value,
            Self::KeV => value * 1000.0,
        }
    }

    /// Unit label used in output headers.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::MeV => "MeV",
            Self::KeV => "keV",
        }
    }
}

/// Gas-volume acceptance geometry.
///
/// The defaults describe the gas cylinder behind the source collimator:
/// a 36.9 mm radius cylinder along Y, centred 51.4 mm downstream in Z
/// (2.5 mm source half-thickness, 2 mm collimator, 10 mm gap, one radius),
/// with a 5 mm fiducial margin and a ±30° wedge facing the source.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeometryConfig {
    pub policy: ContainmentPolicy,
    pub axis: Axis,
    /// Cylinder radius (mm).
    pub radius: f64,
    /// Fiducial margin subtracted from the radius (mm).
    pub margin: f64,
    /// Offset of the axis along the second transverse coordinate (mm).
    pub axis_center_offset: f64,
    /// Half opening of the accepted wedge (degrees).
    pub wedge_half_angle_deg: f64,
    /// Optional half length along the axis (mm); the margin applies here too.
    pub axial_half_length: Option<f64>,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            policy: ContainmentPolicy::default(),
            axis: Axis::default(),
            radius: 36.9,
            margin: 5.0,
            axis_center_offset: 51.4,
            wedge_half_angle_deg: 30.0,
            axial_half_length: None,
        }
    }
}

impl GeometryConfig {
    /// Sets the containment policy.
    #[must_use]
    pub fn with_policy(mut self, policy: ContainmentPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the cylinder axis.
    #[must_use]
    pub fn with_axis(mut self, axis: Axis) -> Self {
        self.axis = axis;
        self
    }

    /// Sets the radius and margin.
    #[must_use]
    pub fn with_radius(mut self, radius: f64, margin: f64) -> Self {
        self.radius = radius;
        self.margin = margin;
        self
    }

    /// Sets the axis center offset.
    #[must_use]
    pub fn with_axis_center_offset(mut self, offset: f64) -> Self {
        self.axis_center_offset = offset;
        self
    }

    /// Sets the wedge half angle in degrees.
    #[must_use]
    pub fn with_wedge_half_angle(mut self, degrees: f64) -> Self {
        self.wedge_half_angle_deg = degrees;
        self
    }

    /// Limits acceptance along the axis.
    #[must_use]
    pub fn with_axial_half_length(mut self, half_length: f64) -> Self {
        self.axial_half_length = Some(half_length);
        self
    }

    /// Accepted radius after the margin.
    #[inline]
    #[must_use]
    pub fn accepted_radius(&self) -> f64 {
        self.radius - self.margin
    }

    /// Checks that the geometry describes a non-empty volume.
    ///
    /// # Errors
    /// Returns `ConfigError` for non-finite values, a margin that swallows
    /// the radius, or a wedge wider than a full turn.
    pub fn validate(&self) -> Result<()> {
        let values = [
            ("radius", self.radius),
            ("margin", self.margin),
            ("axis center offset", self.axis_center_offset),
            ("wedge half angle", self.wedge_half_angle_deg),
        ];
        for (name, value) in values {
            if !value.is_finite() {
                return Err(Error::ConfigError(format!("{name} must be finite, got {value}")));
            }
        }
        if self.margin < 0.0 || self.margin >= self.radius {
            return Err(Error::ConfigError(format!(
                "margin {} must be in [0, radius {})",
                self.margin, self.radius
            )));
        }
        if !(0.0..=180.0).contains(&self.wedge_half_angle_deg) {
            return Err(Error::ConfigError(format!(
                "wedge half angle {} must be in [0, 180] degrees",
                self.wedge_half_angle_deg
            )));
        }
        if let Some(half) = self.axial_half_length {
            if !half.is_finite() || half <= self.margin {
                return Err(Error::ConfigError(format!(
                    "axial half length {half} must exceed the margin {}",
                    self.margin
                )));
            }
        }
        Ok(())
    }
}

/// Which interaction steps get a secondary attributed, and to which species.
///
/// Defaults select the photoelectric effect (EM process type 2, subtype 12)
/// of a primary photon, attributing the photoelectron.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AttributionTarget {
    pub process_type: i32,
    pub process_sub_type: i32,
    /// PDG code of the particle undergoing the interaction.
    pub source_pdg: i32,
    /// Required ancestry generation of that particle; `None` accepts any.
    pub source_generation: Option<u32>,
    /// PDG code of the expected interaction product.
    pub product_pdg: i32,
}

impl Default for AttributionTarget {
    fn default() -> Self {
        Self {
            process_type: 2,
            process_sub_type: 12,
            source_pdg: 22,
            source_generation: Some(0),
            product_pdg: 11,
        }
    }
}

/// Configuration for one reconstruction run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReconstructionConfig {
    pub geometry: GeometryConfig,
    pub attribution: AttributionTarget,
    /// Drop clusters that fail containment instead of flagging them.
    pub selection_veto: bool,
    /// Log progress every N events (0 = never).
    pub progress_report_interval: u64,
    pub energy_unit: EnergyUnit,
    /// Mean energy per ion pair in the gas (MeV).
    pub w_value_mev: f64,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            geometry: GeometryConfig::default(),
            attribution: AttributionTarget::default(),
            selection_veto: false,
            progress_report_interval: 10_000,
            energy_unit: EnergyUnit::default(),
            w_value_mev: 38e-6,
        }
    }
}

impl ReconstructionConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the geometry.
    #[must_use]
    pub fn with_geometry(mut self, geometry: GeometryConfig) -> Self {
        self.geometry = geometry;
        self
    }

    /// Sets the containment policy.
    #[must_use]
    pub fn with_policy(mut self, policy: ContainmentPolicy) -> Self {
        self.geometry.policy = policy;
        self
    }

    /// Sets the attribution target.
    #[must_use]
    pub fn with_attribution(mut self, target: AttributionTarget) -> Self {
        self.attribution = target;
        self
    }

    /// Enables or disables the containment veto.
    #[must_use]
    pub fn with_selection_veto(mut self, veto: bool) -> Self {
        self.selection_veto = veto;
        self
    }

    /// Sets the progress report interval.
    #[must_use]
    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_report_interval = interval;
        self
    }

    /// Sets the output energy unit.
    #[must_use]
    pub fn with_energy_unit(mut self, unit: EnergyUnit) -> Self {
        self.energy_unit = unit;
        self
    }

    /// Sets the W-value (MeV per ion pair).
    #[must_use]
    pub fn with_w_value(mut self, w_value_mev: f64) -> Self {
        self.w_value_mev = w_value_mev;
        self
    }

    /// Validates the whole configuration.
    ///
    /// # Errors
    /// Returns `ConfigError` describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        self.geometry.validate()?;
        if !(self.w_value_mev.is_finite() && self.w_value_mev > 0.0) {
            return Err(Error::ConfigError(format!(
                "W-value must be positive, got {}",
                self.w_value_mev
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_config_is_valid() {
        let config = ReconstructionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.geometry.policy, ContainmentPolicy::CylinderWithWedge);
        assert_relative_eq!(config.geometry.accepted_radius(), 31.9);
        assert_eq!(config.attribution.product_pdg, 11);
    }

    #[test]
    fn test_builder() {
        let config = ReconstructionConfig::new()
            .with_policy(ContainmentPolicy::RadialCylinder)
            .with_selection_veto(true)
            .with_energy_unit(EnergyUnit::KeV)
            .with_progress_interval(5);

        assert_eq!(config.geometry.policy, ContainmentPolicy::RadialCylinder);
        assert!(config.selection_veto);
        assert_eq!(config.progress_report_interval, 5);
        assert_relative_eq!(config.energy_unit.from_mev(0.002), 2.0);
    }

    #[test]
    fn test_margin_must_be_smaller_than_radius() {
        let geometry = GeometryConfig::default().with_radius(5.0, 5.0);
        assert!(matches!(geometry.validate(), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_wedge_angle_range() {
        let geometry = GeometryConfig::default().with_wedge_half_angle(190.0);
        assert!(geometry.validate().is_err());
        let geometry = GeometryConfig::default().with_wedge_half_angle(0.0);
        assert!(geometry.validate().is_ok());
    }

    #[test]
    fn test_non_positive_w_value_rejected() {
        let config = ReconstructionConfig::default().with_w_value(0.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_axial_half_length_must_exceed_margin() {
        let geometry = GeometryConfig::default().with_axial_half_length(4.0);
        assert!(geometry.validate().is_err());
        let geometry = GeometryConfig::default().with_axial_half_length(25.0);
        assert!(geometry.validate().is_ok());
    }
}
