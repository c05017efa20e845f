//! Loading of the JSON configuration surface.
//!
//! Every key is optional; missing keys keep their defaults. The result is
//! validated before it is returned.

use crate::Result;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tpcreco_core::config::{
    AttributionTarget, Axis, ContainmentPolicy, EnergyUnit, GeometryConfig, ReconstructionConfig,
};

// Intermediate structs for the camelCase file schema
#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct JsonConfig {
    containment_policy: Option<ContainmentPolicy>,
    geometry_constants: JsonGeometry,
    selection_veto: Option<bool>,
    attribution_target: JsonAttributionTarget,
    progress_report_interval: Option<u64>,
    energy_unit: Option<EnergyUnit>,
    w_value: Option<f64>,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct JsonGeometry {
    radius: Option<f64>,
    margin: Option<f64>,
    axis_center_offset: Option<f64>,
    wedge_half_angle: Option<f64>,
    axis: Option<Axis>,
    axial_half_length: Option<f64>,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct JsonAttributionTarget {
    process_type: Option<i32>,
    process_sub_type: Option<i32>,
    source_pdg: Option<i32>,
    product_pdg: Option<i32>,
    /// A negative generation accepts any.
    source_generation: Option<i64>,
}

impl JsonGeometry {
    fn apply(self, mut geometry: GeometryConfig) -> GeometryConfig {
        if let Some(radius) = self.radius {
            geometry.radius = radius;
        }
        if let Some(margin) = self.margin {
            geometry.margin = margin;
        }
        if let Some(offset) = self.axis_center_offset {
            geometry.axis_center_offset = offset;
        }
        if let Some(degrees) = self.wedge_half_angle {
            geometry.wedge_half_angle_deg = degrees;
        }
        if let Some(axis) = self.axis {
            geometry.axis = axis;
        }
        if self.axial_half_length.is_some() {
            geometry.axial_half_length = self.axial_half_length;
        }
        geometry
    }
}

impl JsonAttributionTarget {
    fn apply(self, mut target: AttributionTarget) -> AttributionTarget {
        if let Some(value) = self.process_type {
            target.process_type = value;
        }
        if let Some(value) = self.process_sub_type {
            target.process_sub_type = value;
        }
        if let Some(value) = self.source_pdg {
            target.source_pdg = value;
        }
        if let Some(value) = self.product_pdg {
            target.product_pdg = value;
        }
        if let Some(generation) = self.source_generation {
            target.source_generation = u32::try_from(generation).ok();
        }
        target
    }
}

impl JsonConfig {
    fn into_config(self) -> ReconstructionConfig {
        let mut geometry = self.geometry_constants.apply(GeometryConfig::default());
        if let Some(policy) = self.containment_policy {
            geometry.policy = policy;
        }
        let mut config = ReconstructionConfig {
            geometry,
            attribution: self.attribution_target.apply(AttributionTarget::default()),
            ..ReconstructionConfig::default()
        };
        if let Some(veto) = self.selection_veto {
            config.selection_veto = veto;
        }
        if let Some(interval) = self.progress_report_interval {
            config.progress_report_interval = interval;
        }
        if let Some(unit) = self.energy_unit {
            config.energy_unit = unit;
        }
        if let Some(w_value) = self.w_value {
            config.w_value_mev = w_value;
        }
        config
    }
}

/// Loads a configuration from a JSON file.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed, or a `CoreError`
/// wrapping `ConfigError` if the values are invalid.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ReconstructionConfig> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let json_config: JsonConfig = serde_json::from_reader(reader)?;
    finish(json_config)
}

/// Loads a configuration from a JSON string.
///
/// # Errors
/// Returns an error if the string cannot be parsed or the values are invalid.
pub fn from_json(json: &str) -> Result<ReconstructionConfig> {
    let json_config: JsonConfig = serde_json::from_str(json)?;
    finish(json_config)
}

fn finish(json_config: JsonConfig) -> Result<ReconstructionConfig> {
    let config = json_config.into_config();
    config.validate()?;
    Ok(config)
}
