//! Containment of hits in the accepted gas volume.
//!
//! Coordinates are split into the axial coordinate and a transverse pair
//! `(u, v)`: (y, z) for an X axis, (x, z) for Y, (x, y) for Z. The axis
//! center offset shifts `v`. The wedge azimuth is `atan2(u, v - offset)`
//! in `[0, 2π)`, so the window centred on π faces the negative `v`
//! direction.

use std::f64::consts::PI;

use tpcreco_core::config::{Axis, ContainmentPolicy, GeometryConfig};
use tpcreco_core::step::{normalize_angle, Vec3};

/// Precomputed acceptance predicate for one geometry configuration.
#[derive(Debug, Clone)]
pub struct ContainmentVolume {
    policy: ContainmentPolicy,
    axis: Axis,
    axis_center_offset: f64,
    max_radius_sq: f64,
    wedge_start: f64,
    wedge_end: f64,
    axial_limit: Option<f64>,
}

impl ContainmentVolume {
    /// Builds the predicate from a geometry configuration.
    #[must_use]
    pub fn new(config: &GeometryConfig) -> Self {
        let max_radius = config.accepted_radius().max(0.0);
        let half_angle = config.wedge_half_angle_deg.to_radians();
        Self {
            policy: config.policy,
            axis: config.axis,
            axis_center_offset: config.axis_center_offset,
            max_radius_sq: max_radius * max_radius,
            wedge_start: PI - half_angle,
            wedge_end: PI + half_angle,
            axial_limit: config.axial_half_length.map(|half| half - config.margin),
        }
    }

    /// Returns the configured policy.
    #[must_use]
    pub fn policy(&self) -> ContainmentPolicy {
        self.policy
    }

    /// Splits a point into `(u, v - offset, axial)`.
    #[inline]
    fn project(&self, point: &Vec3) -> (f64, f64, f64) {
        let (u, v, axial) = match self.axis {
            Axis::X => (point.y, point.z, point.x),
            Axis::Y => (point.x, point.z, point.y),
            Axis::Z => (point.x, point.y, point.z),
        };
        (u, v - self.axis_center_offset, axial)
    }

    /// Tests a single point. Both the radial cut and the wedge bounds are inclusive.
    #[must_use]
    pub fn contains(&self, point: &Vec3) -> bool {
        let (u, dv, axial) = self.project(point);

        if let Some(limit) = self.axial_limit {
            if axial.abs() > limit {
                return false;
            }
        }

        let inside_radius = u * u + dv * dv <= self.max_radius_sq;
        match self.policy {
            ContainmentPolicy::RadialCylinder => inside_radius,
            ContainmentPolicy::CylinderWithWedge => inside_radius || self.in_wedge(u, dv),
        }
    }

    #[inline]
    fn in_wedge(&self, u: f64, dv: f64) -> bool {
        let angle = normalize_angle(u.atan2(dv));
        angle >= self.wedge_start && angle <= self.wedge_end
    }

    /// Returns true if every point is contained, stopping at the first that is not.
    pub fn contains_all<'a, I>(&self, points: I) -> bool
    where
        I: IntoIterator<Item = &'a Vec3>,
    {
        points.into_iter().all(|point| self.contains(point))
    }
}
