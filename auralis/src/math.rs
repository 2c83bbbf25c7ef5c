//! Math types for Auralis
//!
//! Auralis uses a right-handed frame where +X points right, +Y points ahead and
//! +Z points up. An identity rotation faces along +Y.

pub use glam::{Quat, Vec3};

use crate::error::{AuralisError, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    pub fn identity() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            position: Vec3::ZERO,
            rotation,
        }
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }

    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    pub fn distance(&self, other: &Self) -> f32 {
        self.position.distance(other.position)
    }

    /// Expresses a world-space point in this pose's local frame.
    pub fn to_local(&self, point: Vec3) -> Vec3 {
        self.rotation.inverse() * (point - self.position)
    }

    /// Expresses a local-frame point in world space.
    pub fn to_world(&self, point: Vec3) -> Vec3 {
        self.rotation * point + self.position
    }

    /// Rotates a world-space direction into this pose's local frame.
    pub fn direction_to_local(&self, direction: Vec3) -> Vec3 {
        self.rotation.inverse() * direction
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

/// Largest accepted coordinate magnitude in meters. Squared distances stay finite in
/// `f32` well past this bound.
pub const MAX_COORDINATE: f32 = 1.0e9;

pub(crate) fn ensure_coordinates(name: &str, value: Vec3) -> Result<Vec3> {
    if !value.is_finite() {
        return Err(AuralisError::InvalidParameter(format!(
            "{} must be finite, got {:?}",
            name, value
        )));
    }
    if value.abs().max_element() > MAX_COORDINATE {
        return Err(AuralisError::InvalidParameter(format!(
            "{} must lie within {} m of the origin on every axis, got {:?}",
            name, MAX_COORDINATE, value
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_identity_axes() {
        let pose = Pose::identity();
        assert_eq!(pose.forward(), Vec3::Y);
        assert_eq!(pose.right(), Vec3::X);
        assert_eq!(pose.up(), Vec3::Z);
    }

    #[test]
    fn test_local_world_round_trip() {
        let pose = Pose::new(Vec3::new(1.0, 2.0, 0.5), Quat::from_rotation_z(FRAC_PI_2));
        let point = Vec3::new(-3.0, 4.0, 1.0);

        let local = pose.to_local(point);
        assert!(pose.to_world(local).abs_diff_eq(point, 1e-5));
    }

    #[test]
    fn test_turning_left_moves_ahead_to_the_right() {
        // Yawing 90 degrees counter-clockwise makes the old "ahead" appear on the right
        let pose = Pose::from_rotation(Quat::from_rotation_z(FRAC_PI_2));
        let local = pose.to_local(Vec3::Y);
        assert!(local.abs_diff_eq(Vec3::X, 1e-5));
        assert!(pose.direction_to_local(Vec3::Y).abs_diff_eq(Vec3::X, 1e-5));
    }

    #[test]
    fn test_distance_ignores_rotation() {
        let a = Pose::from_position(Vec3::new(1.0, 0.0, 0.0));
        let b = Pose::new(Vec3::new(1.0, 3.0, 4.0), Quat::from_rotation_x(1.0));
        assert_eq!(a.distance(&b), 5.0);
    }

    #[test]
    fn test_coordinates_are_bounded() {
        let far = Vec3::new(0.0, MAX_COORDINATE, -MAX_COORDINATE);
        assert_eq!(ensure_coordinates("position", far), Ok(far));

        for value in [
            Vec3::new(1.0e38, 0.0, 0.0),
            Vec3::new(0.0, 0.0, -2.0e9),
            Vec3::new(f32::INFINITY, 0.0, 0.0),
        ] {
            assert!(matches!(
                ensure_coordinates("position", value),
                Err(AuralisError::InvalidParameter(_))
            ));
        }
    }
}
