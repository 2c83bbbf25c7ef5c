//! Coordinate conversions.
//!
//! All functions are pure and can be called from any thread. Positions use the
//! Auralis frame (+X right, +Y ahead, +Z up):
//!
//! - **Azimuth** is measured counter-clockwise from +Y in the XY plane, in `[0, 2π)`.
//! - **Elevation** is the angle above the XY plane, in `[-π/2, π/2]`, `+π/2` at the zenith.
//! - **Radius** is the distance from the origin in meters.
//!
//! Orientations are expressed as yaw (about +Z), pitch (about +X) and roll (about +Y),
//! composed in that order: `q = yaw * pitch * roll`.

use crate::error::{AuralisError, Result};
use crate::math::{Quat, Vec3};
use glam::Mat3;
use std::f32::consts::{FRAC_PI_2, TAU};

const DEGENERATE_RADIUS: f32 = 1e-12;
const GIMBAL_LOCK_THRESHOLD: f32 = 1.0 - 1e-6;

/// A position in spherical coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Spherical {
    /// Radians in `[0, 2π)`, counter-clockwise from ahead
    pub azimuth: f32,
    /// Radians in `[-π/2, π/2]`
    pub elevation: f32,
    /// Meters
    pub radius: f32,
}

impl Spherical {
    pub fn new(azimuth: f32, elevation: f32, radius: f32) -> Self {
        Self {
            azimuth,
            elevation,
            radius,
        }
    }
}

impl From<Vec3> for Spherical {
    fn from(position: Vec3) -> Self {
        cartesian_to_spherical(position)
    }
}

impl From<Spherical> for Vec3 {
    fn from(spherical: Spherical) -> Self {
        spherical_to_cartesian(spherical)
    }
}

/// An orientation as yaw, pitch and roll in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EulerAngles {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

impl EulerAngles {
    pub fn new(yaw: f32, pitch: f32, roll: f32) -> Self {
        Self { yaw, pitch, roll }
    }
}

/// Converts a Cartesian position into spherical coordinates.
///
/// The origin maps to `(0, 0, 0)`.
pub fn cartesian_to_spherical(position: Vec3) -> Spherical {
    let radius = position.length();
    if !(radius > DEGENERATE_RADIUS) {
        return Spherical::default();
    }

    let mut azimuth = (-position.x).atan2(position.y);
    if azimuth < 0.0 {
        azimuth += TAU;
    }
    // -0.0 and tiny negative angles can round up to exactly TAU
    if azimuth >= TAU {
        azimuth = 0.0;
    }

    let elevation = (position.z / radius).clamp(-1.0, 1.0).asin();

    Spherical {
        azimuth,
        elevation,
        radius,
    }
}

/// Converts spherical coordinates into a Cartesian position.
pub fn spherical_to_cartesian(spherical: Spherical) -> Vec3 {
    let (sin_az, cos_az) = spherical.azimuth.sin_cos();
    let (sin_el, cos_el) = spherical.elevation.sin_cos();
    let horizontal = spherical.radius * cos_el;

    Vec3::new(
        -horizontal * sin_az,
        horizontal * cos_az,
        spherical.radius * sin_el,
    )
}

/// Converts yaw/pitch/roll into a unit quaternion.
pub fn euler_to_quaternion(angles: EulerAngles) -> Quat {
    (Quat::from_rotation_z(angles.yaw)
        * Quat::from_rotation_x(angles.pitch)
        * Quat::from_rotation_y(angles.roll))
    .normalize()
}

/// Converts a quaternion into yaw/pitch/roll.
///
/// At gimbal lock (pitch of ±π/2) yaw and roll are not separable; roll is reported
/// as zero and the whole rotation about the vertical is attributed to yaw.
pub fn quaternion_to_euler(rotation: Quat) -> EulerAngles {
    let m = Mat3::from_quat(rotation.normalize());

    // Rz(yaw) * Rx(pitch) * Ry(roll) has sin(pitch) at row 2, column 1
    let sin_pitch = m.y_axis.z;

    if sin_pitch.abs() >= GIMBAL_LOCK_THRESHOLD {
        let pitch = FRAC_PI_2.copysign(sin_pitch);
        let yaw = m.x_axis.y.atan2(m.x_axis.x);
        return EulerAngles {
            yaw,
            pitch,
            roll: 0.0,
        };
    }

    EulerAngles {
        yaw: (-m.y_axis.x).atan2(m.y_axis.y),
        pitch: sin_pitch.asin(),
        roll: (-m.x_axis.z).atan2(m.z_axis.z),
    }
}

/// Builds a normalized quaternion from `(w, x, y, z)` components.
pub fn quaternion_from_wxyz(w: f32, x: f32, y: f32, z: f32) -> Result<Quat> {
    let rotation = Quat::from_xyzw(x, y, z, w);
    let length = rotation.length();
    if !rotation.is_finite() || !(length > f32::EPSILON) {
        return Err(AuralisError::InvalidParameter(format!(
            "quaternion ({}, {}, {}, {}) cannot be normalized",
            w, x, y, z
        )));
    }
    Ok(rotation / length)
}

pub(crate) fn ensure_finite_quat(name: &str, rotation: Quat) -> Result<Quat> {
    quaternion_from_wxyz(rotation.w, rotation.x, rotation.y, rotation.z).map_err(|_| {
        AuralisError::InvalidParameter(format!("{} must be a non-zero finite quaternion", name))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f32::consts::{FRAC_PI_4, PI};

    fn assert_same_rotation(a: Quat, b: Quat) {
        // q and -q describe the same rotation
        let dot = a.dot(b).abs();
        assert_abs_diff_eq!(dot, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_origin_is_not_nan() {
        let s = cartesian_to_spherical(Vec3::ZERO);
        assert_eq!(s, Spherical::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn test_cardinal_directions() {
        let ahead = cartesian_to_spherical(Vec3::new(0.0, 2.0, 0.0));
        assert_abs_diff_eq!(ahead.azimuth, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(ahead.elevation, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(ahead.radius, 2.0, epsilon = 1e-6);

        let left = cartesian_to_spherical(Vec3::new(-1.0, 0.0, 0.0));
        assert_abs_diff_eq!(left.azimuth, FRAC_PI_2, epsilon = 1e-6);

        let behind = cartesian_to_spherical(Vec3::new(0.0, -1.0, 0.0));
        assert_abs_diff_eq!(behind.azimuth, PI, epsilon = 1e-6);

        let right = cartesian_to_spherical(Vec3::new(1.0, 0.0, 0.0));
        assert_abs_diff_eq!(right.azimuth, 3.0 * FRAC_PI_2, epsilon = 1e-5);

        let zenith = cartesian_to_spherical(Vec3::new(0.0, 0.0, 3.0));
        assert_abs_diff_eq!(zenith.elevation, FRAC_PI_2, epsilon = 1e-6);
        assert_abs_diff_eq!(zenith.radius, 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_azimuth_stays_below_tau() {
        let s = cartesian_to_spherical(Vec3::new(1e-9, 1.0, 0.0));
        assert!(s.azimuth >= 0.0 && s.azimuth < TAU);
    }

    #[test]
    fn test_spherical_round_trip() {
        let points = [
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(-4.0, 0.5, -1.0),
            Vec3::new(0.3, -7.0, 2.0),
            Vec3::new(5.0, -5.0, -5.0),
            Vec3::new(-0.01, -0.02, 0.005),
        ];
        for point in points {
            let back = spherical_to_cartesian(cartesian_to_spherical(point));
            assert!(
                back.abs_diff_eq(point, 1e-4 * point.length().max(1.0)),
                "{:?} came back as {:?}",
                point,
                back
            );
        }
    }

    #[test]
    fn test_euler_round_trip() {
        let cases = [
            EulerAngles::new(0.3, 0.2, -0.1),
            EulerAngles::new(-2.5, -1.0, 1.2),
            EulerAngles::new(PI - 0.1, 0.7, -2.9),
            EulerAngles::new(0.0, 0.0, 0.0),
        ];
        for angles in cases {
            let back = quaternion_to_euler(euler_to_quaternion(angles));
            assert_abs_diff_eq!(back.yaw, angles.yaw, epsilon = 1e-4);
            assert_abs_diff_eq!(back.pitch, angles.pitch, epsilon = 1e-4);
            assert_abs_diff_eq!(back.roll, angles.roll, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_quaternion_round_trip() {
        let rotation = quaternion_from_wxyz(0.8, 0.2, -0.4, 0.3).unwrap();
        let back = euler_to_quaternion(quaternion_to_euler(rotation));
        assert_same_rotation(rotation, back);
    }

    #[test]
    fn test_gimbal_lock_has_no_nan() {
        for pitch in [FRAC_PI_2, -FRAC_PI_2] {
            let rotation = euler_to_quaternion(EulerAngles::new(FRAC_PI_4, pitch, 0.3));
            let angles = quaternion_to_euler(rotation);
            assert!(angles.yaw.is_finite());
            assert!(angles.pitch.is_finite());
            assert!(angles.roll.is_finite());
            assert_abs_diff_eq!(angles.pitch, pitch, epsilon = 1e-3);

            // The split differs but the orientation must survive
            assert_same_rotation(rotation, euler_to_quaternion(angles));
        }
    }

    #[test]
    fn test_yaw_matches_azimuth_convention() {
        // Yawing by +90 degrees turns the forward axis to the left (azimuth π/2)
        let rotation = euler_to_quaternion(EulerAngles::new(FRAC_PI_2, 0.0, 0.0));
        let forward = rotation * Vec3::Y;
        let s = cartesian_to_spherical(forward);
        assert_abs_diff_eq!(s.azimuth, FRAC_PI_2, epsilon = 1e-5);
    }

    #[test]
    fn test_quaternion_from_wxyz() {
        let q = quaternion_from_wxyz(2.0, 0.0, 0.0, 0.0).unwrap();
        assert_eq!(q, Quat::IDENTITY);

        assert!(quaternion_from_wxyz(0.0, 0.0, 0.0, 0.0).is_err());
        assert!(quaternion_from_wxyz(f32::NAN, 0.0, 0.0, 1.0).is_err());
    }
}
