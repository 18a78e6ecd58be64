//! Conversion from OSVR's right-handed coordinate system to the engine's
//! left-handed one.
//!
//! OSVR reports in meters with `+y` up and `-z` forward. The engine uses the
//! same units and up axis with `+z` forward, so positions mirror `z` and
//! rotations negate the `x` and `y` imaginary parts.

use glam::{Mat4, Quat, Vec3};
use osvr_clientkit::{AnalogReport, ButtonReport, Pose3, Quaternion};

/// A converted rigid transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

impl Pose {
    /// The pose as a rotation-then-translation matrix.
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.position)
    }
}

pub fn position(v: &osvr_clientkit::Vec3) -> Vec3 {
    Vec3::new(v.x as f32, v.y as f32, -v.z as f32)
}

pub fn orientation(q: &Quaternion) -> Quat {
    Quat::from_xyzw(-q.x as f32, -q.y as f32, q.z as f32, q.w as f32)
}

pub fn pose(p: &Pose3) -> Pose {
    Pose {
        position: position(&p.translation),
        rotation: orientation(&p.rotation),
    }
}

/// Unit scale, see [`Pose::to_matrix`].
pub fn pose_matrix(p: &Pose3) -> Mat4 {
    pose(p).to_matrix()
}

pub fn button_pressed(report: &ButtonReport) -> bool {
    report.is_pressed()
}

pub fn analog_value(report: &AnalogReport) -> f32 {
    report.state as f32
}

#[cfg(test)]
mod tests {
    use osvr_clientkit::{BUTTON_NOT_PRESSED, BUTTON_PRESSED};

    use super::*;

    fn osvr_vec3(x: f64, y: f64, z: f64) -> osvr_clientkit::Vec3 {
        osvr_clientkit::Vec3 { x, y, z }
    }

    #[test]
    fn position_mirrors_z() {
        let converted = position(&osvr_vec3(1.0, 2.0, 3.0));

        assert_eq!(converted, Vec3::new(1.0, 2.0, -3.0));
    }

    #[test]
    fn orientation_negates_x_and_y() {
        let q = Quaternion {
            w: 0.5,
            x: 0.5,
            y: 0.5,
            z: 0.5,
        };

        let converted = orientation(&q);

        assert_eq!(converted, Quat::from_xyzw(-0.5, -0.5, 0.5, 0.5));
    }

    #[test]
    fn identity_orientation_stays_identity() {
        assert_eq!(orientation(&Quaternion::IDENTITY), Quat::IDENTITY);
    }

    #[test]
    fn pose_matrix_places_the_converted_translation() {
        let p = Pose3 {
            translation: osvr_vec3(0.25, 1.5, -2.0),
            rotation: Quaternion::IDENTITY,
        };

        let matrix = pose_matrix(&p);

        assert_eq!(matrix.w_axis.truncate(), Vec3::new(0.25, 1.5, 2.0));
        assert_eq!(matrix.transform_vector3(Vec3::X), Vec3::X);
    }

    #[test]
    fn pose_matrix_applies_the_converted_rotation() {
        // Quarter turn about +y in OSVR space
        let half = core::f64::consts::FRAC_1_SQRT_2;
        let p = Pose3 {
            translation: osvr_vec3(0.0, 0.0, 0.0),
            rotation: Quaternion {
                w: half,
                x: 0.0,
                y: half,
                z: 0.0,
            },
        };

        let rotated = pose_matrix(&p).transform_vector3(Vec3::X);

        // OSVR maps +x to -z; mirrored, the engine sees +x map to +z
        assert!(rotated.abs_diff_eq(Vec3::Z, 1e-6), "got {rotated}");
    }

    #[test]
    fn button_and_analog_values() {
        let pressed = ButtonReport {
            sensor: 0,
            state: BUTTON_PRESSED,
        };
        let released = ButtonReport {
            sensor: 0,
            state: BUTTON_NOT_PRESSED,
        };
        let trigger = AnalogReport {
            sensor: 1,
            state: 0.75,
        };

        assert!(button_pressed(&pressed));
        assert!(!button_pressed(&released));
        assert_eq!(analog_value(&trigger), 0.75);
    }
}
