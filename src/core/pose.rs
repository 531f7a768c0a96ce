//! Sensor pose representation.
//!
//! A rigid transform from the sensor frame to the world frame, stored as a
//! 3x3 rotation matrix plus a translation vector. 2D poses keep z at zero
//! and rotate about the z axis only.

/// Rigid transform (rotation + translation), sensor frame to world frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    /// Row-major rotation matrix.
    pub rotation: [[f32; 3]; 3],
    /// Translation in meters; the sensor origin in world coordinates.
    pub translation: [f32; 3],
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    /// The identity transform.
    pub fn identity() -> Self {
        Self {
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            translation: [0.0; 3],
        }
    }

    /// A 2D pose at (x, y) with heading `theta` (radians, CCW from +X).
    pub fn from_2d(x: f32, y: f32, theta: f32) -> Self {
        let (sin_t, cos_t) = theta.sin_cos();
        Self {
            rotation: [
                [cos_t, -sin_t, 0.0],
                [sin_t, cos_t, 0.0],
                [0.0, 0.0, 1.0],
            ],
            translation: [x, y, 0.0],
        }
    }

    /// A pure translation.
    pub fn from_translation(x: f32, y: f32, z: f32) -> Self {
        Self {
            rotation: Self::identity().rotation,
            translation: [x, y, z],
        }
    }

    /// A full 3D pose from a rotation matrix and a translation.
    pub fn from_parts(rotation: [[f32; 3]; 3], translation: [f32; 3]) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// The sensor origin in world coordinates.
    #[inline]
    pub fn position(&self) -> [f32; 3] {
        self.translation
    }

    /// Transform a point from the sensor frame to the world frame.
    #[inline]
    pub fn transform_point(&self, p: [f32; 3]) -> [f32; 3] {
        let r = &self.rotation;
        [
            r[0][0] * p[0] + r[0][1] * p[1] + r[0][2] * p[2] + self.translation[0],
            r[1][0] * p[0] + r[1][1] * p[1] + r[1][2] * p[2] + self.translation[1],
            r[2][0] * p[0] + r[2][1] * p[1] + r[2][2] * p[2] + self.translation[2],
        ]
    }

    /// Rotate a direction vector, ignoring translation.
    #[inline]
    pub fn rotate_vector(&self, v: [f32; 3]) -> [f32; 3] {
        let r = &self.rotation;
        [
            r[0][0] * v[0] + r[0][1] * v[1] + r[0][2] * v[2],
            r[1][0] * v[0] + r[1][1] * v[1] + r[1][2] * v[2],
            r[2][0] * v[0] + r[2][1] * v[1] + r[2][2] * v[2],
        ]
    }

    /// The inverse transform. Relies on the rotation being orthonormal.
    pub fn inverse(&self) -> Pose {
        let r = &self.rotation;
        // Transpose of an orthonormal matrix is its inverse.
        let rotation = [
            [r[0][0], r[1][0], r[2][0]],
            [r[0][1], r[1][1], r[2][1]],
            [r[0][2], r[1][2], r[2][2]],
        ];
        let t = self.translation;
        let translation = [
            -(rotation[0][0] * t[0] + rotation[0][1] * t[1] + rotation[0][2] * t[2]),
            -(rotation[1][0] * t[0] + rotation[1][1] * t[1] + rotation[1][2] * t[2]),
            -(rotation[2][0] * t[0] + rotation[2][1] * t[1] + rotation[2][2] * t[2]),
        ];
        Pose {
            rotation,
            translation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn assert_close(a: [f32; 3], b: [f32; 3]) {
        for k in 0..3 {
            assert!((a[k] - b[k]).abs() < 1e-5, "{:?} != {:?}", a, b);
        }
    }

    #[test]
    fn test_identity_transform() {
        let pose = Pose::identity();
        assert_close(pose.transform_point([1.0, 2.0, 3.0]), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_2d_rotation() {
        let pose = Pose::from_2d(1.0, 0.0, FRAC_PI_2);
        // Forward in sensor frame maps to +Y in world, offset by translation.
        assert_close(pose.transform_point([1.0, 0.0, 0.0]), [1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_inverse_round_trip() {
        let pose = Pose::from_2d(2.0, -1.5, 0.7);
        let inverse = pose.inverse();
        let p = [3.0, 4.0, 0.0];
        assert_close(inverse.transform_point(pose.transform_point(p)), p);
    }

    #[test]
    fn test_position_is_translation() {
        let pose = Pose::from_translation(4.0, 5.0, 6.0);
        assert_eq!(pose.position(), [4.0, 5.0, 6.0]);
    }
}
