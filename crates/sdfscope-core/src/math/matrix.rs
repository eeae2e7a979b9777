// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Provides a 4x4 column-major matrix for camera and projection transforms.

use super::vector::Vec3;
use std::ops::Mul;

/// A 4x4 column-major matrix with `f64` components.
///
/// `cols[c][r]` addresses column `c`, row `r`. Only the transforms the render
/// pipeline needs are provided: rotations for the arc-ball camera, a
/// right-handed look-at, and a right-handed perspective projection with a
/// zero-to-one depth range.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Mat4 {
    /// The matrix columns.
    pub cols: [[f64; 4]; 4],
}

impl Mat4 {
    /// The identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// Creates a rotation matrix around the X-axis by `angle` radians.
    pub fn from_rotation_x(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self {
            cols: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, c, s, 0.0],
                [0.0, -s, c, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Creates a rotation matrix around the Z-axis by `angle` radians.
    pub fn from_rotation_z(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self {
            cols: [
                [c, s, 0.0, 0.0],
                [-s, c, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Creates a right-handed view matrix looking from `eye` towards `target`.
    ///
    /// Returns `None` when the forward direction is degenerate or parallel to
    /// `up`.
    pub fn look_at_rh(eye: Vec3, target: Vec3, up: Vec3) -> Option<Self> {
        let f = (target - eye).normalize();
        if f == Vec3::ZERO {
            return None;
        }
        let s = f.cross(up).normalize();
        if s == Vec3::ZERO {
            return None;
        }
        let u = s.cross(f);
        Some(Self {
            cols: [
                [s.x, u.x, -f.x, 0.0],
                [s.y, u.y, -f.y, 0.0],
                [s.z, u.z, -f.z, 0.0],
                [-s.dot(eye), -u.dot(eye), f.dot(eye), 1.0],
            ],
        })
    }

    /// Creates a right-handed perspective projection with depth in `[0, 1]`.
    pub fn perspective_rh_zo(fov_y: f64, aspect: f64, z_near: f64, z_far: f64) -> Self {
        let f = 1.0 / (fov_y * 0.5).tan();
        let r = z_far / (z_near - z_far);
        Self {
            cols: [
                [f / aspect, 0.0, 0.0, 0.0],
                [0.0, f, 0.0, 0.0],
                [0.0, 0.0, r, -1.0],
                [0.0, 0.0, r * z_near, 0.0],
            ],
        }
    }

    /// Returns the transpose of this matrix.
    ///
    /// For pure rotations the transpose is the inverse, which is how the
    /// camera basis is inverted when projecting world points back to pixels.
    pub fn transpose(&self) -> Self {
        let mut out = [[0.0; 4]; 4];
        for (c, col) in self.cols.iter().enumerate() {
            for (r, v) in col.iter().enumerate() {
                out[r][c] = *v;
            }
        }
        Self { cols: out }
    }

    /// Transforms a point (`w = 1`), ignoring any projective component.
    #[inline]
    pub fn mul_point(&self, p: Vec3) -> Vec3 {
        let c = &self.cols;
        Vec3::new(
            c[0][0] * p.x + c[1][0] * p.y + c[2][0] * p.z + c[3][0],
            c[0][1] * p.x + c[1][1] * p.y + c[2][1] * p.z + c[3][1],
            c[0][2] * p.x + c[1][2] * p.y + c[2][2] * p.z + c[3][2],
        )
    }

    /// Transforms a direction (`w = 0`).
    #[inline]
    pub fn mul_dir(&self, v: Vec3) -> Vec3 {
        let c = &self.cols;
        Vec3::new(
            c[0][0] * v.x + c[1][0] * v.y + c[2][0] * v.z,
            c[0][1] * v.x + c[1][1] * v.y + c[2][1] * v.z,
            c[0][2] * v.x + c[1][2] * v.y + c[2][2] * v.z,
        )
    }

    /// Transforms a point and returns the full homogeneous result `(xyz, w)`.
    #[inline]
    pub fn mul_point_w(&self, p: Vec3) -> (Vec3, f64) {
        let c = &self.cols;
        let v = Vec3::new(
            c[0][0] * p.x + c[1][0] * p.y + c[2][0] * p.z + c[3][0],
            c[0][1] * p.x + c[1][1] * p.y + c[2][1] * p.z + c[3][1],
            c[0][2] * p.x + c[1][2] * p.y + c[2][2] * p.z + c[3][2],
        );
        let w = c[0][3] * p.x + c[1][3] * p.y + c[2][3] * p.z + c[3][3];
        (v, w)
    }
}

impl Mul for Mat4 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        let mut out = [[0.0; 4]; 4];
        for (c, col) in out.iter_mut().enumerate() {
            for (r, v) in col.iter_mut().enumerate() {
                *v = (0..4).map(|k| self.cols[k][r] * rhs.cols[c][k]).sum();
            }
        }
        Self { cols: out }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{EPSILON, FRAC_PI_2};
    use approx::assert_relative_eq;

    fn assert_vec3_eq(a: Vec3, b: Vec3) {
        assert_relative_eq!(a.x, b.x, epsilon = EPSILON);
        assert_relative_eq!(a.y, b.y, epsilon = EPSILON);
        assert_relative_eq!(a.z, b.z, epsilon = EPSILON);
    }

    #[test]
    fn rotation_z_turns_x_into_y() {
        let m = Mat4::from_rotation_z(FRAC_PI_2);
        assert_vec3_eq(m.mul_dir(Vec3::X), Vec3::Y);
    }

    #[test]
    fn rotation_x_turns_y_into_z() {
        let m = Mat4::from_rotation_x(FRAC_PI_2);
        assert_vec3_eq(m.mul_dir(Vec3::Y), Vec3::Z);
    }

    #[test]
    fn rotation_transpose_is_inverse() {
        let m = Mat4::from_rotation_z(0.7) * Mat4::from_rotation_x(-0.3);
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_vec3_eq(m.transpose().mul_dir(m.mul_dir(v)), v);
    }

    #[test]
    fn identity_multiplication_is_neutral() {
        let m = Mat4::from_rotation_x(1.1);
        assert_eq!(m * Mat4::IDENTITY, m);
        assert_eq!(Mat4::IDENTITY * m, m);
    }

    #[test]
    fn look_at_moves_eye_to_origin() {
        let view = Mat4::look_at_rh(Vec3::new(0.0, -5.0, 0.0), Vec3::ZERO, Vec3::Z).unwrap();
        let eye_in_view = view.mul_point(Vec3::new(0.0, -5.0, 0.0));
        assert_vec3_eq(eye_in_view, Vec3::ZERO);
        // The target sits on the negative view Z-axis at distance 5.
        let target_in_view = view.mul_point(Vec3::ZERO);
        assert_vec3_eq(target_in_view, Vec3::new(0.0, 0.0, -5.0));
    }

    #[test]
    fn look_at_degenerate_is_none() {
        assert!(Mat4::look_at_rh(Vec3::ZERO, Vec3::ZERO, Vec3::Z).is_none());
        assert!(Mat4::look_at_rh(Vec3::ZERO, Vec3::Z, Vec3::Z).is_none());
    }

    #[test]
    fn perspective_maps_near_and_far() {
        let p = Mat4::perspective_rh_zo(FRAC_PI_2, 1.0, 0.1, 100.0);
        let (near, wn) = p.mul_point_w(Vec3::new(0.0, 0.0, -0.1));
        assert_relative_eq!(near.z / wn, 0.0, epsilon = EPSILON);
        let (far, wf) = p.mul_point_w(Vec3::new(0.0, 0.0, -100.0));
        assert_relative_eq!(far.z / wf, 1.0, epsilon = EPSILON);
    }
}
