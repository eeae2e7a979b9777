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

//! The per-session camera basis shared by the 3D strategies.
//!
//! Built once per render from the arc-ball state, then read-only from every
//! worker. The default frame looks along `+Y` with `+Z` up; yaw rotates
//! around Z and pitch around X.

use sdfscope_core::math::{ray_box_travel, Aabb, Mat4, Vec2, Vec3};
use sdfscope_core::state::RenderState;

/// A fully precomputed camera for one render session.
#[derive(Debug, Clone)]
pub struct CameraRig {
    /// The camera-to-world rotation.
    pub rotation: Mat4,
    /// The camera position in world space.
    pub position: Vec3,
    /// The view direction in world space.
    pub forward: Vec3,
    /// Tangent of half the horizontal field of view.
    pub tan_x: f64,
    /// Tangent of half the vertical field of view (aspect-derived).
    pub tan_y: f64,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// The travel budget for rays leaving this camera.
    pub max_ray: f64,
}

impl CameraRig {
    /// Builds the camera basis from the arc-ball state.
    ///
    /// The ray travel budget is derived from the central ray's clip length
    /// against the surface bounding box (its magnitude is still a useful
    /// scale when there is no forward hit), padded by the box diagonal when
    /// the camera starts outside, then generously multiplied so grazing
    /// rays are not cut short.
    pub fn new(state: &RenderState, width: u32, height: u32, fov_x: f64, bb: &Aabb) -> Self {
        let rotation = state.camera_rotation();
        let position = state.camera_position();
        let forward = rotation.mul_dir(Vec3::Y);
        let tan_x = (fov_x * 0.5).tan();
        let tan_y = if width == 0 {
            tan_x
        } else {
            tan_x * f64::from(height) / f64::from(width)
        };
        let mut reach = ray_box_travel(position, forward, bb).abs();
        if !bb.contains_point(position) {
            reach += bb.size().length();
        }
        Self {
            rotation,
            position,
            forward,
            tan_x,
            tan_y,
            width,
            height,
            max_ray: reach * 4.0,
        }
    }

    /// Returns the world-space ray through a normalized pixel position
    /// (`(0,0)` top-left, `(1,1)` bottom-right) as `(origin, direction)`.
    pub fn pixel_ray(&self, pixel01: Vec2) -> (Vec3, Vec3) {
        let ndc_x = pixel01.x * 2.0 - 1.0;
        let ndc_y = 1.0 - pixel01.y * 2.0;
        let local = Vec3::new(ndc_x * self.tan_x, 1.0, ndc_y * self.tan_y).normalize();
        (self.position, self.rotation.mul_dir(local))
    }

    /// The view depth of a world point (distance along `forward`).
    #[inline]
    pub fn view_depth(&self, p: Vec3) -> f64 {
        (p - self.position).dot(self.forward)
    }

    /// Projects a world point back to `(pixel_x, pixel_y, view_depth)`.
    ///
    /// Returns `None` for points at or behind the camera plane. The rotation
    /// is orthonormal, so its transpose inverts the basis.
    pub fn project(&self, p: Vec3) -> Option<(f64, f64, f64)> {
        let local = self.rotation.transpose().mul_dir(p - self.position);
        if local.y <= 1e-9 {
            return None;
        }
        let sx = (local.x / (local.y * self.tan_x) + 1.0) * 0.5 * f64::from(self.width);
        let sy = (1.0 - local.z / (local.y * self.tan_y)) * 0.5 * f64::from(self.height);
        Some((sx, sy, local.y))
    }
}
