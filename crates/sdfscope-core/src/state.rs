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

//! The shared camera/view/display state of a render session.

use crate::math::{Aabb, Aabb2, Mat4, Vec3, FRAC_PI_4};
use crate::tree::SurfaceTree;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Plain shared data describing the camera, resolution and display options.
///
/// Mutated only by the input-handling collaborator between sessions; the
/// render pipeline takes brief read-locked snapshots. The resolution divisor
/// and color mode are clamped on every mutation so they always stay valid.
#[derive(Debug, Clone)]
pub struct RenderState {
    /// Screen pixels per rendered pixel; larger values render coarser,
    /// faster previews. Always `>= 1`.
    res_div: u32,
    /// The active color mode. Always `< color_modes` of the active sampler.
    color_mode: u32,
    /// Whether to draw the bounding-box overlay.
    pub draw_boxes: bool,
    /// The 2D view rectangle (scale and displacement) for 2D samplers.
    pub view_2d: Aabb2,
    /// The arc-ball camera pivot (the point being looked at).
    pub cam_center: Vec3,
    /// The arc-ball yaw angle around the pivot, in radians.
    pub cam_yaw: f64,
    /// The arc-ball pitch angle around the pivot, in radians.
    pub cam_pitch: f64,
    /// The camera's distance from the pivot.
    pub cam_dist: f64,
    /// Cached read-only introspection snapshot of the surface hierarchy.
    /// Rebuilt on structural change, never per frame.
    pub tree: Option<Arc<SurfaceTree>>,
}

impl RenderState {
    /// The default resolution divisor for fresh sessions (coarse preview).
    pub const DEFAULT_RES_DIV: u32 = 4;

    /// Creates a state framing a 2D surface at 100% zoom.
    ///
    /// The rectangle's aspect ratio is corrected against the output buffer
    /// by the 2D sampler on first render.
    pub fn new_2d(bb: Aabb2) -> Self {
        Self {
            res_div: Self::DEFAULT_RES_DIV,
            color_mode: 0,
            draw_boxes: false,
            view_2d: bb,
            cam_center: Vec3::ZERO,
            cam_yaw: 0.0,
            cam_pitch: 0.0,
            cam_dist: 0.0,
            tree: None,
        }
    }

    /// Creates a state with the arc-ball camera framing a 3D bounding box.
    pub fn new_3d(bb: &Aabb) -> Self {
        let mut state = Self {
            res_div: Self::DEFAULT_RES_DIV,
            color_mode: 0,
            draw_boxes: false,
            view_2d: bb.to_aabb2(),
            cam_center: Vec3::ZERO,
            cam_yaw: 0.0,
            cam_pitch: 0.0,
            cam_dist: 0.0,
            tree: None,
        };
        state.reset_camera(bb);
        state
    }

    /// Re-frames the arc-ball camera: pivot at the box center, distance at
    /// half the box diagonal, looking from 45 degrees up and to the right.
    pub fn reset_camera(&mut self, bb: &Aabb) {
        self.cam_center = bb.center();
        self.cam_dist = bb.size().length() / 2.0;
        self.cam_pitch = -FRAC_PI_4;
        self.cam_yaw = -FRAC_PI_4;
    }

    /// Returns the resolution divisor.
    #[inline]
    pub fn res_div(&self) -> u32 {
        self.res_div
    }

    /// Sets the resolution divisor, clamped to `>= 1`.
    pub fn set_res_div(&mut self, res_div: u32) {
        self.res_div = res_div.max(1);
    }

    /// Returns the active color mode.
    #[inline]
    pub fn color_mode(&self) -> u32 {
        self.color_mode
    }

    /// Sets the color mode, clamped against the sampler's mode count.
    pub fn set_color_mode(&mut self, mode: u32, available_modes: u32) {
        self.color_mode = mode.min(available_modes.saturating_sub(1));
    }

    /// Returns the camera's rotation matrix (yaw around Z, then pitch
    /// around X), with no translation.
    pub fn camera_rotation(&self) -> Mat4 {
        Mat4::from_rotation_z(self.cam_yaw) * Mat4::from_rotation_x(self.cam_pitch)
    }

    /// Returns the camera position: the pivot pushed back along the rotated
    /// view axis by the configured distance.
    pub fn camera_position(&self) -> Vec3 {
        self.cam_center
            + self
                .camera_rotation()
                .mul_dir(Vec3::new(0.0, -self.cam_dist, 0.0))
    }

    /// Takes a value-type snapshot for crossing an API or process boundary.
    pub fn snapshot(&self) -> RenderStateSnapshot {
        RenderStateSnapshot {
            res_div: self.res_div,
            color_mode: self.color_mode,
            draw_boxes: self.draw_boxes,
            view_2d: self.view_2d,
            cam_center: self.cam_center,
            cam_yaw: self.cam_yaw,
            cam_pitch: self.cam_pitch,
            cam_dist: self.cam_dist,
            tree: self.tree.as_deref().cloned(),
        }
    }

    /// Rebuilds a state from a boundary snapshot.
    pub fn from_snapshot(snapshot: &RenderStateSnapshot) -> Self {
        Self {
            res_div: snapshot.res_div.max(1),
            color_mode: snapshot.color_mode,
            draw_boxes: snapshot.draw_boxes,
            view_2d: snapshot.view_2d,
            cam_center: snapshot.cam_center,
            cam_yaw: snapshot.cam_yaw,
            cam_pitch: snapshot.cam_pitch,
            cam_dist: snapshot.cam_dist,
            tree: snapshot.tree.clone().map(Arc::new),
        }
    }
}

/// A plain value snapshot of [`RenderState`], safe to serialize and ship
/// across the remote boundary. No shared mutable ownership crosses with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderStateSnapshot {
    /// Screen pixels per rendered pixel.
    pub res_div: u32,
    /// The active color mode.
    pub color_mode: u32,
    /// Whether to draw the bounding-box overlay.
    pub draw_boxes: bool,
    /// The 2D view rectangle.
    pub view_2d: Aabb2,
    /// The arc-ball camera pivot.
    pub cam_center: Vec3,
    /// The arc-ball yaw angle, in radians.
    pub cam_yaw: f64,
    /// The arc-ball pitch angle, in radians.
    pub cam_pitch: f64,
    /// The camera distance from the pivot.
    pub cam_dist: f64,
    /// The cached introspection tree, if one was built.
    pub tree: Option<SurfaceTree>,
}
