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

//! The bounding-box debug overlay.
//!
//! Draws the flattened SurfaceTree boxes over a finished main pass: wire
//! edges in 3D (depth-tested against the captured depth buffer, so boxes
//! disappear behind the surface) and rectangle outlines in 2D. Each box
//! keeps its flattening index's palette color across frames.

use crate::camera::CameraRig;
use sdfscope_core::image::{DepthBuffer, ImageBuffer};
use sdfscope_core::math::{overlay_color, Aabb, Aabb2, Rgba8};

/// Corner-index pairs of the 12 edges of [`Aabb::corners`].
const BOX_EDGES: [(usize, usize); 12] = [
    (0, 1),
    (1, 3),
    (3, 2),
    (2, 0),
    (4, 5),
    (5, 7),
    (7, 6),
    (6, 4),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

/// Draws every box as 12 depth-tested wire edges.
///
/// Edges with an endpoint behind the camera are skipped rather than
/// clipped; a box enclosing the camera simply loses those edges.
pub fn draw_boxes_3d(
    buffer: &mut ImageBuffer,
    depth: &DepthBuffer,
    boxes: &[Aabb],
    rig: &CameraRig,
) {
    for (index, bb) in boxes.iter().enumerate() {
        let color = overlay_color(index);
        let corners = bb.corners();
        for (a, b) in BOX_EDGES {
            if let (Some(pa), Some(pb)) = (rig.project(corners[a]), rig.project(corners[b])) {
                draw_depth_line(buffer, depth, pa, pb, color);
            }
        }
    }
}

/// DDA line with linearly interpolated view depth; a step only lands where
/// it is nearer than the main pass.
fn draw_depth_line(
    buffer: &mut ImageBuffer,
    depth: &DepthBuffer,
    from: (f64, f64, f64),
    to: (f64, f64, f64),
    color: Rgba8,
) {
    let steps = (to.0 - from.0).abs().max((to.1 - from.1).abs()).ceil() as usize;
    let steps = steps.max(1);
    for i in 0..=steps {
        let t = i as f64 / steps as f64;
        let x = from.0 + (to.0 - from.0) * t;
        let y = from.1 + (to.1 - from.1) * t;
        let d = from.2 + (to.2 - from.2) * t;
        if x < 0.0 || y < 0.0 {
            continue;
        }
        let (px, py) = (x as u32, y as u32);
        if d < depth.get(px, py) {
            buffer.set_pixel(px, py, color);
        }
    }
}

/// Draws every rectangle as a 1-pixel outline in view coordinates.
pub fn draw_boxes_2d(buffer: &mut ImageBuffer, rects: &[Aabb2], view: &Aabb2) {
    let size = view.size();
    if size.x <= 0.0 || size.y <= 0.0 {
        return;
    }
    let (width, height) = (f64::from(buffer.width()), f64::from(buffer.height()));
    let to_px = |wx: f64, wy: f64| {
        (
            (wx - view.min.x) / size.x * width,
            (view.max.y - wy) / size.y * height,
        )
    };
    for (index, rect) in rects.iter().enumerate() {
        let color = overlay_color(index);
        let (x0, y1) = to_px(rect.min.x, rect.min.y);
        let (x1, y0) = to_px(rect.max.x, rect.max.y);
        draw_flat_line(buffer, (x0, y0), (x1, y0), color);
        draw_flat_line(buffer, (x1, y0), (x1, y1), color);
        draw_flat_line(buffer, (x1, y1), (x0, y1), color);
        draw_flat_line(buffer, (x0, y1), (x0, y0), color);
    }
}

fn draw_flat_line(buffer: &mut ImageBuffer, from: (f64, f64), to: (f64, f64), color: Rgba8) {
    let steps = (to.0 - from.0).abs().max((to.1 - from.1).abs()).ceil() as usize;
    let steps = steps.max(1);
    for i in 0..=steps {
        let t = i as f64 / steps as f64;
        let x = from.0 + (to.0 - from.0) * t;
        let y = from.1 + (to.1 - from.1) * t;
        if x < 0.0 || y < 0.0 {
            continue;
        }
        buffer.set_pixel(x as u32, y as u32, color);
    }
}
