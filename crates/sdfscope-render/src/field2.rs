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

//! 2D distance-field shading.
//!
//! Each pixel maps into the view rectangle, evaluates the field once, and
//! shades the signed distance on a two-sided grayscale: the boundary sits at
//! mid-gray, the inside darkens towards the deepest point, the outside
//! brightens towards the farthest.

use crate::coordinator::{Coordinator, JobResult};
use crate::overlay;
use crate::sampler::PixelSampler;
use sdfscope_core::error::SurfaceTreeError;
use sdfscope_core::math::{Aabb, Aabb2, Rgba8, Vec2};
use sdfscope_core::session::Session;
use sdfscope_core::surface::{Sdf2, SurfaceRef, FLAT_BOX_THICKNESS};
use sdfscope_core::tree::SurfaceTree;
use sdfscope_core::RenderError;
use std::sync::{Arc, OnceLock};

/// Tuning knobs of the 2D field sampler.
#[derive(Debug, Clone, Copy)]
pub struct Field2Config {
    /// Cells per axis of the min/max estimation scan.
    pub scan_cells: u32,
    /// Overrides the scanned `(dmin, dmax)` evaluation range when set.
    pub forced_range: Option<(f64, f64)>,
}

impl Default for Field2Config {
    fn default() -> Self {
        Self {
            scan_cells: 128,
            forced_range: None,
        }
    }
}

/// Renders a 2D signed-distance field as a grayscale heatmap.
pub struct Field2Sampler {
    surface: Arc<dyn Sdf2>,
    config: Field2Config,
    coordinator: Coordinator,
    range: OnceLock<(f64, f64)>,
    tree: OnceLock<Result<Arc<SurfaceTree>, SurfaceTreeError>>,
}

impl Field2Sampler {
    /// Creates a sampler over a 2D surface.
    pub fn new(surface: Arc<dyn Sdf2>, config: Field2Config) -> Self {
        Self {
            surface,
            config,
            coordinator: Coordinator::new(),
            range: OnceLock::new(),
            tree: OnceLock::new(),
        }
    }

    /// The `(dmin, dmax)` evaluation range, estimated once per sampler
    /// lifetime by a uniform grid scan over the bounding rectangle.
    fn eval_range(&self) -> (f64, f64) {
        *self.range.get_or_init(|| {
            if let Some(range) = self.config.forced_range {
                return range;
            }
            let bb = self.surface.bounding_box();
            let cells = self.config.scan_cells.max(1);
            let step = Vec2::new(
                bb.size().x / f64::from(cells),
                bb.size().y / f64::from(cells),
            );
            let mut dmin = f64::INFINITY;
            let mut dmax = f64::NEG_INFINITY;
            for iy in 0..=cells {
                for ix in 0..=cells {
                    let p = bb.min + Vec2::new(step.x * f64::from(ix), step.y * f64::from(iy));
                    let d = self.surface.evaluate(p);
                    dmin = dmin.min(d);
                    dmax = dmax.max(d);
                }
            }
            // The mapping divides by both bounds; keep them on their own
            // side of zero even for surfaces that never cross it in-view.
            (dmin.min(-1e-12), dmax.max(1e-12))
        })
    }
}

/// Maps a signed distance to a grayscale intensity in `[0, 1]`.
///
/// Monotonic non-decreasing in `d`; the zero crossing always lands at 0.5.
/// Requires `dmin < 0 < dmax`.
pub fn field_intensity(d: f64, dmin: f64, dmax: f64) -> f64 {
    if d >= 0.0 {
        (0.5 + 0.5 * d / dmax).clamp(0.5, 1.0)
    } else {
        (0.5 * (d - dmin) / -dmin).clamp(0.0, 0.5)
    }
}

/// Grows a view rectangle along its shorter axis to the output aspect
/// ratio, preserving the center. Never shrinks, so the whole surface stays
/// in view.
pub fn grow_to_aspect(view: Aabb2, width: u32, height: u32) -> Aabb2 {
    if width == 0 || height == 0 || view.size().x <= 0.0 || view.size().y <= 0.0 {
        return view;
    }
    let target = f64::from(width) / f64::from(height);
    let size = view.size();
    let current = size.x / size.y;
    let grown = if current < target {
        Vec2::new(size.y * target, size.y)
    } else {
        Vec2::new(size.x, size.x / target)
    };
    Aabb2::from_center_size(view.center(), grown)
}

impl PixelSampler for Field2Sampler {
    fn dimensions(&self) -> u32 {
        2
    }

    fn bounding_box(&self) -> Aabb {
        self.surface.bounding_box().to_aabb(FLAT_BOX_THICKNESS)
    }

    fn color_modes(&self) -> u32 {
        2
    }

    fn surface_tree(&self) -> Result<Arc<SurfaceTree>, SurfaceTreeError> {
        self.tree
            .get_or_init(|| {
                SurfaceTree::build(&SurfaceRef::Two(self.surface.clone())).map(Arc::new)
            })
            .clone()
    }

    fn render(&self, session: &mut Session) -> Result<(), RenderError> {
        let (width, height) = session.render_size();

        // Correct the view aspect under the state write lock so every
        // collaborator sees the rectangle actually rendered.
        let (view, mode, draw_boxes) = {
            let mut state = session.state.write().unwrap();
            state.view_2d = grow_to_aspect(state.view_2d, width, height);
            (state.view_2d, state.color_mode(), state.draw_boxes)
        };

        // Mode 1 collapses the range so the image degenerates to a pure
        // black/white inside-outside view.
        let range = if mode == 1 {
            (-1e-12, 1e-12)
        } else {
            self.eval_range()
        };

        let surface = self.surface.clone();
        self.coordinator.execute(
            session,
            |_, _, _| (),
            move |job| {
                // Screen Y grows downwards, world Y upwards.
                let p = Vec2::new(
                    view.min.x + job.pixel01.x * view.size().x,
                    view.max.y - job.pixel01.y * view.size().y,
                );
                let d = surface.evaluate(p);
                JobResult {
                    pixel: job.pixel,
                    color: Rgba8::gray(field_intensity(d, range.0, range.1)),
                    depth: f64::INFINITY,
                }
            },
        )?;

        if draw_boxes {
            let tree = self.surface_tree()?;
            let mut buffer = session.full_render.write().unwrap();
            overlay::draw_boxes_2d(&mut buffer, &tree.flatten_boxes_2d(), &view);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sdfscope_core::session::cancel_pair;
    use sdfscope_core::state::RenderState;
    use sdfscope_core::surface::nodes::Circle;
    use std::sync::RwLock;

    #[test]
    fn intensity_fixture_points() {
        assert_relative_eq!(field_intensity(0.0, -1.0, 1.0), 0.5);
        assert_relative_eq!(field_intensity(1.0, -1.0, 1.0), 1.0);
        assert_relative_eq!(field_intensity(-1.0, -1.0, 1.0), 0.0);
        assert_relative_eq!(field_intensity(0.5, -1.0, 1.0), 0.75);
        assert_relative_eq!(field_intensity(-0.5, -1.0, 1.0), 0.25);
    }

    #[test]
    fn intensity_clamps_out_of_range() {
        assert_relative_eq!(field_intensity(5.0, -1.0, 1.0), 1.0);
        assert_relative_eq!(field_intensity(-5.0, -1.0, 1.0), 0.0);
    }

    #[test]
    fn intensity_is_monotonic() {
        let mut last = f64::NEG_INFINITY;
        let mut d = -2.0;
        while d <= 2.0 {
            let v = field_intensity(d, -1.5, 0.75);
            assert!(v >= last);
            last = v;
            d += 0.01;
        }
    }

    #[test]
    fn aspect_growth_never_shrinks() {
        let square = Aabb2::from_center_size(Vec2::new(1.0, 2.0), Vec2::new(4.0, 4.0));
        let wide = grow_to_aspect(square, 200, 100);
        assert_relative_eq!(wide.size().x, 8.0);
        assert_relative_eq!(wide.size().y, 4.0);
        assert_eq!(wide.center(), square.center());

        let tall = grow_to_aspect(square, 100, 200);
        assert_relative_eq!(tall.size().x, 4.0);
        assert_relative_eq!(tall.size().y, 8.0);
    }

    #[test]
    fn circle_renders_dark_inside_light_outside() {
        let sampler = Field2Sampler::new(Arc::new(Circle::new(1.0)), Field2Config::default());
        let (_handle, token) = cancel_pair();
        let state = Arc::new(RwLock::new(RenderState::new_2d(Aabb2::from_center_size(
            Vec2::ZERO,
            Vec2::new(4.0, 4.0),
        ))));
        let mut session = Session::new(token, state, 64, 64);
        sampler.render(&mut session).unwrap();

        let buffer = session.full_render.read().unwrap();
        let center = buffer.pixel(32, 32);
        let corner = buffer.pixel(1, 1);
        assert!(center.r < 128, "inside must be dark, got {}", center.r);
        assert!(corner.r > 128, "outside must be light, got {}", corner.r);
    }

    #[test]
    fn mode_one_is_binary() {
        let sampler = Field2Sampler::new(Arc::new(Circle::new(1.0)), Field2Config::default());
        let (_handle, token) = cancel_pair();
        let state = Arc::new(RwLock::new(RenderState::new_2d(Aabb2::from_center_size(
            Vec2::ZERO,
            Vec2::new(4.0, 4.0),
        ))));
        state.write().unwrap().set_color_mode(1, 2);
        let mut session = Session::new(token, state, 64, 64);
        sampler.render(&mut session).unwrap();

        let buffer = session.full_render.read().unwrap();
        for y in 0..64 {
            for x in 0..64 {
                let v = buffer.pixel(x, y).r;
                assert!(v == 0 || v == 255, "mode 1 produced mid-gray {v}");
            }
        }
    }

    #[test]
    fn sampler_reports_its_contract() {
        let sampler = Field2Sampler::new(Arc::new(Circle::new(2.0)), Field2Config::default());
        assert_eq!(sampler.dimensions(), 2);
        assert_eq!(sampler.color_modes(), 2);
        let bb = sampler.bounding_box();
        assert_relative_eq!(bb.size().x, 4.0);
        assert!(bb.size().z < 0.01);
        assert_eq!(sampler.surface_tree().unwrap().node_count(), 1);
    }
}
