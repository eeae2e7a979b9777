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

//! 3D sphere-traced raycasting.
//!
//! Each pixel marches a ray through the signed-distance field, stepping by
//! the field value itself (the field is a lower bound on the distance to
//! the surface). Hits are shaded from a finite-difference normal; rays that
//! exhaust their step budget before converging shade a distinct alert color
//! so tuning problems are visible instead of silently wrong.

use crate::camera::CameraRig;
use crate::coordinator::{Coordinator, JobResult};
use crate::overlay;
use crate::sampler::PixelSampler;
use sdfscope_core::error::SurfaceTreeError;
use sdfscope_core::math::{Aabb, Rgba8, Vec3, FRAC_PI_2};
use sdfscope_core::session::Session;
use sdfscope_core::surface::nodes::{InvertZ, SwapYz};
use sdfscope_core::surface::{Sdf3, SurfaceRef};
use sdfscope_core::tree::SurfaceTree;
use sdfscope_core::RenderError;
use std::sync::{Arc, OnceLock};

/// Tuning knobs of the raycaster.
#[derive(Debug, Clone, Copy)]
pub struct RayConfig {
    /// Horizontal field of view in radians.
    pub fov_x: f64,
    /// Fraction of the field value marched per step.
    pub step_scale: f64,
    /// Convergence distance: the march stops when `|d|` drops below this.
    pub epsilon: f64,
    /// Step budget per ray.
    pub max_steps: u32,
    /// Total width of the finite-difference normal stencil.
    pub normal_eps: f64,
    /// Light direction (two opposing lights, so only the axis matters).
    pub light_dir: Vec3,
    /// Base color of lit surface pixels.
    pub surface_color: Rgba8,
    /// Color of rays that leave the travel budget.
    pub background: Rgba8,
    /// Color of rays that exhaust the step budget without converging.
    pub alert: Rgba8,
    /// Treat the surface's Y axis as up instead of Z.
    pub y_up: bool,
}

impl Default for RayConfig {
    fn default() -> Self {
        Self {
            fov_x: FRAC_PI_2,
            step_scale: 1.0,
            epsilon: 0.1,
            max_steps: 100,
            normal_eps: 1e-4,
            light_dir: Vec3::new(-1.0, 1.0, -1.0).normalize(),
            surface_color: Rgba8::rgb(230, 230, 230),
            background: Rgba8::rgb(16, 16, 24),
            alert: Rgba8::rgb(255, 0, 96),
            y_up: false,
        }
    }
}

/// Renders a 3D signed-distance field by sphere tracing.
pub struct Raycast3Sampler {
    surface: Arc<dyn Sdf3>,
    config: RayConfig,
    coordinator: Coordinator,
    tree: OnceLock<Result<Arc<SurfaceTree>, SurfaceTreeError>>,
}

impl Raycast3Sampler {
    /// Creates a sampler over a 3D surface.
    ///
    /// The surface is wrapped so the camera frame renders Z-up; with
    /// [`RayConfig::y_up`] the surface's Y axis is swapped into that role
    /// first.
    pub fn new(surface: Arc<dyn Sdf3>, config: RayConfig) -> Self {
        let oriented: Arc<dyn Sdf3> = if config.y_up {
            Arc::new(InvertZ::new(Arc::new(SwapYz::new(surface))))
        } else {
            Arc::new(InvertZ::new(surface))
        };
        Self {
            surface: oriented,
            config,
            coordinator: Coordinator::new(),
            tree: OnceLock::new(),
        }
    }
}

enum Trace {
    Hit(Vec3),
    Escaped,
    Exhausted,
}

fn trace(surface: &dyn Sdf3, cfg: &RayConfig, origin: Vec3, dir: Vec3, max_ray: f64) -> Trace {
    let mut travel = 0.0;
    for _ in 0..cfg.max_steps {
        let p = origin + dir * travel;
        let d = surface.evaluate(p);
        if d.abs() < cfg.epsilon {
            return Trace::Hit(p);
        }
        travel += d.abs() * cfg.step_scale;
        if travel > max_ray {
            return Trace::Escaped;
        }
    }
    Trace::Exhausted
}

/// Symmetric finite-difference surface normal.
fn field_normal(surface: &dyn Sdf3, p: Vec3, eps: f64) -> Vec3 {
    let h = eps * 0.5;
    Vec3::new(
        surface.evaluate(p + Vec3::X * h) - surface.evaluate(p - Vec3::X * h),
        surface.evaluate(p + Vec3::Y * h) - surface.evaluate(p - Vec3::Y * h),
        surface.evaluate(p + Vec3::Z * h) - surface.evaluate(p - Vec3::Z * h),
    )
    .normalize()
}

fn shade(cfg: &RayConfig, normal: Vec3, mode: u32) -> Rgba8 {
    match mode {
        // Two opposing lights: the absolute value lights back faces too.
        0 => cfg.surface_color.scaled(normal.dot(cfg.light_dir).abs()),
        _ => Rgba8::rgb(
            (normal.x.abs() * 255.0) as u8,
            (normal.y.abs() * 255.0) as u8,
            (normal.z.abs() * 255.0) as u8,
        ),
    }
}

impl PixelSampler for Raycast3Sampler {
    fn dimensions(&self) -> u32 {
        3
    }

    fn bounding_box(&self) -> Aabb {
        self.surface.bounding_box()
    }

    fn color_modes(&self) -> u32 {
        2
    }

    fn surface_tree(&self) -> Result<Arc<SurfaceTree>, SurfaceTreeError> {
        self.tree
            .get_or_init(|| {
                SurfaceTree::build(&SurfaceRef::Three(self.surface.clone())).map(Arc::new)
            })
            .clone()
    }

    fn render(&self, session: &mut Session) -> Result<(), RenderError> {
        let (width, height) = session.render_size();
        let (rig, mode, draw_boxes) = {
            let state = session.state.read().unwrap();
            (
                Arc::new(CameraRig::new(
                    &state,
                    width,
                    height,
                    self.config.fov_x,
                    &self.surface.bounding_box(),
                )),
                state.color_mode(),
                state.draw_boxes,
            )
        };

        let surface = self.surface.clone();
        let cfg = self.config;
        let depth = self.coordinator.execute(
            session,
            |_, _, _| rig.clone(),
            move |job| {
                let rig = &job.payload;
                let (origin, dir) = rig.pixel_ray(job.pixel01);
                let (color, depth) = match trace(&*surface, &cfg, origin, dir, rig.max_ray) {
                    Trace::Hit(point) => {
                        let n = field_normal(&*surface, point, cfg.normal_eps);
                        (shade(&cfg, n, mode), rig.view_depth(point))
                    }
                    Trace::Escaped => (cfg.background, f64::INFINITY),
                    Trace::Exhausted => (cfg.alert, f64::INFINITY),
                };
                JobResult {
                    pixel: job.pixel,
                    color,
                    depth,
                }
            },
        )?;

        if draw_boxes {
            let tree = self.surface_tree()?;
            let mut buffer = session.full_render.write().unwrap();
            overlay::draw_boxes_3d(&mut buffer, &depth, &tree.flatten_boxes(), &rig);
        }
        Ok(())
    }
}
