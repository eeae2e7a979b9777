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

//! 3D triangle-mesh rasterization.
//!
//! An alternative 3D strategy for surfaces that are cheaper to mesh once
//! than to sphere-trace per frame. The meshing algorithm itself is a
//! collaborator behind [`MeshSource`]; this module consumes its triangle
//! stream once, indexes and smooths the mesh, and then rasterizes it with a
//! software z-buffer on every frame. No partial frames are produced; the
//! whole frame arrives at once.

use crate::camera::CameraRig;
use crate::overlay;
use crate::sampler::PixelSampler;
use sdfscope_core::error::SurfaceTreeError;
use sdfscope_core::image::{DepthBuffer, ImageBuffer};
use sdfscope_core::math::{Aabb, Mat4, Rgba8, Vec3, FRAC_PI_2};
use sdfscope_core::session::Session;
use sdfscope_core::surface::{Sdf3, SurfaceRef};
use sdfscope_core::tree::SurfaceTree;
use sdfscope_core::RenderError;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// One triangle of a mesh stream, in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    /// First corner.
    pub a: Vec3,
    /// Second corner.
    pub b: Vec3,
    /// Third corner.
    pub c: Vec3,
}

/// A meshing collaborator: turns a signed-distance surface into a stream of
/// triangles at a given cell resolution.
///
/// The stream is a channel receiver so large meshers can produce triangles
/// incrementally from their own threads; the sampler drains it exactly once
/// and caches the indexed result.
pub trait MeshSource: Send + Sync {
    /// Streams the triangulation of `surface` at `cells` resolution.
    fn stream(&self, surface: Arc<dyn Sdf3>, cells: u32) -> flume::Receiver<Triangle>;
}

/// Tuning knobs of the mesh sampler.
#[derive(Debug, Clone, Copy)]
pub struct Mesh3Config {
    /// Cell resolution handed to the mesh source.
    pub cells: u32,
    /// Maximum dihedral angle (radians) across which vertex normals are
    /// smoothed; sharper creases keep faceted normals.
    pub smooth_angle: f64,
    /// Horizontal field of view in radians.
    pub fov_x: f64,
    /// Light direction for the Lambertian mode.
    pub light_dir: Vec3,
    /// Base color of lit surface pixels.
    pub surface_color: Rgba8,
    /// Background color.
    pub background: Rgba8,
    /// Line color of the wireframe mode.
    pub wire_color: Rgba8,
}

impl Default for Mesh3Config {
    fn default() -> Self {
        Self {
            cells: 64,
            smooth_angle: 30.0_f64.to_radians(),
            fov_x: FRAC_PI_2,
            light_dir: Vec3::new(-1.0, 1.0, -1.0).normalize(),
            surface_color: Rgba8::rgb(230, 230, 230),
            background: Rgba8::rgb(16, 16, 24),
            wire_color: Rgba8::rgb(240, 240, 60),
        }
    }
}

/// The shading seam of the rasterizer: one call per covered pixel.
pub trait FragmentShader: Send + Sync {
    /// Shades one fragment.
    fn shade(&self, fragment: &Fragment) -> Rgba8;
}

/// Everything interpolated for one covered pixel.
#[derive(Debug, Clone, Copy)]
pub struct Fragment {
    /// The perspective-correct interpolated (smoothed) normal.
    pub normal: Vec3,
    /// The view depth of the fragment.
    pub depth: f64,
    /// The smallest barycentric coordinate, 0 on a triangle edge.
    pub edge_distance: f64,
}

/// Two-sided Lambertian shading.
pub struct LambertShader {
    /// Base surface color.
    pub surface_color: Rgba8,
    /// Light direction (only the axis matters).
    pub light_dir: Vec3,
}

impl FragmentShader for LambertShader {
    fn shade(&self, fragment: &Fragment) -> Rgba8 {
        self.surface_color
            .scaled(fragment.normal.dot(self.light_dir).abs())
    }
}

/// Normal-as-RGB debug shading.
pub struct NormalShader;

impl FragmentShader for NormalShader {
    fn shade(&self, fragment: &Fragment) -> Rgba8 {
        Rgba8::rgb(
            (fragment.normal.x.abs() * 255.0) as u8,
            (fragment.normal.y.abs() * 255.0) as u8,
            (fragment.normal.z.abs() * 255.0) as u8,
        )
    }
}

/// Edge-only shading.
pub struct WireframeShader {
    /// Color of fragments on a triangle edge.
    pub line_color: Rgba8,
    /// Color of interior fragments.
    pub fill_color: Rgba8,
    /// Barycentric distance under which a fragment counts as an edge.
    pub threshold: f64,
}

impl FragmentShader for WireframeShader {
    fn shade(&self, fragment: &Fragment) -> Rgba8 {
        if fragment.edge_distance < self.threshold {
            self.line_color
        } else {
            self.fill_color
        }
    }
}

/// An indexed mesh with crease-aware per-corner normals.
struct Mesh {
    positions: Vec<Vec3>,
    faces: Vec<[u32; 3]>,
    corner_normals: Vec<[Vec3; 3]>,
}

/// Drains a triangle stream into an indexed mesh.
///
/// Vertices are deduplicated by exact bit pattern (mesh sources emit shared
/// corners bit-identically); per-corner normals average the normals of
/// adjacent faces whose dihedral angle stays under `smooth_angle`.
fn index_mesh(triangles: impl IntoIterator<Item = Triangle>, smooth_angle: f64) -> Mesh {
    let mut keys: HashMap<[u64; 3], u32> = HashMap::new();
    let mut positions: Vec<Vec3> = Vec::new();
    let mut faces: Vec<[u32; 3]> = Vec::new();

    let mut intern = |keys: &mut HashMap<[u64; 3], u32>, positions: &mut Vec<Vec3>, p: Vec3| {
        let key = [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()];
        *keys.entry(key).or_insert_with(|| {
            positions.push(p);
            positions.len() as u32 - 1
        })
    };

    for tri in triangles {
        let ia = intern(&mut keys, &mut positions, tri.a);
        let ib = intern(&mut keys, &mut positions, tri.b);
        let ic = intern(&mut keys, &mut positions, tri.c);
        faces.push([ia, ib, ic]);
    }

    let face_normals: Vec<Vec3> = faces
        .iter()
        .map(|f| {
            let [a, b, c] = f.map(|i| positions[i as usize]);
            let n = (b - a).cross(c - a).normalize();
            if n == Vec3::ZERO {
                Vec3::Z
            } else {
                n
            }
        })
        .collect();

    let mut vertex_faces: Vec<Vec<u32>> = vec![Vec::new(); positions.len()];
    for (fi, face) in faces.iter().enumerate() {
        for &vi in face {
            vertex_faces[vi as usize].push(fi as u32);
        }
    }

    let cos_threshold = smooth_angle.cos();
    let corner_normals = faces
        .iter()
        .enumerate()
        .map(|(fi, face)| {
            face.map(|vi| {
                let own = face_normals[fi];
                let mut sum = Vec3::ZERO;
                for &other in &vertex_faces[vi as usize] {
                    let n = face_normals[other as usize];
                    if n.dot(own) >= cos_threshold {
                        sum = sum + n;
                    }
                }
                let n = sum.normalize();
                if n == Vec3::ZERO {
                    own
                } else {
                    n
                }
            })
        })
        .collect();

    Mesh {
        positions,
        faces,
        corner_normals,
    }
}

/// Renders a 3D surface by meshing it once and rasterizing the mesh.
pub struct Mesh3Sampler {
    surface: Arc<dyn Sdf3>,
    source: Arc<dyn MeshSource>,
    config: Mesh3Config,
    mesh: OnceLock<Mesh>,
    tree: OnceLock<Result<Arc<SurfaceTree>, SurfaceTreeError>>,
}

impl Mesh3Sampler {
    /// Creates a sampler over a 3D surface and a meshing collaborator.
    pub fn new(surface: Arc<dyn Sdf3>, source: Arc<dyn MeshSource>, config: Mesh3Config) -> Self {
        Self {
            surface,
            source,
            config,
            mesh: OnceLock::new(),
            tree: OnceLock::new(),
        }
    }

    fn mesh(&self) -> &Mesh {
        self.mesh.get_or_init(|| {
            let rx = self.source.stream(self.surface.clone(), self.config.cells);
            let mesh = index_mesh(rx.iter(), self.config.smooth_angle);
            log::debug!(
                "meshed surface: {} vertices, {} faces",
                mesh.positions.len(),
                mesh.faces.len()
            );
            mesh
        })
    }

    fn render_inner(&self, session: &Session) -> Result<(), RenderError> {
        let (width, height) = session.render_size();
        let state = session.state_snapshot();
        let bb = self.surface.bounding_box();
        let rig = CameraRig::new(&state, width, height, self.config.fov_x, &bb);

        let up = rig.rotation.mul_dir(Vec3::Z);
        let view = Mat4::look_at_rh(rig.position, state.cam_center, up).ok_or_else(|| {
            RenderError::InvalidConfig("degenerate camera: eye coincides with pivot".into())
        })?;
        let far = (state.cam_dist + bb.size().length() * 2.0).max(1e-3);
        let near = (state.cam_dist / 1000.0).max(far * 1e-6);
        let fov_y = 2.0 * rig.tan_y.atan();
        let aspect = f64::from(width.max(1)) / f64::from(height.max(1));
        let view_proj = Mat4::perspective_rh_zo(fov_y, aspect, near, far) * view;

        let shader: Box<dyn FragmentShader> = match state.color_mode() {
            0 => Box::new(LambertShader {
                surface_color: self.config.surface_color,
                light_dir: self.config.light_dir,
            }),
            1 => Box::new(NormalShader),
            _ => Box::new(WireframeShader {
                line_color: self.config.wire_color,
                fill_color: self.config.background,
                threshold: 0.04,
            }),
        };

        let mut color = ImageBuffer::new(width, height);
        for y in 0..height {
            for x in 0..width {
                color.set_pixel(x, y, self.config.background);
            }
        }
        let mut depth = DepthBuffer::new(width, height);

        let mesh = self.mesh();
        for (fi, face) in mesh.faces.iter().enumerate() {
            if fi % 1024 == 0 && session.cancel.is_cancelled() {
                return Err(RenderError::Cancelled);
            }
            rasterize_face(
                &mut color,
                &mut depth,
                &rig,
                &view_proj,
                mesh,
                fi,
                face,
                shader.as_ref(),
            );
        }

        if state.draw_boxes {
            let tree = self.surface_tree()?;
            overlay::draw_boxes_3d(&mut color, &depth, &tree.flatten_boxes(), &rig);
        }

        *session.full_render.write().unwrap() = color;
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
fn rasterize_face(
    color: &mut ImageBuffer,
    depth: &mut DepthBuffer,
    rig: &CameraRig,
    view_proj: &Mat4,
    mesh: &Mesh,
    fi: usize,
    face: &[u32; 3],
    shader: &dyn FragmentShader,
) {
    let positions = face.map(|i| mesh.positions[i as usize]);
    let normals = mesh.corner_normals[fi];

    // Crude near clipping: drop faces with any corner behind the camera.
    let mut screen = [(0.0, 0.0); 3];
    let mut inv_w = [0.0; 3];
    let mut view_depth = [0.0; 3];
    for k in 0..3 {
        let (clip, w) = view_proj.mul_point_w(positions[k]);
        if w <= 1e-9 {
            return;
        }
        screen[k] = (
            (clip.x / w + 1.0) * 0.5 * f64::from(color.width()),
            (1.0 - clip.y / w) * 0.5 * f64::from(color.height()),
        );
        inv_w[k] = 1.0 / w;
        view_depth[k] = rig.view_depth(positions[k]);
    }

    let edge = |a: (f64, f64), b: (f64, f64), p: (f64, f64)| {
        (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0)
    };
    let area = edge(screen[0], screen[1], screen[2]);
    if area.abs() < 1e-12 {
        return;
    }

    let min_x = screen.iter().map(|s| s.0).fold(f64::INFINITY, f64::min);
    let max_x = screen.iter().map(|s| s.0).fold(f64::NEG_INFINITY, f64::max);
    let min_y = screen.iter().map(|s| s.1).fold(f64::INFINITY, f64::min);
    let max_y = screen.iter().map(|s| s.1).fold(f64::NEG_INFINITY, f64::max);
    let x0 = min_x.floor().max(0.0) as u32;
    let x1 = (max_x.ceil() as i64).clamp(0, i64::from(color.width()) - 1) as u32;
    let y0 = min_y.floor().max(0.0) as u32;
    let y1 = (max_y.ceil() as i64).clamp(0, i64::from(color.height()) - 1) as u32;

    for py in y0..=y1 {
        for px in x0..=x1 {
            let p = (f64::from(px) + 0.5, f64::from(py) + 0.5);
            // Barycentric weights, normalized by the signed area so both
            // winding orders rasterize.
            let b0 = edge(screen[1], screen[2], p) / area;
            let b1 = edge(screen[2], screen[0], p) / area;
            let b2 = edge(screen[0], screen[1], p) / area;
            if b0 < 0.0 || b1 < 0.0 || b2 < 0.0 {
                continue;
            }
            let denom = b0 * inv_w[0] + b1 * inv_w[1] + b2 * inv_w[2];
            if denom <= 0.0 {
                continue;
            }
            let d = (b0 * view_depth[0] * inv_w[0]
                + b1 * view_depth[1] * inv_w[1]
                + b2 * view_depth[2] * inv_w[2])
                / denom;
            if d >= depth.get(px, py) {
                continue;
            }
            let n = ((normals[0] * (b0 * inv_w[0])
                + normals[1] * (b1 * inv_w[1])
                + normals[2] * (b2 * inv_w[2]))
                / denom)
                .normalize();
            let fragment = Fragment {
                normal: n,
                depth: d,
                edge_distance: b0.min(b1).min(b2),
            };
            depth.set(px, py, d);
            color.set_pixel(px, py, shader.shade(&fragment));
        }
    }
}

impl PixelSampler for Mesh3Sampler {
    fn dimensions(&self) -> u32 {
        3
    }

    fn bounding_box(&self) -> Aabb {
        self.surface.bounding_box()
    }

    fn color_modes(&self) -> u32 {
        3
    }

    fn surface_tree(&self) -> Result<Arc<SurfaceTree>, SurfaceTreeError> {
        self.tree
            .get_or_init(|| {
                SurfaceTree::build(&SurfaceRef::Three(self.surface.clone())).map(Arc::new)
            })
            .clone()
    }

    fn render(&self, session: &mut Session) -> Result<(), RenderError> {
        let result = self.render_inner(session);
        // Rasterization delivers no partials; the mailbox still closes so
        // consumers observe completion.
        if let Some(partials) = session.partials.as_mut() {
            partials.close();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sdfscope_core::mailbox::partial_frames;
    use sdfscope_core::session::cancel_pair;
    use sdfscope_core::state::RenderState;
    use sdfscope_core::surface::nodes::Cuboid;
    use std::sync::RwLock;

    /// A stub source that ignores the surface and emits a fixed list.
    struct FixedSource(Vec<Triangle>);

    impl MeshSource for FixedSource {
        fn stream(&self, _surface: Arc<dyn Sdf3>, _cells: u32) -> flume::Receiver<Triangle> {
            let (tx, rx) = flume::unbounded();
            for tri in &self.0 {
                let _ = tx.send(*tri);
            }
            rx
        }
    }

    fn quad() -> Vec<Triangle> {
        // A unit quad in the y = 0 plane, split along one diagonal.
        let v = [
            Vec3::new(-1.0, 0.0, -1.0),
            Vec3::new(1.0, 0.0, -1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(-1.0, 0.0, 1.0),
        ];
        vec![
            Triangle {
                a: v[0],
                b: v[1],
                c: v[2],
            },
            Triangle {
                a: v[0],
                b: v[2],
                c: v[3],
            },
        ]
    }

    fn quad_sampler() -> Mesh3Sampler {
        Mesh3Sampler::new(
            Arc::new(Cuboid::new(Vec3::ONE * 2.0)),
            Arc::new(FixedSource(quad())),
            Mesh3Config::default(),
        )
    }

    fn frontal_session(sampler: &Mesh3Sampler) -> (sdfscope_core::session::CancelHandle, Session) {
        let (handle, token) = cancel_pair();
        let mut state = RenderState::new_3d(&sampler.bounding_box());
        state.cam_yaw = 0.0;
        state.cam_pitch = 0.0;
        state.cam_dist = 5.0;
        let state = Arc::new(RwLock::new(state));
        (handle, Session::new(token, state, 64, 64))
    }

    #[test]
    fn shared_quad_vertices_are_deduplicated() {
        let mesh = index_mesh(quad(), 30.0_f64.to_radians());
        assert_eq!(mesh.positions.len(), 4);
        assert_eq!(mesh.faces.len(), 2);
    }

    #[test]
    fn coplanar_faces_share_smoothed_normals() {
        let mesh = index_mesh(quad(), 30.0_f64.to_radians());
        for corners in &mesh.corner_normals {
            for n in corners {
                assert_relative_eq!(n.y.abs(), 1.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn sharp_creases_stay_faceted() {
        // Two faces meeting at 90 degrees along the z-axis edge.
        let fold = vec![
            Triangle {
                a: Vec3::ZERO,
                b: Vec3::new(1.0, 0.0, 0.0),
                c: Vec3::new(0.0, 0.0, 1.0),
            },
            Triangle {
                a: Vec3::ZERO,
                b: Vec3::new(0.0, 0.0, 1.0),
                c: Vec3::new(0.0, 1.0, 0.0),
            },
        ];
        let faceted = index_mesh(fold.clone(), 30.0_f64.to_radians());
        // The shared edge keeps each face's own normal.
        let n0 = faceted.corner_normals[0][0];
        let n1 = faceted.corner_normals[1][0];
        assert!(n0.dot(n1).abs() < 1e-9, "90-degree fold must not smooth");

        let smoothed = index_mesh(fold, 120.0_f64.to_radians());
        let s0 = smoothed.corner_normals[0][0];
        let s1 = smoothed.corner_normals[1][0];
        assert_relative_eq!(s0.dot(s1), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn quad_renders_in_front_of_background() {
        let sampler = quad_sampler();
        let (_handle, mut session) = frontal_session(&sampler);
        sampler.render(&mut session).unwrap();
        let buffer = session.full_render.read().unwrap();
        let center = buffer.pixel(32, 32);
        let corner = buffer.pixel(0, 0);
        assert_ne!(center, sampler.config.background);
        assert_eq!(corner, sampler.config.background);
    }

    #[test]
    fn mailbox_closes_without_partials() {
        let sampler = quad_sampler();
        let (_handle, mut session) = frontal_session(&sampler);
        let (tx, rx) = partial_frames();
        session.partials = Some(tx);
        sampler.render(&mut session).unwrap();
        assert!(rx.recv().is_none());
        assert!(rx.is_closed());
    }

    #[test]
    fn cancelled_session_surfaces() {
        let sampler = quad_sampler();
        let (mut handle, mut session) = frontal_session(&sampler);
        handle.cancel();
        assert_eq!(
            sampler.render(&mut session),
            Err(RenderError::Cancelled)
        );
    }

    #[test]
    fn wireframe_shader_separates_edges_from_fill() {
        let shader = WireframeShader {
            line_color: Rgba8::WHITE,
            fill_color: Rgba8::BLACK,
            threshold: 0.04,
        };
        let edge = Fragment {
            normal: Vec3::Z,
            depth: 1.0,
            edge_distance: 0.0,
        };
        let fill = Fragment {
            edge_distance: 0.3,
            ..edge
        };
        assert_eq!(shader.shade(&edge), Rgba8::WHITE);
        assert_eq!(shader.shade(&fill), Rgba8::BLACK);
    }

    #[test]
    fn sampler_reports_three_modes() {
        let sampler = quad_sampler();
        assert_eq!(sampler.dimensions(), 3);
        assert_eq!(sampler.color_modes(), 3);
    }
}
