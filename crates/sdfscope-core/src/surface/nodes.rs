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

//! Concrete surface nodes: the wrappers the renderers install plus a small
//! set of primitives and combinators for demo scenes and tests.

use super::{NodeKind, Sdf2, Sdf3, SurfaceRef};
use crate::math::{Aabb, Aabb2, Vec2, Vec3};
use std::sync::Arc;

// --- 2D primitives ---

/// A circle of the given radius, centered at the origin.
#[derive(Debug, Clone, Copy)]
pub struct Circle {
    radius: f64,
}

impl Circle {
    /// Creates a circle with the given radius.
    pub fn new(radius: f64) -> Self {
        Self { radius }
    }
}

impl Sdf2 for Circle {
    fn evaluate(&self, p: Vec2) -> f64 {
        p.length() - self.radius
    }

    fn bounding_box(&self) -> Aabb2 {
        Aabb2::from_center_size(Vec2::ZERO, Vec2::ONE * (self.radius * 2.0))
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Primitive
    }
}

/// An axis-aligned rectangle centered at the origin.
#[derive(Debug, Clone, Copy)]
pub struct Rect {
    half: Vec2,
}

impl Rect {
    /// Creates a rectangle with the given full size.
    pub fn new(size: Vec2) -> Self {
        Self { half: size * 0.5 }
    }
}

impl Sdf2 for Rect {
    fn evaluate(&self, p: Vec2) -> f64 {
        let d = p.abs() - self.half;
        let outside = d.max_each(Vec2::ZERO).length();
        let inside = d.x.max(d.y).min(0.0);
        outside + inside
    }

    fn bounding_box(&self) -> Aabb2 {
        Aabb2::from_center_size(Vec2::ZERO, self.half * 2.0)
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Primitive
    }
}

// --- 3D primitives ---

/// A sphere of the given radius, centered at the origin.
#[derive(Debug, Clone, Copy)]
pub struct Sphere {
    radius: f64,
}

impl Sphere {
    /// Creates a sphere with the given radius.
    pub fn new(radius: f64) -> Self {
        Self { radius }
    }
}

impl Sdf3 for Sphere {
    fn evaluate(&self, p: Vec3) -> f64 {
        p.length() - self.radius
    }

    fn bounding_box(&self) -> Aabb {
        Aabb::from_center_size(Vec3::ZERO, Vec3::ONE * (self.radius * 2.0))
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Primitive
    }
}

/// An axis-aligned box centered at the origin.
#[derive(Debug, Clone, Copy)]
pub struct Cuboid {
    half: Vec3,
}

impl Cuboid {
    /// Creates a box with the given full size.
    pub fn new(size: Vec3) -> Self {
        Self { half: size * 0.5 }
    }
}

impl Sdf3 for Cuboid {
    fn evaluate(&self, p: Vec3) -> f64 {
        let d = p.abs() - self.half;
        let outside = d.max_each(Vec3::ZERO).length();
        let inside = d.x.max(d.y).max(d.z).min(0.0);
        outside + inside
    }

    fn bounding_box(&self) -> Aabb {
        Aabb::from_center_size(Vec3::ZERO, self.half * 2.0)
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Primitive
    }
}

// --- Boolean combinators ---

/// The union of two 2D surfaces.
pub struct Union2 {
    a: Arc<dyn Sdf2>,
    b: Arc<dyn Sdf2>,
}

impl Union2 {
    /// Combines two surfaces.
    pub fn new(a: Arc<dyn Sdf2>, b: Arc<dyn Sdf2>) -> Self {
        Self { a, b }
    }
}

impl Sdf2 for Union2 {
    fn evaluate(&self, p: Vec2) -> f64 {
        self.a.evaluate(p).min(self.b.evaluate(p))
    }

    fn bounding_box(&self) -> Aabb2 {
        let a = self.a.bounding_box();
        let b = self.b.bounding_box();
        Aabb2::from_min_max(a.min.min_each(b.min), a.max.max_each(b.max))
    }

    fn kind(&self) -> NodeKind {
        NodeKind::BooleanOp
    }

    fn children(&self) -> Vec<SurfaceRef> {
        vec![
            SurfaceRef::Two(self.a.clone()),
            SurfaceRef::Two(self.b.clone()),
        ]
    }
}

/// The union of two 3D surfaces.
pub struct Union3 {
    a: Arc<dyn Sdf3>,
    b: Arc<dyn Sdf3>,
}

impl Union3 {
    /// Combines two surfaces.
    pub fn new(a: Arc<dyn Sdf3>, b: Arc<dyn Sdf3>) -> Self {
        Self { a, b }
    }
}

impl Sdf3 for Union3 {
    fn evaluate(&self, p: Vec3) -> f64 {
        self.a.evaluate(p).min(self.b.evaluate(p))
    }

    fn bounding_box(&self) -> Aabb {
        self.a.bounding_box().merge(&self.b.bounding_box())
    }

    fn kind(&self) -> NodeKind {
        NodeKind::BooleanOp
    }

    fn children(&self) -> Vec<SurfaceRef> {
        vec![
            SurfaceRef::Three(self.a.clone()),
            SurfaceRef::Three(self.b.clone()),
        ]
    }
}

// --- Transforms ---

/// A translated 2D surface.
pub struct Translate2 {
    inner: Arc<dyn Sdf2>,
    offset: Vec2,
}

impl Translate2 {
    /// Translates `inner` by `offset`.
    pub fn new(inner: Arc<dyn Sdf2>, offset: Vec2) -> Self {
        Self { inner, offset }
    }
}

impl Sdf2 for Translate2 {
    fn evaluate(&self, p: Vec2) -> f64 {
        self.inner.evaluate(p - self.offset)
    }

    fn bounding_box(&self) -> Aabb2 {
        let bb = self.inner.bounding_box();
        Aabb2 {
            min: bb.min + self.offset,
            max: bb.max + self.offset,
        }
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Transform
    }

    fn children(&self) -> Vec<SurfaceRef> {
        vec![SurfaceRef::Two(self.inner.clone())]
    }
}

/// A translated 3D surface.
pub struct Translate3 {
    inner: Arc<dyn Sdf3>,
    offset: Vec3,
}

impl Translate3 {
    /// Translates `inner` by `offset`.
    pub fn new(inner: Arc<dyn Sdf3>, offset: Vec3) -> Self {
        Self { inner, offset }
    }
}

impl Sdf3 for Translate3 {
    fn evaluate(&self, p: Vec3) -> f64 {
        self.inner.evaluate(p - self.offset)
    }

    fn bounding_box(&self) -> Aabb {
        let bb = self.inner.bounding_box();
        Aabb {
            min: bb.min + self.offset,
            max: bb.max + self.offset,
        }
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Transform
    }

    fn children(&self) -> Vec<SurfaceRef> {
        vec![SurfaceRef::Three(self.inner.clone())]
    }
}

/// A uniformly scaled 3D surface.
///
/// Distances scale with the geometry, so the field stays a true signed
/// distance.
pub struct UniformScale3 {
    inner: Arc<dyn Sdf3>,
    factor: f64,
}

impl UniformScale3 {
    /// Scales `inner` by `factor` around the origin.
    pub fn new(inner: Arc<dyn Sdf3>, factor: f64) -> Self {
        Self { inner, factor }
    }
}

impl Sdf3 for UniformScale3 {
    fn evaluate(&self, p: Vec3) -> f64 {
        self.inner.evaluate(p / self.factor) * self.factor
    }

    fn bounding_box(&self) -> Aabb {
        let bb = self.inner.bounding_box();
        Aabb::from_min_max(bb.min * self.factor, bb.max * self.factor)
    }

    fn kind(&self) -> NodeKind {
        NodeKind::UniformScale
    }

    fn children(&self) -> Vec<SurfaceRef> {
        vec![SurfaceRef::Three(self.inner.clone())]
    }
}

// --- 2D-to-3D lifts ---

/// A 2D profile extruded symmetrically along Z.
pub struct Extrude {
    profile: Arc<dyn Sdf2>,
    height: f64,
}

impl Extrude {
    /// Extrudes `profile` to the given total height.
    pub fn new(profile: Arc<dyn Sdf2>, height: f64) -> Self {
        Self { profile, height }
    }
}

impl Sdf3 for Extrude {
    fn evaluate(&self, p: Vec3) -> f64 {
        let d_profile = self.profile.evaluate(p.xy());
        let d_z = p.z.abs() - self.height * 0.5;
        let w = Vec2::new(d_profile, d_z);
        w.x.max(w.y).min(0.0) + w.max_each(Vec2::ZERO).length()
    }

    fn bounding_box(&self) -> Aabb {
        let bb = self.profile.bounding_box();
        Aabb {
            min: Vec3::new(bb.min.x, bb.min.y, -self.height * 0.5),
            max: Vec3::new(bb.max.x, bb.max.y, self.height * 0.5),
        }
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Extrude
    }

    fn children(&self) -> Vec<SurfaceRef> {
        vec![SurfaceRef::Two(self.profile.clone())]
    }
}

/// A 2D profile revolved around the Z axis.
///
/// The profile's X axis becomes the radial distance and its Y axis becomes Z.
pub struct Revolve {
    profile: Arc<dyn Sdf2>,
}

impl Revolve {
    /// Revolves `profile` around Z.
    pub fn new(profile: Arc<dyn Sdf2>) -> Self {
        Self { profile }
    }
}

impl Sdf3 for Revolve {
    fn evaluate(&self, p: Vec3) -> f64 {
        let radial = p.xy().length();
        self.profile.evaluate(Vec2::new(radial, p.z))
    }

    fn bounding_box(&self) -> Aabb {
        let bb = self.profile.bounding_box();
        let r = bb.min.x.abs().max(bb.max.x.abs());
        Aabb {
            min: Vec3::new(-r, -r, bb.min.y),
            max: Vec3::new(r, r, bb.max.y),
        }
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Revolve
    }

    fn children(&self) -> Vec<SurfaceRef> {
        vec![SurfaceRef::Two(self.profile.clone())]
    }
}

// --- Coordinate wrappers ---

/// A wrapper exchanging the Y and Z axes of a 3D surface.
///
/// Installed by the renderers when the caller prefers a Y-up convention.
pub struct SwapYz {
    inner: Arc<dyn Sdf3>,
}

impl SwapYz {
    /// Wraps `inner`.
    pub fn new(inner: Arc<dyn Sdf3>) -> Self {
        Self { inner }
    }
}

impl Sdf3 for SwapYz {
    fn evaluate(&self, p: Vec3) -> f64 {
        self.inner.evaluate(Vec3::new(p.x, p.z, p.y))
    }

    fn bounding_box(&self) -> Aabb {
        let bb = self.inner.bounding_box();
        Aabb::from_min_max(
            Vec3::new(bb.min.x, bb.min.z, bb.min.y),
            Vec3::new(bb.max.x, bb.max.z, bb.max.y),
        )
    }

    fn kind(&self) -> NodeKind {
        NodeKind::SwapAxes
    }

    fn children(&self) -> Vec<SurfaceRef> {
        vec![SurfaceRef::Three(self.inner.clone())]
    }
}

/// A wrapper mirroring the Z axis of a 3D surface.
///
/// The 3D renderers evaluate through this wrapper so that Z+ in model space
/// points up on screen.
pub struct InvertZ {
    inner: Arc<dyn Sdf3>,
}

impl InvertZ {
    /// Wraps `inner`.
    pub fn new(inner: Arc<dyn Sdf3>) -> Self {
        Self { inner }
    }
}

impl Sdf3 for InvertZ {
    fn evaluate(&self, p: Vec3) -> f64 {
        self.inner.evaluate(Vec3::new(p.x, p.y, -p.z))
    }

    fn bounding_box(&self) -> Aabb {
        let bb = self.inner.bounding_box();
        Aabb::from_min_max(
            Vec3::new(bb.min.x, bb.min.y, -bb.min.z),
            Vec3::new(bb.max.x, bb.max.y, -bb.max.z),
        )
    }

    fn kind(&self) -> NodeKind {
        NodeKind::InvertAxis
    }

    fn children(&self) -> Vec<SurfaceRef> {
        vec![SurfaceRef::Three(self.inner.clone())]
    }
}
