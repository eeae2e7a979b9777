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

//! Provides axis-aligned bounding boxes and ray/box clipping.

use super::vector::{Vec2, Vec3};
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Represents an Axis-Aligned Bounding Box (AABB) in 3D.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize, Encode, Decode,
)]
#[repr(C)]
pub struct Aabb {
    /// The corner of the box with the smallest coordinates on all axes.
    pub min: Vec3,
    /// The corner of the box with the largest coordinates on all axes.
    pub max: Vec3,
}

impl Aabb {
    /// An invalid `Aabb` useful as a neutral starting point for merging.
    pub const INVALID: Self = Self {
        min: Vec3 {
            x: f64::INFINITY,
            y: f64::INFINITY,
            z: f64::INFINITY,
        },
        max: Vec3 {
            x: f64::NEG_INFINITY,
            y: f64::NEG_INFINITY,
            z: f64::NEG_INFINITY,
        },
    };

    /// Creates a new `Aabb` from two corner points, reordering components so
    /// that `min` holds the component-wise minimum.
    #[inline]
    pub fn from_min_max(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min_each(b),
            max: a.max_each(b),
        }
    }

    /// Creates a new `Aabb` from a center point and a full size.
    #[inline]
    pub fn from_center_size(center: Vec3, size: Vec3) -> Self {
        let half = size * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Returns the center point of the box.
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Returns the full size of the box.
    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Checks whether a point lies inside the box (inclusive bounds).
    #[inline]
    pub fn contains_point(&self, p: Vec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Returns the smallest box enclosing both `self` and `other`.
    #[inline]
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            min: self.min.min_each(other.min),
            max: self.max.max_each(other.max),
        }
    }

    /// Returns the eight corner points of the box.
    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// Returns the XY footprint of the box.
    #[inline]
    pub fn to_aabb2(&self) -> Aabb2 {
        Aabb2 {
            min: self.min.xy(),
            max: self.max.xy(),
        }
    }
}

/// Represents an axis-aligned bounding rectangle in 2D.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize, Encode, Decode,
)]
#[repr(C)]
pub struct Aabb2 {
    /// The corner with the smallest coordinates on both axes.
    pub min: Vec2,
    /// The corner with the largest coordinates on both axes.
    pub max: Vec2,
}

impl Aabb2 {
    /// Creates a new `Aabb2` from two corner points, reordering components.
    #[inline]
    pub fn from_min_max(a: Vec2, b: Vec2) -> Self {
        Self {
            min: a.min_each(b),
            max: a.max_each(b),
        }
    }

    /// Creates a new `Aabb2` from a center point and a full size.
    #[inline]
    pub fn from_center_size(center: Vec2, size: Vec2) -> Self {
        let half = size * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Returns the center point of the rectangle.
    #[inline]
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Returns the full size of the rectangle.
    #[inline]
    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    /// Promotes the rectangle to a 3D box of `±thickness` around `z = 0`.
    ///
    /// Mixed 2D/3D surface trees cache 3D boxes everywhere; 2D nodes get a
    /// near-degenerate slab so they remain drawable in a 3D overlay.
    #[inline]
    pub fn to_aabb(&self, thickness: f64) -> Aabb {
        Aabb {
            min: Vec3::new(self.min.x, self.min.y, -thickness),
            max: Vec3::new(self.max.x, self.max.y, thickness),
        }
    }
}

/// Returns the travel distance along a normalized ray to an axis-aligned box.
///
/// Slab intersection. The returned distance is `tmax` (the exit distance)
/// when the origin is inside the box or the whole box is behind the ray;
/// otherwise it is `tmin` (the entry distance). A no-forward-hit therefore
/// comes back negative, which callers use as a "best guess" clip length, the
/// same contract the raycaster's travel budget is derived from.
pub fn ray_box_travel(origin: Vec3, dir: Vec3, bb: &Aabb) -> f64 {
    // Assumes `dir` is normalized. Infinities from zero components resolve
    // correctly through the min/max folding below.
    let inv = Vec3::new(1.0 / dir.x, 1.0 / dir.y, 1.0 / dir.z);
    let t_a = (bb.min - origin).mul_each(inv);
    let t_b = (bb.max - origin).mul_each(inv);
    let lo = t_a.min_each(t_b);
    let hi = t_a.max_each(t_b);
    let tmin = lo.x.max(lo.y).max(lo.z);
    let tmax = hi.x.min(hi.y).min(hi.z);
    if tmax < 0.0 {
        // The box is entirely behind the ray.
        return tmax;
    }
    if bb.contains_point(origin) {
        return tmax;
    }
    tmin
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::approx_eq;

    fn unit_box() -> Aabb {
        Aabb::from_min_max(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn aabb_from_min_max_reorders() {
        let bb = Aabb::from_min_max(Vec3::new(4.0, 5.0, 6.0), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(bb.min, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(bb.max, Vec3::new(4.0, 5.0, 6.0));
    }

    #[test]
    fn aabb_merge_and_contains() {
        let a = unit_box();
        let b = Aabb::from_center_size(Vec3::new(3.0, 0.0, 0.0), Vec3::ONE);
        let m = a.merge(&b);
        assert_eq!(m.min, Vec3::new(-1.0, -1.0, -1.0));
        assert_eq!(m.max, Vec3::new(3.5, 1.0, 1.0));
        assert!(m.contains_point(Vec3::new(2.0, 0.0, 0.0)));
        assert!(!a.contains_point(Vec3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn aabb_merge_with_invalid_is_identity() {
        let a = unit_box();
        assert_eq!(Aabb::INVALID.merge(&a), a);
    }

    #[test]
    fn aabb2_promotion_is_thin_slab() {
        let r = Aabb2::from_min_max(Vec2::new(-2.0, 0.0), Vec2::new(2.0, 1.0));
        let bb = r.to_aabb(1e-3);
        assert_eq!(bb.min, Vec3::new(-2.0, 0.0, -1e-3));
        assert_eq!(bb.max, Vec3::new(2.0, 1.0, 1e-3));
    }

    #[test]
    fn ray_box_straight_entry() {
        let d = ray_box_travel(Vec3::new(0.0, 0.0, -2.0), Vec3::Z, &unit_box());
        assert!(approx_eq(d, 1.0));
    }

    #[test]
    fn ray_box_diagonal_entry() {
        let dir = Vec3::ONE.normalize();
        let d = ray_box_travel(Vec3::new(-2.0, -2.0, -2.0), dir, &unit_box());
        assert!(approx_eq(d, Vec3::ONE.length()));
    }

    #[test]
    fn ray_box_from_inside_returns_exit() {
        let dir = Vec3::ONE.normalize();
        let d = ray_box_travel(Vec3::new(0.1, 0.1, 0.1), dir, &unit_box());
        assert!(approx_eq(d, Vec3::new(0.9, 0.9, 0.9).length()));

        let d = ray_box_travel(Vec3::new(0.1, 0.1, 0.1), -dir, &unit_box());
        assert!(approx_eq(d, Vec3::new(1.1, 1.1, 1.1).length()));
    }

    #[test]
    fn ray_box_behind_is_negative() {
        let dir = Vec3::ONE.normalize();
        let d = ray_box_travel(Vec3::new(2.0, 2.0, 2.0), dir, &unit_box());
        assert!(approx_eq(d, -Vec3::ONE.length()));
    }

    #[test]
    fn ray_box_no_forward_hit_guess() {
        let dir = Vec3::ONE.normalize();
        let d = ray_box_travel(Vec3::new(10.0, 0.0, 0.0), dir, &unit_box());
        assert!(approx_eq(d, -15.588457268119893));
    }
}
