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

//! Provides foundational mathematics primitives for 2D and 3D.
//!
//! Everything here is `f64`: the distance fields this crate previews come
//! from CAD models where single precision visibly degrades both the ray/box
//! clipping and the uniform-grid range scans.
//!
//! All angular functions operate in **radians**.

// --- Fundamental Constants ---

/// A small constant for floating-point comparisons.
pub const EPSILON: f64 = 1e-9;

// Re-export standard mathematical constants for convenience.
pub use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI, TAU};

// --- Declare Sub-Modules ---

pub mod color;
pub mod geometry;
pub mod matrix;
pub mod vector;

// --- Re-export Principal Types ---

pub use self::color::{overlay_color, Rgba8};
pub use self::geometry::{ray_box_travel, Aabb, Aabb2};
pub use self::matrix::Mat4;
pub use self::vector::{Vec2, Vec3};

// --- Utility Functions ---

/// Compares two floating-point values for approximate equality using [`EPSILON`].
#[inline]
pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}
