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

//! Defines the `Rgba8` color type and the overlay palette.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// A color with 8-bit RGBA components, the pixel format of every output
/// buffer in the pipeline.
///
/// `#[repr(C)]` plus the `bytemuck` derives give a stable byte layout so a
/// whole buffer can be viewed as raw bytes for snapshots and the wire.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    bytemuck::Pod,
    bytemuck::Zeroable,
    Serialize,
    Deserialize,
    Encode,
    Decode,
)]
#[repr(C)]
pub struct Rgba8 {
    /// The red component.
    pub r: u8,
    /// The green component.
    pub g: u8,
    /// The blue component.
    pub b: u8,
    /// The alpha (opacity) component.
    pub a: u8,
}

impl Rgba8 {
    /// Opaque black.
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    /// Opaque white.
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);

    /// Creates a new color with explicit RGBA values.
    #[inline]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Creates a new opaque color (alpha = 255).
    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Creates an opaque gray from an intensity in `[0, 1]`.
    #[inline]
    pub fn gray(intensity: f64) -> Self {
        let v = (intensity.clamp(0.0, 1.0) * 255.0) as u8;
        Self::rgb(v, v, v)
    }

    /// Scales the RGB components by an intensity in `[0, 1]`, keeping alpha.
    #[inline]
    pub fn scaled(self, intensity: f64) -> Self {
        let k = intensity.clamp(0.0, 1.0);
        Self::new(
            (f64::from(self.r) * k) as u8,
            (f64::from(self.g) * k) as u8,
            (f64::from(self.b) * k) as u8,
            self.a,
        )
    }
}

/// Returns a deterministic, well-separated color for an overlay index.
///
/// Steps the hue by the golden-ratio conjugate so neighbouring tree nodes
/// get visually distant colors without any stored palette, and alternates
/// value slightly so runs of similar hues still separate.
pub fn overlay_color(index: usize) -> Rgba8 {
    const GOLDEN: f64 = 0.618_033_988_749_895;
    let hue = (index as f64 * GOLDEN).fract();
    let value = if index % 2 == 0 { 1.0 } else { 0.78 };
    hsv_to_rgb(hue, 0.85, value)
}

/// Converts an HSV triple (all in `[0, 1]`) to an opaque `Rgba8`.
fn hsv_to_rgb(h: f64, s: f64, v: f64) -> Rgba8 {
    let h6 = (h.fract() * 6.0).rem_euclid(6.0);
    let sector = h6 as u32 % 6;
    let f = h6 - h6.floor();
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    let (r, g, b) = match sector {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    Rgba8::rgb(
        (r * 255.0).round() as u8,
        (g * 255.0).round() as u8,
        (b * 255.0).round() as u8,
    )
}
