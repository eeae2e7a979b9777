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

//! CPU-side pixel and depth buffers written by the render pipeline.

use crate::math::Rgba8;
use serde::{Deserialize, Serialize};

/// A CPU pixel buffer in tightly packed RGBA8 layout.
///
/// This is the output surface of every render session and the value type
/// shipped across the remote boundary, so it derives `serde` and clones into
/// independent snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl ImageBuffer {
    /// Creates a zeroed (fully transparent black) buffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
        }
    }

    /// Returns the buffer width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the buffer height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the total pixel count.
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    /// Writes one pixel. Out-of-bounds coordinates are ignored.
    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, color: Rgba8) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = self.offset(x, y);
        self.data[i..i + 4].copy_from_slice(bytemuck::bytes_of(&color));
    }

    /// Reads one pixel. Out-of-bounds coordinates return transparent black.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> Rgba8 {
        if x >= self.width || y >= self.height {
            return Rgba8::TRANSPARENT;
        }
        let i = self.offset(x, y);
        *bytemuck::from_bytes(&self.data[i..i + 4])
    }

    /// Sets the alpha channel of every pixel, leaving RGB untouched.
    ///
    /// The coordinator pre-clears alpha to opaque so not-yet-written pixels
    /// stay distinguishable from rendered ones during progressive preview.
    pub fn fill_alpha(&mut self, alpha: u8) {
        for px in self.data.chunks_exact_mut(4) {
            px[3] = alpha;
        }
    }

    /// Returns the raw RGBA8 bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// A per-pixel view-depth buffer captured during a 3D main pass.
///
/// Depths are distances from the camera position; unwritten pixels hold
/// `+inf` so any overlay geometry wins there.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthBuffer {
    width: u32,
    height: u32,
    data: Vec<f64>,
}

impl DepthBuffer {
    /// Creates a buffer with every depth at `+inf`.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![f64::INFINITY; width as usize * height as usize],
        }
    }

    /// Returns the buffer width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the buffer height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Reads the depth at a pixel; out-of-bounds reads return `+inf`.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> f64 {
        if x >= self.width || y >= self.height {
            return f64::INFINITY;
        }
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Writes the depth at a pixel. Out-of-bounds writes are ignored.
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, depth: f64) {
        if x >= self.width || y >= self.height {
            return;
        }
        self.data[y as usize * self.width as usize + x as usize] = depth;
    }

    /// Resets every depth to `+inf`.
    pub fn clear(&mut self) {
        self.data.fill(f64::INFINITY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_round_trip() {
        let mut img = ImageBuffer::new(4, 3);
        let c = Rgba8::new(1, 2, 3, 4);
        img.set_pixel(3, 2, c);
        assert_eq!(img.pixel(3, 2), c);
        assert_eq!(img.pixel(0, 0), Rgba8::TRANSPARENT);
    }

    #[test]
    fn out_of_bounds_is_ignored() {
        let mut img = ImageBuffer::new(2, 2);
        img.set_pixel(5, 5, Rgba8::WHITE);
        assert_eq!(img.pixel(5, 5), Rgba8::TRANSPARENT);
    }

    #[test]
    fn fill_alpha_only_touches_alpha() {
        let mut img = ImageBuffer::new(2, 1);
        img.set_pixel(0, 0, Rgba8::new(10, 20, 30, 0));
        img.fill_alpha(255);
        assert_eq!(img.pixel(0, 0), Rgba8::new(10, 20, 30, 255));
        assert_eq!(img.pixel(1, 0), Rgba8::new(0, 0, 0, 255));
    }

    #[test]
    fn depth_starts_at_infinity_and_clears() {
        let mut d = DepthBuffer::new(2, 2);
        assert!(d.get(0, 0).is_infinite());
        d.set(1, 1, 4.5);
        assert_eq!(d.get(1, 1), 4.5);
        d.clear();
        assert!(d.get(1, 1).is_infinite());
    }
}
