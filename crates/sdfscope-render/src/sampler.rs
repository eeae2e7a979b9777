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

//! The render-strategy contract every sampler implements.

use sdfscope_core::error::SurfaceTreeError;
use sdfscope_core::math::Aabb;
use sdfscope_core::session::Session;
use sdfscope_core::tree::SurfaceTree;
use sdfscope_core::RenderError;
use std::sync::Arc;

/// A render strategy: everything the controlling layer needs to drive one
/// surface onto pixels.
///
/// Implementations are the 2D field shader, the 3D raycaster, the 3D mesh
/// rasterizer, and the remote client (which proxies one of the former over
/// a transport). The contract is intentionally identical on both sides of
/// the remote boundary.
pub trait PixelSampler: Send + Sync {
    /// The surface dimensionality, 2 or 3.
    fn dimensions(&self) -> u32;

    /// The surface's 3D bounding box (2D surfaces report a thin slab).
    fn bounding_box(&self) -> Aabb;

    /// How many color modes this sampler understands. Always at least 1.
    fn color_modes(&self) -> u32;

    /// The cached bounding-box introspection tree of the surface.
    fn surface_tree(&self) -> Result<Arc<SurfaceTree>, SurfaceTreeError>;

    /// Renders one frame into the session's buffer.
    ///
    /// Blocks until the frame completes or the session is cancelled;
    /// cancellation surfaces as [`RenderError::Cancelled`], never as a
    /// silent partial success. The session's partial mailbox, when present,
    /// is closed exactly once before returning.
    fn render(&self, session: &mut Session) -> Result<(), RenderError>;
}
