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

//! # Sdfscope Core
//!
//! Foundational crate containing the core types and interface contracts of
//! the sdfscope incremental implicit-surface previewer: double-precision
//! math, pixel buffers, the closed signed-distance-surface node contract,
//! bounding-box tree introspection, render state, and the session /
//! cancellation / partial-frame plumbing shared by every render strategy.

#![warn(missing_docs)]

pub mod error;
pub mod image;
pub mod mailbox;
pub mod math;
pub mod session;
pub mod state;
pub mod surface;
pub mod tree;

pub use error::RenderError;
pub use image::{DepthBuffer, ImageBuffer};
pub use mailbox::{partial_frames, PartialReceiver, PartialSender};
pub use session::{cancel_pair, CancelHandle, CancelToken, Session};
pub use state::{RenderState, RenderStateSnapshot};
pub use surface::{NodeKind, Sdf2, Sdf3, SurfaceRef};
pub use tree::SurfaceTree;
