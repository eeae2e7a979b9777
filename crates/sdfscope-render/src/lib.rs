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

//! # Sdfscope Render
//!
//! The render strategies of the sdfscope previewer: the concurrent
//! per-pixel [`Coordinator`], the [`PixelSampler`] contract, and its three
//! implementations (2D distance-field shading, 3D sphere-traced
//! raycasting, 3D triangle-mesh rasterization), plus the bounding-box
//! debug overlay they share.

#![warn(missing_docs)]

pub mod camera;
pub mod coordinator;
pub mod field2;
pub mod mesh3;
pub mod overlay;
pub mod raycast3;
pub mod sampler;

pub use camera::CameraRig;
pub use coordinator::{Coordinator, Job, JobResult};
pub use field2::{Field2Config, Field2Sampler};
pub use mesh3::{FragmentShader, Mesh3Config, Mesh3Sampler, MeshSource, Triangle};
pub use raycast3::{RayConfig, Raycast3Sampler};
pub use sampler::PixelSampler;
