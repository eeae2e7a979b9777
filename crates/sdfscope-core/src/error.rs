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

//! Defines the error taxonomy of the render pipeline.

use std::fmt;

/// The error type shared by the coordinator, samplers, and remote layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The session's cancellation token fired. Expected and recoverable;
    /// always surfaced to the caller, never swallowed.
    Cancelled,
    /// A result was polled with no render session running, or after the
    /// session already delivered its final result.
    NoActiveRender,
    /// A remote call failed at the transport level.
    Transport(String),
    /// A programming error: unsupported dimensionality, an out-of-range
    /// color mode, or a malformed surface graph.
    InvalidConfig(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Cancelled => write!(f, "render session cancelled"),
            RenderError::NoActiveRender => write!(f, "no render currently running"),
            RenderError::Transport(details) => {
                write!(f, "remote transport failure: {details}")
            }
            RenderError::InvalidConfig(details) => {
                write!(f, "invalid render configuration: {details}")
            }
        }
    }
}

impl std::error::Error for RenderError {}

/// An error raised while introspecting a surface expression graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceTreeError {
    /// The expression graph references itself. The walk refuses to loop and
    /// reports the offending graph instead.
    CycleDetected,
    /// No introspection snapshot exists yet. Remote proxies only learn the
    /// tree from render results, so it is unavailable before the first
    /// completed frame.
    Unavailable,
}

impl fmt::Display for SurfaceTreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceTreeError::CycleDetected => {
                write!(f, "surface expression graph contains a cycle")
            }
            SurfaceTreeError::Unavailable => {
                write!(f, "no surface tree snapshot available yet")
            }
        }
    }
}

impl std::error::Error for SurfaceTreeError {}

impl From<SurfaceTreeError> for RenderError {
    fn from(err: SurfaceTreeError) -> Self {
        // A self-referential surface graph is a construction bug, not a
        // runtime condition the caller can retry.
        RenderError::InvalidConfig(err.to_string())
    }
}
