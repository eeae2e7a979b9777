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

//! # Sdfscope Remote
//!
//! The poll-based remote boundary of the previewer: a serde/bincode wire
//! protocol, a blocking TCP transport, the [`RenderService`] state machine
//! hosting a sampler, and the [`RenderClient`] that re-exposes the remote
//! sampler through the local [`PixelSampler`](sdfscope_render::PixelSampler)
//! contract.

#![warn(missing_docs)]

pub mod client;
pub mod protocol;
pub mod service;
pub mod transport;

pub use client::RenderClient;
pub use protocol::{RenderFrame, Request, Response, SessionId, WireError};
pub use service::RenderService;
pub use transport::{LocalTransport, TcpTransport, Transport};
