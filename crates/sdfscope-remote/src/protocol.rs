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

//! The wire messages of the remote render protocol.
//!
//! Everything crossing the boundary is a plain serde value: buffers, state
//! snapshots, and ids. No handles, locks, or channels ever cross. The
//! encoding is bincode over the serde derives, framed by the transport.

use sdfscope_core::image::ImageBuffer;
use sdfscope_core::math::Aabb;
use sdfscope_core::state::RenderStateSnapshot;
use sdfscope_core::RenderError;
use serde::{Deserialize, Serialize};

/// An explicit handle to one started render session.
///
/// Results can only be polled with the id returned by the start call, so a
/// client holding a stale id gets a clean error instead of another
/// session's frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

/// A client-to-service procedure call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    /// Asks for the surface dimensionality.
    Dimensions,
    /// Asks for the surface bounding box.
    BoundingBox,
    /// Asks how many color modes the hosted sampler understands.
    ColorModes,
    /// Starts a render session; cancels and supersedes any previous one.
    RenderStart {
        /// Output width in pixels.
        width: u32,
        /// Output height in pixels.
        height: u32,
        /// The view/camera state to render with.
        state: RenderStateSnapshot,
    },
    /// Polls the next result of a session (blocking).
    RenderGet {
        /// The session being polled.
        session: SessionId,
    },
    /// Cancels a session. Idempotent; stale ids succeed silently.
    RenderCancel {
        /// The session being cancelled.
        session: SessionId,
    },
    /// Asks the host process to exit.
    Shutdown {
        /// How long to wait for the host to acknowledge, in milliseconds.
        timeout_ms: u64,
    },
}

/// A service-to-client reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    /// Reply to [`Request::Dimensions`].
    Dimensions(u32),
    /// Reply to [`Request::BoundingBox`].
    BoundingBox(Aabb),
    /// Reply to [`Request::ColorModes`].
    ColorModes(u32),
    /// Reply to [`Request::RenderStart`].
    RenderStarted(SessionId),
    /// Reply to [`Request::RenderGet`].
    Frame(RenderFrame),
    /// Reply to [`Request::RenderCancel`].
    Cancelled,
    /// Reply to [`Request::Shutdown`].
    ShuttingDown,
    /// Any procedure's failure.
    Error(WireError),
}

/// One polled render result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderFrame {
    /// Whether this is an in-progress preview. Partials may be dropped
    /// under backpressure; the final frame never is.
    pub is_partial: bool,
    /// The pixels.
    pub image: ImageBuffer,
    /// The state the frame was rendered with (the service may have
    /// adjusted it, e.g. aspect-correcting the 2D view).
    pub state: RenderStateSnapshot,
}

/// The serializable mirror of [`RenderError`] for crossing the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireError {
    /// Mirrors [`RenderError::Cancelled`].
    Cancelled,
    /// Mirrors [`RenderError::NoActiveRender`].
    NoActiveRender,
    /// Mirrors [`RenderError::Transport`].
    Transport(String),
    /// Mirrors [`RenderError::InvalidConfig`].
    InvalidConfig(String),
}

impl From<RenderError> for WireError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::Cancelled => WireError::Cancelled,
            RenderError::NoActiveRender => WireError::NoActiveRender,
            RenderError::Transport(s) => WireError::Transport(s),
            RenderError::InvalidConfig(s) => WireError::InvalidConfig(s),
        }
    }
}

impl From<WireError> for RenderError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::Cancelled => RenderError::Cancelled,
            WireError::NoActiveRender => RenderError::NoActiveRender,
            WireError::Transport(s) => RenderError::Transport(s),
            WireError::InvalidConfig(s) => RenderError::InvalidConfig(s),
        }
    }
}

/// Encodes a protocol message for the wire.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, RenderError> {
    bincode::serde::encode_to_vec(message, bincode::config::standard())
        .map_err(|e| RenderError::Transport(format!("encode failed: {e}")))
}

/// Decodes a protocol message from a wire frame.
pub fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, RenderError> {
    bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map(|(message, _)| message)
        .map_err(|e| RenderError::Transport(format!("decode failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdfscope_core::math::{Aabb2, Vec2, Vec3};
    use sdfscope_core::state::RenderState;

    #[test]
    fn request_round_trip() {
        let state = RenderState::new_2d(Aabb2::from_center_size(Vec2::ZERO, Vec2::ONE));
        let request = Request::RenderStart {
            width: 320,
            height: 240,
            state: state.snapshot(),
        };
        let bytes = encode(&request).unwrap();
        let back: Request = decode(&bytes).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn response_round_trip_with_image() {
        let mut image = ImageBuffer::new(3, 2);
        image.set_pixel(1, 1, sdfscope_core::math::Rgba8::rgb(9, 8, 7));
        let state = RenderState::new_3d(&Aabb::from_center_size(Vec3::ZERO, Vec3::ONE));
        let response = Response::Frame(RenderFrame {
            is_partial: true,
            image,
            state: state.snapshot(),
        });
        let bytes = encode(&response).unwrap();
        let back: Response = decode(&bytes).unwrap();
        assert_eq!(back, response);
    }

    #[test]
    fn error_mirror_is_lossless() {
        let all = [
            RenderError::Cancelled,
            RenderError::NoActiveRender,
            RenderError::Transport("boom".into()),
            RenderError::InvalidConfig("bad".into()),
        ];
        for err in all {
            let wire: WireError = err.clone().into();
            assert_eq!(RenderError::from(wire), err);
        }
    }

    #[test]
    fn truncated_frame_is_a_transport_error() {
        let bytes = encode(&Request::Dimensions).unwrap();
        let result: Result<Response, _> = decode(&bytes[..0]);
        assert!(matches!(result, Err(RenderError::Transport(_))));
    }
}
