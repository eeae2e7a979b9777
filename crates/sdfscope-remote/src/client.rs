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

//! The client-side proxy sampler.
//!
//! A [`RenderClient`] implements the local [`PixelSampler`] contract over a
//! [`Transport`], so the rest of the application cannot tell a remote
//! surface from a local one. Informational calls degrade to zero values on
//! transport failure (logged) rather than poisoning the caller; `render`
//! failures are surfaced as hard errors.

use crate::protocol::{Request, Response, SessionId};
use crate::transport::Transport;
use sdfscope_core::error::SurfaceTreeError;
use sdfscope_core::math::Aabb;
use sdfscope_core::session::Session;
use sdfscope_core::state::RenderState;
use sdfscope_core::tree::SurfaceTree;
use sdfscope_core::RenderError;
use sdfscope_render::PixelSampler;
use std::sync::{Arc, Mutex};

/// A sampler whose pixels are rendered by a remote service.
pub struct RenderClient<T: Transport> {
    transport: Mutex<T>,
    tree: Mutex<Option<Arc<SurfaceTree>>>,
}

impl<T: Transport> RenderClient<T> {
    /// Wraps a connected transport.
    pub fn new(transport: T) -> Self {
        Self {
            transport: Mutex::new(transport),
            tree: Mutex::new(None),
        }
    }

    fn call(&self, request: &Request) -> Result<Response, RenderError> {
        self.transport.lock().unwrap().call(request)
    }

    /// Issues an informational call, degrading to `fallback` on failure.
    fn info<V>(
        &self,
        request: Request,
        extract: impl FnOnce(Response) -> Option<V>,
        fallback: V,
    ) -> V {
        match self.call(&request) {
            Ok(response) => match extract(response) {
                Some(value) => value,
                None => {
                    log::error!("unexpected response to {request:?}");
                    fallback
                }
            },
            Err(e) => {
                log::error!("remote call {request:?} failed: {e}");
                fallback
            }
        }
    }

    fn render_loop(&self, session: &Session, id: SessionId) -> Result<(), RenderError> {
        loop {
            if session.cancel.is_cancelled() {
                // Best effort: the service cancels on its own timetable.
                if let Err(e) = self.call(&Request::RenderCancel { session: id }) {
                    log::error!("remote cancel failed: {e}");
                }
                return Err(RenderError::Cancelled);
            }
            match self.call(&Request::RenderGet { session: id })? {
                Response::Frame(frame) if frame.is_partial => {
                    if let Some(partials) = session.partials.as_ref() {
                        partials.post(frame.image);
                    }
                }
                Response::Frame(frame) => {
                    // The final frame: adopt the service's buffer and its
                    // (possibly adjusted) state wholesale.
                    *session.full_render.write().unwrap() = frame.image;
                    let state = RenderState::from_snapshot(&frame.state);
                    *self.tree.lock().unwrap() = state.tree.clone();
                    *session.state.write().unwrap() = state;
                    return Ok(());
                }
                Response::Error(e) => return Err(RenderError::from(e)),
                other => {
                    return Err(RenderError::Transport(format!(
                        "unexpected render response: {other:?}"
                    )))
                }
            }
        }
    }
}

impl<T: Transport> PixelSampler for RenderClient<T> {
    fn dimensions(&self) -> u32 {
        self.info(
            Request::Dimensions,
            |r| match r {
                Response::Dimensions(n) => Some(n),
                _ => None,
            },
            0,
        )
    }

    fn bounding_box(&self) -> Aabb {
        self.info(
            Request::BoundingBox,
            |r| match r {
                Response::BoundingBox(bb) => Some(bb),
                _ => None,
            },
            Aabb::default(),
        )
    }

    fn color_modes(&self) -> u32 {
        self.info(
            Request::ColorModes,
            |r| match r {
                Response::ColorModes(n) => Some(n),
                _ => None,
            },
            0,
        )
    }

    fn surface_tree(&self) -> Result<Arc<SurfaceTree>, SurfaceTreeError> {
        // The protocol carries the tree inside result snapshots rather than
        // as its own procedure, so it is known only after the first frame.
        self.tree
            .lock()
            .unwrap()
            .clone()
            .ok_or(SurfaceTreeError::Unavailable)
    }

    fn render(&self, session: &mut Session) -> Result<(), RenderError> {
        let (width, height) = session.render_size();
        let state = session.state.read().unwrap().snapshot();
        let result = match self.call(&Request::RenderStart {
            width,
            height,
            state,
        }) {
            Ok(Response::RenderStarted(id)) => self.render_loop(session, id),
            Ok(Response::Error(e)) => Err(RenderError::from(e)),
            Ok(other) => Err(RenderError::Transport(format!(
                "unexpected start response: {other:?}"
            ))),
            Err(e) => Err(e),
        };
        if let Some(partials) = session.partials.as_mut() {
            partials.close();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::RenderService;
    use crate::transport::LocalTransport;
    use sdfscope_core::mailbox::partial_frames;
    use sdfscope_core::math::{Aabb2, Vec2};
    use sdfscope_core::session::cancel_pair;
    use sdfscope_core::surface::nodes::Circle;
    use sdfscope_render::{Field2Config, Field2Sampler};
    use std::sync::RwLock;

    fn circle_client() -> RenderClient<LocalTransport> {
        let sampler = Arc::new(Field2Sampler::new(
            Arc::new(Circle::new(1.0)),
            Field2Config::default(),
        ));
        let (tx, _rx) = flume::bounded(0);
        RenderClient::new(LocalTransport::new(RenderService::new(sampler, tx)))
    }

    fn client_session(width: u32, height: u32) -> (sdfscope_core::session::CancelHandle, Session) {
        let (handle, token) = cancel_pair();
        let state = Arc::new(RwLock::new(RenderState::new_2d(Aabb2::from_center_size(
            Vec2::ZERO,
            Vec2::new(4.0, 4.0),
        ))));
        (handle, Session::new(token, state, width, height))
    }

    #[test]
    fn info_calls_proxy_through_the_wire() {
        let client = circle_client();
        assert_eq!(client.dimensions(), 2);
        assert_eq!(client.color_modes(), 2);
        assert!(client.bounding_box().size().x > 1.9);
    }

    #[test]
    fn remote_render_fills_the_local_buffer() {
        let client = circle_client();
        let (_handle, mut session) = client_session(32, 32);
        client.render(&mut session).unwrap();
        let buffer = session.full_render.read().unwrap();
        // Center of the circle is deep inside: dark. Corner: light.
        assert!(buffer.pixel(16, 16).r < 128);
        assert!(buffer.pixel(1, 1).r > 128);
    }

    #[test]
    fn final_state_and_tree_are_adopted() {
        let client = circle_client();
        assert_eq!(client.surface_tree(), Err(SurfaceTreeError::Unavailable));
        let (_handle, mut session) = client_session(64, 32);
        client.render(&mut session).unwrap();
        // The service aspect-corrected the square view to 2:1.
        let view = session.state.read().unwrap().view_2d;
        assert!((view.size().x / view.size().y - 2.0).abs() < 1e-9);
        assert_eq!(client.surface_tree().unwrap().node_count(), 1);
    }

    struct DeadTransport;

    impl Transport for DeadTransport {
        fn call(&mut self, _request: &Request) -> Result<Response, RenderError> {
            Err(RenderError::Transport("wire down".into()))
        }
    }

    #[test]
    fn info_calls_degrade_on_transport_failure() {
        let client = RenderClient::new(DeadTransport);
        assert_eq!(client.dimensions(), 0);
        assert_eq!(client.color_modes(), 0);
        assert_eq!(client.bounding_box(), Aabb::default());
    }

    #[test]
    fn render_surfaces_transport_failure() {
        let client = RenderClient::new(DeadTransport);
        let (_handle, mut session) = client_session(8, 8);
        assert!(matches!(
            client.render(&mut session),
            Err(RenderError::Transport(_))
        ));
    }

    #[test]
    fn local_cancel_aborts_and_notifies() {
        let client = circle_client();
        let (mut handle, mut session) = client_session(32, 32);
        handle.cancel();
        let (tx, rx) = partial_frames();
        session.partials = Some(tx);
        assert_eq!(client.render(&mut session), Err(RenderError::Cancelled));
        while rx.recv().is_some() {}
        assert!(rx.is_closed());
    }
}
