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

//! The service-side render session state machine.
//!
//! One session at a time: starting a render cancels and fully drains its
//! predecessor before fresh locks and queues are allocated, so no state is
//! ever shared between sessions. Results flow through a bounded queue the
//! client polls; partial frames are dropped under backpressure, the final
//! frame never is.

use crate::protocol::{RenderFrame, Request, Response, SessionId, WireError};
use sdfscope_core::mailbox::partial_frames;
use sdfscope_core::session::{cancel_pair, CancelHandle, CancelToken, Session};
use sdfscope_core::state::{RenderState, RenderStateSnapshot};
use sdfscope_core::RenderError;
use sdfscope_render::PixelSampler;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Queue slots between the render threads and the polling client. Partials
/// beyond this are dropped; only the final frame blocks for a slot.
const RESULT_QUEUE: usize = 4;

struct ActiveSession {
    id: SessionId,
    handle: CancelHandle,
    token: CancelToken,
    results: flume::Receiver<RenderFrame>,
}

/// Hosts one sampler behind the remote protocol.
pub struct RenderService {
    sampler: Arc<dyn PixelSampler>,
    shutdown: flume::Sender<()>,
    active: Option<ActiveSession>,
    next_id: u64,
}

impl RenderService {
    /// Creates a service hosting `sampler`.
    ///
    /// `shutdown` is the out-of-band channel to whoever owns the process
    /// lifetime; a [`Request::Shutdown`] sends on it and expects the owner
    /// to be listening.
    pub fn new(sampler: Arc<dyn PixelSampler>, shutdown: flume::Sender<()>) -> Self {
        Self {
            sampler,
            shutdown,
            active: None,
            next_id: 1,
        }
    }

    /// Dispatches one procedure call.
    pub fn handle(&mut self, request: Request) -> Response {
        match request {
            Request::Dimensions => Response::Dimensions(self.sampler.dimensions()),
            Request::BoundingBox => Response::BoundingBox(self.sampler.bounding_box()),
            Request::ColorModes => Response::ColorModes(self.sampler.color_modes()),
            Request::RenderStart {
                width,
                height,
                state,
            } => Response::RenderStarted(self.render_start(width, height, &state)),
            Request::RenderGet { session } => match self.render_get(session) {
                Ok(frame) => Response::Frame(frame),
                Err(e) => Response::Error(WireError::from(e)),
            },
            Request::RenderCancel { session } => {
                self.render_cancel(session);
                Response::Cancelled
            }
            Request::Shutdown { timeout_ms } => match self.shutdown(timeout_ms) {
                Ok(()) => Response::ShuttingDown,
                Err(e) => Response::Error(WireError::from(e)),
            },
        }
    }

    /// Starts a session, superseding any previous one.
    pub fn render_start(
        &mut self,
        width: u32,
        height: u32,
        snapshot: &RenderStateSnapshot,
    ) -> SessionId {
        self.supersede_active();

        let id = SessionId(self.next_id);
        self.next_id += 1;

        // Fresh locks and queues per session; nothing survives from the
        // previous one.
        let mut state = RenderState::from_snapshot(snapshot);
        if state.tree.is_none() {
            state.tree = self.sampler.surface_tree().ok();
        }
        let state = Arc::new(RwLock::new(state));
        let (handle, token) = cancel_pair();
        let (partial_tx, partial_rx) = partial_frames();
        let (result_tx, result_rx) = flume::bounded::<RenderFrame>(RESULT_QUEUE);

        let forward_state = state.clone();
        let forward_tx = result_tx.clone();
        std::thread::spawn(move || {
            while let Some(image) = partial_rx.recv() {
                let frame = RenderFrame {
                    is_partial: true,
                    image,
                    state: forward_state.read().unwrap().snapshot(),
                };
                // Backpressure drops the partial; a newer one follows.
                if forward_tx.try_send(frame).is_err() && forward_tx.is_disconnected() {
                    break;
                }
            }
        });

        let sampler = self.sampler.clone();
        let render_state = state.clone();
        let render_token = token.clone();
        std::thread::spawn(move || {
            let mut session =
                Session::new(render_token.clone(), render_state.clone(), width, height)
                    .with_partials(partial_tx);
            match sampler.render(&mut session) {
                Ok(()) => {
                    let frame = RenderFrame {
                        is_partial: false,
                        image: session.full_render.read().unwrap().clone(),
                        state: render_state.read().unwrap().snapshot(),
                    };
                    // The final frame is never dropped: block for a queue
                    // slot, bailing out only if the session is cancelled
                    // while nobody polls.
                    flume::Selector::new()
                        .send(&result_tx, frame, |_| ())
                        .recv(render_token.signal(), |_| ())
                        .wait();
                }
                Err(RenderError::Cancelled) => {
                    log::debug!("render session {} cancelled", id.0);
                }
                Err(e) => {
                    log::error!("render session {} failed: {e}", id.0);
                }
            }
        });

        self.active = Some(ActiveSession {
            id,
            handle,
            token,
            results: result_rx,
        });
        id
    }

    /// Blocks for the next result of `session`.
    pub fn render_get(&mut self, session: SessionId) -> Result<RenderFrame, RenderError> {
        let active = match &self.active {
            Some(active) if active.id == session => active,
            _ => return Err(RenderError::NoActiveRender),
        };

        enum Outcome {
            Frame(Box<RenderFrame>),
            Disconnected,
            Cancelled,
        }
        let outcome = flume::Selector::new()
            .recv(&active.results, |result| match result {
                Ok(frame) => Outcome::Frame(Box::new(frame)),
                Err(_) => Outcome::Disconnected,
            })
            .recv(active.token.signal(), |_| Outcome::Cancelled)
            .wait();

        match outcome {
            Outcome::Frame(frame) => {
                if !frame.is_partial {
                    // The final result retires the session.
                    self.active = None;
                }
                Ok(*frame)
            }
            Outcome::Disconnected => {
                self.active = None;
                Err(RenderError::NoActiveRender)
            }
            Outcome::Cancelled => Err(RenderError::Cancelled),
        }
    }

    /// Cancels `session`. Idempotent; stale ids are a no-op.
    pub fn render_cancel(&mut self, session: SessionId) {
        if let Some(active) = &mut self.active {
            if active.id == session {
                active.handle.cancel();
            }
        }
    }

    /// Asks the process owner to exit.
    pub fn shutdown(&mut self, timeout_ms: u64) -> Result<(), RenderError> {
        self.supersede_active();
        self.shutdown
            .send_timeout((), Duration::from_millis(timeout_ms))
            .map_err(|_| RenderError::Transport("shutdown not acknowledged".into()))
    }

    /// Cancels the active session and drains its result queue until the
    /// render threads confirm completion by disconnecting.
    fn supersede_active(&mut self) {
        if let Some(mut previous) = self.active.take() {
            previous.handle.cancel();
            while previous.results.recv().is_ok() {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdfscope_core::math::{Aabb2, Vec2};
    use sdfscope_core::surface::nodes::{Circle, Sphere};
    use sdfscope_render::{Field2Config, Field2Sampler, RayConfig, Raycast3Sampler};

    fn field_service() -> (RenderService, flume::Receiver<()>) {
        let sampler = Arc::new(Field2Sampler::new(
            Arc::new(Circle::new(1.0)),
            Field2Config::default(),
        ));
        let (tx, rx) = flume::bounded(0);
        (RenderService::new(sampler, tx), rx)
    }

    fn start_state() -> RenderStateSnapshot {
        RenderState::new_2d(Aabb2::from_center_size(Vec2::ZERO, Vec2::new(4.0, 4.0))).snapshot()
    }

    fn poll_to_final(service: &mut RenderService, id: SessionId) -> RenderFrame {
        loop {
            let frame = service.render_get(id).expect("render must complete");
            if !frame.is_partial {
                return frame;
            }
        }
    }

    #[test]
    fn start_then_poll_delivers_exactly_one_final() {
        let (mut service, _shutdown) = field_service();
        let id = service.render_start(16, 16, &start_state());
        let frame = poll_to_final(&mut service, id);
        assert_eq!(frame.image.width(), 16);
        assert_eq!(frame.image.height(), 16);
        // The session is retired; further polls are a clean error.
        assert_eq!(
            service.render_get(id),
            Err(RenderError::NoActiveRender)
        );
    }

    #[test]
    fn stale_session_id_is_rejected() {
        let (mut service, _shutdown) = field_service();
        let first = service.render_start(8, 8, &start_state());
        let second = service.render_start(8, 8, &start_state());
        assert_ne!(first, second);
        assert_eq!(
            service.render_get(first),
            Err(RenderError::NoActiveRender)
        );
        let frame = poll_to_final(&mut service, second);
        assert!(!frame.is_partial);
    }

    #[test]
    fn unknown_session_id_is_rejected() {
        let (mut service, _shutdown) = field_service();
        assert_eq!(
            service.render_get(SessionId(999)),
            Err(RenderError::NoActiveRender)
        );
    }

    #[test]
    fn cancel_is_idempotent_and_polls_fail_cleanly() {
        let sampler = Arc::new(Raycast3Sampler::new(
            Arc::new(Sphere::new(1.0)),
            RayConfig::default(),
        ));
        let (tx, _rx) = flume::bounded(0);
        let mut service = RenderService::new(sampler, tx);
        let state = {
            let bb = sdfscope_core::math::Aabb::from_center_size(
                sdfscope_core::math::Vec3::ZERO,
                sdfscope_core::math::Vec3::ONE * 2.0,
            );
            RenderState::new_3d(&bb).snapshot()
        };
        let id = service.render_start(128, 128, &state);
        service.render_cancel(id);
        service.render_cancel(id);
        // Frames already queued before the cancel may still be delivered;
        // the session must end in a clean error either way.
        let err = loop {
            match service.render_get(id) {
                Ok(_) => continue,
                Err(e) => break e,
            }
        };
        assert!(
            matches!(err, RenderError::Cancelled | RenderError::NoActiveRender),
            "got {err:?}"
        );
    }

    #[test]
    fn superseding_start_drains_the_predecessor() {
        let (mut service, _shutdown) = field_service();
        // Start several sessions back to back; each start must fully drain
        // its predecessor, so the last one still completes cleanly.
        let mut id = service.render_start(32, 32, &start_state());
        for _ in 0..4 {
            id = service.render_start(32, 32, &start_state());
        }
        let frame = poll_to_final(&mut service, id);
        assert!(!frame.is_partial);
    }

    #[test]
    fn final_state_carries_the_surface_tree() {
        let (mut service, _shutdown) = field_service();
        let id = service.render_start(16, 16, &start_state());
        let frame = poll_to_final(&mut service, id);
        let tree = frame.state.tree.expect("service must attach the tree");
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn shutdown_reaches_a_listening_owner() {
        let (mut service, shutdown_rx) = field_service();
        let owner = std::thread::spawn(move || shutdown_rx.recv().is_ok());
        assert_eq!(service.shutdown(1000), Ok(()));
        assert!(owner.join().unwrap());
    }

    #[test]
    fn shutdown_without_listener_times_out() {
        let (mut service, _shutdown_rx) = field_service();
        // The receiver exists but nobody is receiving on a rendezvous
        // channel, so the send cannot complete.
        assert!(matches!(
            service.shutdown(10),
            Err(RenderError::Transport(_))
        ));
    }

    #[test]
    fn info_calls_proxy_the_sampler() {
        let (mut service, _shutdown) = field_service();
        assert_eq!(service.handle(Request::Dimensions), Response::Dimensions(2));
        assert_eq!(service.handle(Request::ColorModes), Response::ColorModes(2));
        match service.handle(Request::BoundingBox) {
            Response::BoundingBox(bb) => assert!(bb.size().x > 1.9),
            other => panic!("unexpected response {other:?}"),
        }
    }
}
