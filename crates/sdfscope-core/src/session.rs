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

//! Render sessions and cooperative cancellation.
//!
//! A [`Session`] is created per render invocation and bundles everything a
//! render strategy needs: the shared state, the output buffer, the optional
//! partial-frame mailbox, and a [`CancelToken`]. Cancellation is broadcast
//! through channel disconnection so blocked select loops wake without
//! polling, with an atomic flag beside it for cheap checks in hot loops.

use crate::image::ImageBuffer;
use crate::mailbox::PartialSender;
use crate::state::RenderState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// Creates a connected cancellation pair.
///
/// The handle stays with whoever controls the session; the token travels
/// into the render pipeline (and clones into its workers).
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let flag = Arc::new(AtomicBool::new(false));
    // Nothing is ever sent on this channel; dropping the sender is the
    // signal, and disconnection wakes every cloned receiver at once.
    let (guard, signal) = flume::bounded::<()>(0);
    (
        CancelHandle {
            flag: flag.clone(),
            guard: Some(guard),
        },
        CancelToken { flag, signal },
    )
}

/// The controlling half of a cancellation pair.
///
/// Dropping the handle cancels the session, so an abandoned session can
/// never leave its workers running.
#[derive(Debug)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
    guard: Option<flume::Sender<()>>,
}

impl CancelHandle {
    /// Requests cancellation. Idempotent.
    pub fn cancel(&mut self) {
        self.flag.store(true, Ordering::SeqCst);
        self.guard = None;
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl Drop for CancelHandle {
    fn drop(&mut self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

/// The observing half of a cancellation pair. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    signal: flume::Receiver<()>,
}

impl CancelToken {
    /// Whether cancellation has been requested. Safe to call in hot loops.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// The underlying signal channel, for racing against other channels in
    /// a `flume::Selector`. It becomes disconnected exactly on cancellation.
    pub fn signal(&self) -> &flume::Receiver<()> {
        &self.signal
    }

    /// Blocks until the session is cancelled.
    pub fn wait(&self) {
        // Err(Disconnected) is the expected outcome; Ok can't happen since
        // nothing is ever sent.
        let _ = self.signal.recv();
    }

    /// A token that is never cancelled, for fire-and-forget renders.
    pub fn never() -> Self {
        let (guard, signal) = flume::bounded::<()>(0);
        // Leaking the sender keeps the channel connected forever.
        std::mem::forget(guard);
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            signal,
        }
    }
}

/// Everything a render strategy needs for one render invocation.
///
/// Locks are allocated per session and never shared across sessions, so a
/// cancelled render can still be draining while its successor starts.
pub struct Session {
    /// The cancellation token observed by the pipeline.
    pub cancel: CancelToken,
    /// The shared camera/view/display state.
    pub state: Arc<RwLock<RenderState>>,
    /// The session's output buffer; written under the lock only when a
    /// frame (partial or final) is complete.
    pub full_render: Arc<RwLock<ImageBuffer>>,
    /// Where to post in-progress preview frames, if anyone is watching.
    pub partials: Option<PartialSender>,
}

impl Session {
    /// Creates a session rendering into a fresh buffer of the given size.
    pub fn new(
        cancel: CancelToken,
        state: Arc<RwLock<RenderState>>,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            cancel,
            state,
            full_render: Arc::new(RwLock::new(ImageBuffer::new(width, height))),
            partials: None,
        }
    }

    /// Attaches a partial-frame mailbox sender to the session.
    pub fn with_partials(mut self, partials: PartialSender) -> Self {
        self.partials = Some(partials);
        self
    }

    /// Takes a read-locked snapshot of the shared state.
    pub fn state_snapshot(&self) -> RenderState {
        self.state.read().unwrap().clone()
    }

    /// The output buffer dimensions.
    pub fn render_size(&self) -> (u32, u32) {
        let buf = self.full_render.read().unwrap();
        (buf.width(), buf.height())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Aabb2;
    use crate::math::Vec2;
    use std::time::Duration;

    #[test]
    fn cancel_sets_flag_and_disconnects() {
        let (mut handle, token) = cancel_pair();
        assert!(!token.is_cancelled());
        assert!(!token.signal().is_disconnected());
        handle.cancel();
        handle.cancel(); // idempotent
        assert!(token.is_cancelled());
        assert!(token.signal().is_disconnected());
    }

    #[test]
    fn dropping_handle_cancels() {
        let (handle, token) = cancel_pair();
        drop(handle);
        assert!(token.is_cancelled());
        assert!(token.signal().is_disconnected());
    }

    #[test]
    fn cancellation_wakes_a_blocked_waiter() {
        let (mut handle, token) = cancel_pair();
        let waiter = std::thread::spawn(move || {
            token.wait();
            token.is_cancelled()
        });
        std::thread::sleep(Duration::from_millis(20));
        handle.cancel();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn clones_observe_the_same_cancellation() {
        let (mut handle, token) = cancel_pair();
        let clone = token.clone();
        handle.cancel();
        assert!(token.is_cancelled());
        assert!(clone.is_cancelled());
        assert!(clone.signal().is_disconnected());
    }

    #[test]
    fn never_token_stays_live() {
        let token = CancelToken::never();
        assert!(!token.is_cancelled());
        assert!(!token.signal().is_disconnected());
    }

    #[test]
    fn session_allocates_its_own_buffer() {
        let (_handle, token) = cancel_pair();
        let state = Arc::new(RwLock::new(RenderState::new_2d(Aabb2::from_center_size(
            Vec2::ZERO,
            Vec2::ONE,
        ))));
        let session = Session::new(token, state, 320, 240);
        assert_eq!(session.render_size(), (320, 240));
        assert!(session.partials.is_none());
    }
}
