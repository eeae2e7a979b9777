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

//! Latest-value delivery of in-progress preview frames.
//!
//! Progressive previews are only useful fresh: if the consumer falls behind,
//! older partial frames are worthless the moment a newer one exists. The
//! mailbox therefore holds exactly one frame and every post replaces it; a
//! slow consumer never applies backpressure to the render pipeline and never
//! sees stale frames.

use crate::image::ImageBuffer;
use std::sync::{Arc, Mutex};

/// Creates a connected partial-frame mailbox pair.
///
/// The sender side lives with the render session, the receiver side with
/// whatever displays previews. Dropping either side is safe; dropping the
/// sender closes the mailbox.
pub fn partial_frames() -> (PartialSender, PartialReceiver) {
    let slot = Arc::new(Mutex::new(None));
    // The channel carries no data, only wakeups; capacity 1 is enough
    // because a pending wakeup already covers every later post.
    let (notify_tx, notify_rx) = flume::bounded(1);
    (
        PartialSender {
            slot: slot.clone(),
            notify: Some(notify_tx),
        },
        PartialReceiver {
            slot,
            notify: notify_rx,
        },
    )
}

/// The producer half of the mailbox.
#[derive(Debug)]
pub struct PartialSender {
    slot: Arc<Mutex<Option<ImageBuffer>>>,
    notify: Option<flume::Sender<()>>,
}

impl PartialSender {
    /// Posts a frame, replacing any frame the consumer has not taken yet.
    ///
    /// Never blocks. Posting after [`close`](Self::close) is a no-op.
    pub fn post(&self, frame: ImageBuffer) {
        let Some(notify) = &self.notify else {
            return;
        };
        *self.slot.lock().unwrap() = Some(frame);
        // Full means a wakeup is already pending, Disconnected means the
        // consumer is gone; both are fine.
        let _ = notify.try_send(());
    }

    /// Closes the mailbox. The consumer drains any undelivered frame and
    /// then observes the closure. Idempotent.
    pub fn close(&mut self) {
        self.notify = None;
    }
}

/// The consumer half of the mailbox.
#[derive(Debug)]
pub struct PartialReceiver {
    slot: Arc<Mutex<Option<ImageBuffer>>>,
    notify: flume::Receiver<()>,
}

impl PartialReceiver {
    /// Blocks until a frame is available, returning `None` once the sender
    /// has closed the mailbox and the last posted frame was taken.
    pub fn recv(&self) -> Option<ImageBuffer> {
        loop {
            if let Some(frame) = self.slot.lock().unwrap().take() {
                return Some(frame);
            }
            // A wakeup may outlive the frame it announced (the slot was
            // already drained), so an empty slot just means wait again.
            if self.notify.recv().is_err() {
                return self.slot.lock().unwrap().take();
            }
        }
    }

    /// Takes the pending frame without blocking, if there is one.
    pub fn try_recv(&self) -> Option<ImageBuffer> {
        let _ = self.notify.try_recv();
        self.slot.lock().unwrap().take()
    }

    /// Whether the sender has closed the mailbox and no frame is pending.
    pub fn is_closed(&self) -> bool {
        self.notify.is_disconnected() && self.slot.lock().unwrap().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(tag: u8) -> ImageBuffer {
        let mut img = ImageBuffer::new(1, 1);
        img.fill_alpha(tag);
        img
    }

    #[test]
    fn newest_frame_wins() {
        let (tx, rx) = partial_frames();
        tx.post(frame(1));
        tx.post(frame(2));
        tx.post(frame(3));
        let got = rx.recv().unwrap();
        assert_eq!(got.as_bytes()[3], 3);
    }

    #[test]
    fn close_drains_last_frame_then_reports_closed() {
        let (mut tx, rx) = partial_frames();
        tx.post(frame(7));
        tx.close();
        tx.close(); // idempotent
        assert_eq!(rx.recv().unwrap().as_bytes()[3], 7);
        assert!(rx.recv().is_none());
        assert!(rx.is_closed());
    }

    #[test]
    fn dropping_sender_closes() {
        let (tx, rx) = partial_frames();
        drop(tx);
        assert!(rx.recv().is_none());
    }

    #[test]
    fn post_never_blocks_with_ignored_consumer() {
        let (tx, rx) = partial_frames();
        for tag in 0..100 {
            tx.post(frame(tag));
        }
        assert_eq!(rx.try_recv().unwrap().as_bytes()[3], 99);
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn recv_wakes_a_blocked_consumer() {
        let (tx, rx) = partial_frames();
        let handle = std::thread::spawn(move || rx.recv());
        std::thread::sleep(std::time::Duration::from_millis(20));
        tx.post(frame(42));
        let got = handle.join().unwrap().unwrap();
        assert_eq!(got.as_bytes()[3], 42);
    }
}
