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

//! The concurrent per-pixel render coordinator.
//!
//! One generator walks a randomized pixel permutation and feeds a fixed
//! worker pool through a bounded job queue; one collector drains results
//! into the session buffer, posting a preview snapshot to the partial
//! mailbox every batch. Cancellation unwinds the whole pipeline through
//! channel disconnection: the generator stops feeding, the job queue
//! disconnects, workers exit, the result queue disconnects, the collector
//! exits.

use sdfscope_core::image::DepthBuffer;
use sdfscope_core::math::{Rgba8, Vec2};
use sdfscope_core::session::Session;
use sdfscope_core::state::RenderState;
use sdfscope_core::RenderError;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// How many results the collector applies between partial-frame posts.
const PARTIAL_BATCH: usize = 1000;

/// One pixel's work item.
#[derive(Debug)]
pub struct Job<P> {
    /// The output pixel coordinate.
    pub pixel: (u32, u32),
    /// The pixel center in normalized `[0,1]²` screen space, `(0,0)` at the
    /// top-left.
    pub pixel01: Vec2,
    /// Strategy-specific payload built by the generator.
    pub payload: P,
}

/// One pixel's finished result.
#[derive(Debug, Clone, Copy)]
pub struct JobResult {
    /// The output pixel coordinate.
    pub pixel: (u32, u32),
    /// The shaded color.
    pub color: Rgba8,
    /// The view depth at this pixel, `+inf` where nothing was hit (2D
    /// strategies always report `+inf`).
    pub depth: f64,
}

struct PermutationCache {
    pixels: usize,
    order: Arc<Vec<u32>>,
}

/// Drives per-pixel render strategies over a fixed worker pool.
///
/// Owned by a sampler and reused across frames so the pixel-visitation
/// permutation survives between renders of the same size.
pub struct Coordinator {
    permutation: Mutex<PermutationCache>,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl Coordinator {
    /// Creates a coordinator with an empty permutation cache.
    pub fn new() -> Self {
        Self {
            permutation: Mutex::new(PermutationCache {
                pixels: 0,
                order: Arc::new(Vec::new()),
            }),
        }
    }

    /// Renders every pixel of the session buffer.
    ///
    /// `generate` runs on the coordinator thread and builds each job's
    /// payload from a state snapshot; `process` runs on the worker pool.
    /// Pixels are visited in a randomized order so partial frames preview
    /// the whole image rather than filling top-down.
    ///
    /// Returns the depth buffer captured from the results on success, and
    /// [`RenderError::Cancelled`] when the session token fired. The
    /// session's partial mailbox is closed exactly once on every path.
    pub fn execute<P, G, W>(
        &self,
        session: &mut Session,
        generate: G,
        process: W,
    ) -> Result<DepthBuffer, RenderError>
    where
        P: Send,
        G: FnMut(&RenderState, (u32, u32), Vec2) -> P,
        W: Fn(&Job<P>) -> JobResult + Send + Sync,
    {
        let result = self.run(session, generate, &process);
        if let Some(partials) = session.partials.as_mut() {
            partials.close();
        }
        result
    }

    fn run<P, G, W>(
        &self,
        session: &Session,
        mut generate: G,
        process: &W,
    ) -> Result<DepthBuffer, RenderError>
    where
        P: Send,
        G: FnMut(&RenderState, (u32, u32), Vec2) -> P,
        W: Fn(&Job<P>) -> JobResult + Send + Sync,
    {
        let (width, height) = session.render_size();
        let pixels = width as usize * height as usize;

        // Opaque alpha marks not-yet-rendered pixels during the preview.
        session.full_render.write().unwrap().fill_alpha(0xFF);
        if pixels == 0 {
            return Ok(DepthBuffer::new(width, height));
        }

        let order = self.permutation(pixels);
        let workers = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        let (job_tx, job_rx) = flume::bounded::<Job<P>>(workers * 4);
        let (result_tx, result_rx) = flume::bounded::<JobResult>(PARTIAL_BATCH);
        let cancel = session.cancel.clone();

        let (drained, depth, aborted) = std::thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    while let Ok(job) = job_rx.recv() {
                        if result_tx.send(process(&job)).is_err() {
                            break;
                        }
                    }
                });
            }
            // Only the workers hold the queue ends from here on.
            drop(job_rx);
            drop(result_tx);

            let collector = scope.spawn(|| Self::collect(session, result_rx, width, height));

            let state = session.state_snapshot();
            let mut aborted = false;
            for &index in order.iter() {
                let x = index % width;
                let y = index / width;
                let pixel01 = Vec2::new(
                    (f64::from(x) + 0.5) / f64::from(width),
                    (f64::from(y) + 0.5) / f64::from(height),
                );
                let job = Job {
                    pixel: (x, y),
                    pixel01,
                    payload: generate(&state, (x, y), pixel01),
                };
                // Race the (possibly full) job queue against cancellation so
                // a cancel never waits behind slow workers.
                let sent = flume::Selector::new()
                    .send(&job_tx, job, |sent| sent.is_ok())
                    .recv(cancel.signal(), |_| false)
                    .wait();
                if !sent {
                    aborted = true;
                    break;
                }
            }
            drop(job_tx);

            let (drained, depth) = match collector.join() {
                Ok(out) => out,
                Err(panic) => std::panic::resume_unwind(panic),
            };
            (drained, depth, aborted)
        });

        if aborted || session.cancel.is_cancelled() {
            return Err(RenderError::Cancelled);
        }
        debug_assert_eq!(drained, pixels);
        log::trace!("render pass complete: {drained} pixels");
        Ok(depth)
    }

    /// Drains results to disconnection, applying them under short-lived
    /// buffer write locks and posting a snapshot every [`PARTIAL_BATCH`]
    /// pixels.
    fn collect(
        session: &Session,
        results: flume::Receiver<JobResult>,
        width: u32,
        height: u32,
    ) -> (usize, DepthBuffer) {
        let mut depth = DepthBuffer::new(width, height);
        let mut drained = 0usize;
        let mut since_partial = 0usize;

        while let Ok(first) = results.recv() {
            let snapshot = {
                let mut buffer = session.full_render.write().unwrap();
                buffer.set_pixel(first.pixel.0, first.pixel.1, first.color);
                depth.set(first.pixel.0, first.pixel.1, first.depth);
                drained += 1;
                since_partial += 1;
                // Soak up whatever is already queued without re-locking,
                // but cap the time the write lock is held.
                while since_partial < PARTIAL_BATCH {
                    match results.try_recv() {
                        Ok(r) => {
                            buffer.set_pixel(r.pixel.0, r.pixel.1, r.color);
                            depth.set(r.pixel.0, r.pixel.1, r.depth);
                            drained += 1;
                            since_partial += 1;
                        }
                        Err(_) => break,
                    }
                }
                if since_partial >= PARTIAL_BATCH {
                    since_partial = 0;
                    session.partials.as_ref().map(|_| buffer.clone())
                } else {
                    None
                }
            };
            if let (Some(image), Some(partials)) = (snapshot, session.partials.as_ref()) {
                if !session.cancel.is_cancelled() {
                    partials.post(image);
                }
            }
            std::thread::yield_now();
        }
        (drained, depth)
    }

    /// Returns the cached pixel-visitation permutation, regenerating it only
    /// when the pixel count changed.
    fn permutation(&self, pixels: usize) -> Arc<Vec<u32>> {
        let mut cache = self.permutation.lock().unwrap();
        if cache.pixels != pixels {
            let mut order: Vec<u32> = (0..pixels as u32).collect();
            // Fisher-Yates over a xorshift stream. Only visual scatter
            // matters here, not statistical quality.
            let mut seed = (0x9e37_79b9_7f4a_7c15u64
                ^ (pixels as u64).wrapping_mul(0x2545_f491_4f6c_dd1d))
                | 1;
            for i in (1..order.len()).rev() {
                let j = (xorshift(&mut seed) % (i as u64 + 1)) as usize;
                order.swap(i, j);
            }
            *cache = PermutationCache {
                pixels,
                order: Arc::new(order),
            };
        }
        cache.order.clone()
    }
}

#[inline]
fn xorshift(state: &mut u64) -> u64 {
    let mut x = *state;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    *state = x;
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdfscope_core::mailbox::partial_frames;
    use sdfscope_core::math::Aabb2;
    use sdfscope_core::session::{cancel_pair, Session};
    use sdfscope_core::state::RenderState;
    use std::collections::HashSet;
    use std::sync::RwLock;
    use std::time::Duration;

    fn test_session(width: u32, height: u32) -> (sdfscope_core::session::CancelHandle, Session) {
        let (handle, token) = cancel_pair();
        let state = Arc::new(RwLock::new(RenderState::new_2d(Aabb2::from_center_size(
            sdfscope_core::math::Vec2::ZERO,
            sdfscope_core::math::Vec2::ONE,
        ))));
        (handle, Session::new(token, state, width, height))
    }

    #[test]
    fn every_pixel_is_rendered_exactly_once() {
        let (_handle, mut session) = test_session(16, 16);
        let seen = Mutex::new(HashSet::new());
        let coordinator = Coordinator::new();
        coordinator
            .execute(
                &mut session,
                |_, _, _| (),
                |job| {
                    assert!(seen.lock().unwrap().insert(job.pixel), "duplicate pixel");
                    JobResult {
                        pixel: job.pixel,
                        color: Rgba8::rgb(job.pixel.0 as u8, job.pixel.1 as u8, 0),
                        depth: f64::INFINITY,
                    }
                },
            )
            .unwrap();
        assert_eq!(seen.lock().unwrap().len(), 256);
        let buffer = session.full_render.read().unwrap();
        for y in 0..16 {
            for x in 0..16 {
                assert_eq!(buffer.pixel(x, y), Rgba8::rgb(x as u8, y as u8, 0));
            }
        }
    }

    #[test]
    fn depth_results_are_captured() {
        let (_handle, mut session) = test_session(4, 4);
        let depth = Coordinator::new()
            .execute(
                &mut session,
                |_, _, _| (),
                |job| JobResult {
                    pixel: job.pixel,
                    color: Rgba8::BLACK,
                    depth: f64::from(job.pixel.0),
                },
            )
            .unwrap();
        assert_eq!(depth.get(3, 1), 3.0);
        assert_eq!(depth.get(0, 2), 0.0);
    }

    #[test]
    fn cancellation_aborts_and_surfaces() {
        let (mut handle, mut session) = test_session(64, 64);
        let coordinator = Coordinator::new();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            handle.cancel();
        });
        let result = coordinator.execute(
            &mut session,
            |_, _, _| (),
            |job| {
                std::thread::sleep(Duration::from_millis(1));
                JobResult {
                    pixel: job.pixel,
                    color: Rgba8::WHITE,
                    depth: f64::INFINITY,
                }
            },
        );
        canceller.join().unwrap();
        assert_eq!(result, Err(RenderError::Cancelled));
    }

    #[test]
    fn partial_mailbox_sees_frames_and_then_closes() {
        let (_handle, mut session) = test_session(64, 64);
        let (tx, rx) = partial_frames();
        session.partials = Some(tx);
        Coordinator::new()
            .execute(
                &mut session,
                |_, _, _| (),
                |job| JobResult {
                    pixel: job.pixel,
                    color: Rgba8::WHITE,
                    depth: f64::INFINITY,
                },
            )
            .unwrap();
        // 4096 pixels with a 1000-pixel batch: at least one partial must
        // have been posted, and the mailbox must now be closed.
        let mut frames = 0;
        while rx.recv().is_some() {
            frames += 1;
        }
        assert!(frames >= 1);
        assert!(rx.is_closed());
    }

    #[test]
    fn mailbox_is_closed_even_when_cancelled() {
        let (mut handle, mut session) = test_session(32, 32);
        let (tx, rx) = partial_frames();
        session.partials = Some(tx);
        handle.cancel();
        let result = Coordinator::new().execute(
            &mut session,
            |_, _, _| (),
            |job| JobResult {
                pixel: job.pixel,
                color: Rgba8::WHITE,
                depth: f64::INFINITY,
            },
        );
        assert_eq!(result, Err(RenderError::Cancelled));
        while rx.recv().is_some() {}
        assert!(rx.is_closed());
    }

    #[test]
    fn permutation_is_cached_per_pixel_count() {
        let coordinator = Coordinator::new();
        let a = coordinator.permutation(256);
        let b = coordinator.permutation(256);
        assert!(Arc::ptr_eq(&a, &b));
        let c = coordinator.permutation(64);
        assert!(!Arc::ptr_eq(&a, &c));
        // A permutation visits every index exactly once.
        let seen: HashSet<u32> = c.iter().copied().collect();
        assert_eq!(seen.len(), 64);
        assert!(seen.iter().all(|&i| i < 64));
    }

    #[test]
    fn permutation_actually_scatters() {
        let order = Coordinator::new().permutation(1024);
        let in_place = order.iter().enumerate().filter(|(i, &v)| *i == v as usize).count();
        assert!(in_place < 64, "shuffle left {in_place} indices in place");
    }
}
