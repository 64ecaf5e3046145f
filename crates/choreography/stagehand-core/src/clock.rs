//! Time sources and one-shot frame callbacks.
//!
//! The clock is the only place the runtime learns about time. Frame
//! callbacks are one-shot; a callback requested while a batch is firing
//! waits for the next tick, never the current one.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Instant;

/// One-shot frame callback receiving the frame timestamp in milliseconds.
pub type FrameCallback = Box<dyn FnOnce(f64)>;

/// Cancel handle returned by `Clock::request_frame`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct FrameHandle(u64);

/// Abstract time source and per-frame scheduler.
pub trait Clock {
    /// Monotonic milliseconds.
    fn now(&self) -> f64;

    /// Schedule `callback` for the next frame.
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle;

    /// Cancel a pending callback. Cancelling before the frame fires guarantees it never runs;
    /// cancelling an already-fired or unknown handle is a no-op.
    fn cancel_frame(&self, handle: FrameHandle);
}

/// Pending callbacks plus the batch currently being fired.
#[derive(Default)]
struct FrameQueue {
    next_handle: Cell<u64>,
    pending: RefCell<Vec<(FrameHandle, FrameCallback)>>,
    firing: RefCell<VecDeque<(FrameHandle, FrameCallback)>>,
    in_fire: Cell<bool>,
}

impl FrameQueue {
    fn request(&self, callback: FrameCallback) -> FrameHandle {
        let handle = FrameHandle(self.next_handle.get());
        self.next_handle.set(handle.0.wrapping_add(1));
        self.pending.borrow_mut().push((handle, callback));
        handle
    }

    fn cancel(&self, handle: FrameHandle) {
        self.pending.borrow_mut().retain(|(h, _)| *h != handle);
        self.firing.borrow_mut().retain(|(h, _)| *h != handle);
    }

    fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Fire every callback pending at entry. Returns how many ran.
    fn fire(&self, timestamp: f64) -> usize {
        if self.in_fire.get() {
            log::warn!("frame tick requested while a tick is firing; deferring");
            return 0;
        }
        self.in_fire.set(true);
        {
            let batch = std::mem::take(&mut *self.pending.borrow_mut());
            self.firing.borrow_mut().extend(batch);
        }
        let mut fired = 0;
        loop {
            let next = self.firing.borrow_mut().pop_front();
            match next {
                Some((_, callback)) => {
                    callback(timestamp);
                    fired += 1;
                }
                None => break,
            }
        }
        self.in_fire.set(false);
        fired
    }
}

/// Deterministic virtual clock for tests and offline rendering.
/// Time only moves when `advance` is called.
#[derive(Default)]
pub struct TestClock {
    time: Cell<f64>,
    frames: FrameQueue,
}

impl TestClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(ms: f64) -> Self {
        let clock = Self::default();
        clock.time.set(ms);
        clock
    }

    /// Move time forward by `ms` and fire all callbacks pending before the call,
    /// passing the post-advance timestamp. Returns the number of callbacks fired.
    pub fn advance(&self, ms: f64) -> usize {
        let next = self.time.get() + ms.max(0.0);
        self.time.set(next);
        self.frames.fire(next)
    }

    /// Repeated `advance(frame_ms)` calls covering `total_ms`; the last one may be shorter.
    pub fn advance_in_frames(&self, total_ms: f64, frame_ms: f64) -> usize {
        if frame_ms <= 0.0 {
            return self.advance(total_ms);
        }
        let mut remaining = total_ms;
        let mut fired = 0;
        while remaining > 0.0 {
            let step = frame_ms.min(remaining);
            fired += self.advance(step);
            remaining -= step;
        }
        fired
    }

    /// Set the current time without firing anything. Never moves backwards.
    pub fn set_time(&self, ms: f64) {
        if ms > self.time.get() {
            self.time.set(ms);
        }
    }

    pub fn pending_frames(&self) -> usize {
        self.frames.len()
    }
}

impl Clock for TestClock {
    fn now(&self) -> f64 {
        self.time.get()
    }

    fn request_frame(&self, callback: FrameCallback) -> FrameHandle {
        self.frames.request(callback)
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        self.frames.cancel(handle);
    }
}

/// Production clock. `now` reads a monotonic `Instant`; frames fire when the
/// host calls `tick` from its native per-frame hook (display refresh, game loop).
pub struct HostClock {
    origin: Instant,
    frames: FrameQueue,
}

impl Default for HostClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            frames: FrameQueue::default(),
        }
    }
}

impl HostClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire pending frame callbacks at the current time.
    pub fn tick(&self) -> usize {
        let now = self.now();
        self.frames.fire(now)
    }

    pub fn pending_frames(&self) -> usize {
        self.frames.len()
    }
}

impl Clock for HostClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }

    fn request_frame(&self, callback: FrameCallback) -> FrameHandle {
        self.frames.request(callback)
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        self.frames.cancel(handle);
    }
}
