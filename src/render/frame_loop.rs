//! Self-rescheduling per-frame loop.
//!
//! [`RenderLoop`] asks a [`FrameScheduler`] for one callback at a time and re-registers from
//! inside that callback until [`RenderLoop::stop`] is called or the loop is dropped. Stopping
//! cancels the pending request synchronously, so no tick runs after `stop` returns.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

/// Timestamp handed to a frame callback, measured from the scheduler's origin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct FrameTime(pub Duration);

impl FrameTime {
    pub fn from_secs_f64(secs: f64) -> Self {
        Self(Duration::from_secs_f64(secs.max(0.0)))
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0.as_secs_f64()
    }
}

/// Identifier of a pending frame request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameRequestId(pub u64);

/// Frame callback type.
pub type FrameCallback = Box<dyn FnOnce(FrameTime)>;

/// Host per-frame mechanism (`requestAnimationFrame`, a vsync source, a test driver).
pub trait FrameScheduler {
    /// Run `callback` once on the next frame.
    fn request_frame(&self, callback: FrameCallback) -> FrameRequestId;

    /// Drop a pending request. Unknown or already-run ids are ignored.
    fn cancel_frame(&self, id: FrameRequestId);
}

/// Deterministic scheduler: frames run only when [`ManualScheduler::fire`] is called.
#[derive(Default)]
pub struct ManualScheduler {
    next_id: Cell<u64>,
    pending: RefCell<Vec<(FrameRequestId, FrameCallback)>>,
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of callbacks waiting for the next frame.
    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Run every callback registered before this call. Returns how many ran.
    ///
    /// Callbacks registered while firing wait for the next call.
    pub fn fire(&self, now: FrameTime) -> usize {
        let batch = std::mem::take(&mut *self.pending.borrow_mut());
        let n = batch.len();
        for (_, cb) in batch {
            cb(now);
        }
        n
    }

    /// Fire `frames` frames spaced `step` apart, starting at `start`. Returns the last timestamp.
    pub fn run_frames(&self, start: FrameTime, step: Duration, frames: u32) -> FrameTime {
        let mut now = start;
        for i in 0..frames {
            if i > 0 {
                now = FrameTime(now.0 + step);
            }
            self.fire(now);
        }
        now
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&self, callback: FrameCallback) -> FrameRequestId {
        let id = FrameRequestId(self.next_id.get());
        self.next_id.set(id.0.wrapping_add(1));
        self.pending.borrow_mut().push((id, callback));
        id
    }

    fn cancel_frame(&self, id: FrameRequestId) {
        self.pending.borrow_mut().retain(|(pending, _)| *pending != id);
    }
}

struct LoopInner {
    scheduler: Rc<dyn FrameScheduler>,
    tick: RefCell<Box<dyn FnMut(FrameTime)>>,
    running: Cell<bool>,
    pending: Cell<Option<FrameRequestId>>,
    frames: Cell<u64>,
}

/// Free-running render loop.
pub struct RenderLoop {
    inner: Rc<LoopInner>,
}

impl std::fmt::Debug for RenderLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderLoop")
            .field("running", &self.inner.running.get())
            .field("frames", &self.inner.frames.get())
            .finish()
    }
}

impl RenderLoop {
    /// Create a stopped loop that will call `tick` once per frame.
    pub fn new(scheduler: Rc<dyn FrameScheduler>, tick: impl FnMut(FrameTime) + 'static) -> Self {
        Self {
            inner: Rc::new(LoopInner {
                scheduler,
                tick: RefCell::new(Box::new(tick)),
                running: Cell::new(false),
                pending: Cell::new(None),
                frames: Cell::new(0),
            }),
        }
    }

    /// Start ticking. No-op when already running.
    pub fn start(&self) {
        if self.inner.running.get() {
            return;
        }
        self.inner.running.set(true);
        schedule(&self.inner);
    }

    /// Stop ticking and cancel the pending request.
    pub fn stop(&self) {
        self.inner.running.set(false);
        if let Some(id) = self.inner.pending.take() {
            self.inner.scheduler.cancel_frame(id);
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.get()
    }

    /// Number of ticks run so far.
    pub fn frame_count(&self) -> u64 {
        self.inner.frames.get()
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn schedule(inner: &Rc<LoopInner>) {
    let weak: Weak<LoopInner> = Rc::downgrade(inner);
    let id = inner.scheduler.request_frame(Box::new(move |now| {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        inner.pending.set(None);
        if !inner.running.get() {
            return;
        }
        match inner.tick.try_borrow_mut() {
            Ok(mut tick) => tick(now),
            Err(_) => tracing::warn!("re-entrant frame tick skipped"),
        }
        inner.frames.set(inner.frames.get() + 1);
        if inner.running.get() {
            schedule(&inner);
        }
    }));
    inner.pending.set(Some(id));
}

#[cfg(test)]
#[path = "../../tests/unit/render/frame_loop.rs"]
mod tests;
