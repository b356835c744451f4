/*
 * queue.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Deferred render queue.
//!
//! Unforced render requests are collected here and executed together on the
//! platform's next frame. Any number of pushes between two drains schedules
//! exactly one frame callback.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use webcomp_render::RenderError;

/// Something the queue can render.
pub trait QueuedRender {
    /// Run a forced render.
    fn render_queued(&self) -> Result<(), RenderError>;

    /// Name used in log output.
    fn queue_name(&self) -> String;
}

/// Platform hook that runs [`RenderQueue::drain`] on the next frame.
pub trait FrameScheduler {
    fn request_frame(&self);
}

/// Scheduler that only records requests; the host drains by hand.
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    requests: Rc<Cell<usize>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames requested so far.
    pub fn requests(&self) -> usize {
        self.requests.get()
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&self) {
        self.requests.set(self.requests.get() + 1);
    }
}

type Entry = Rc<dyn QueuedRender>;

pub struct RenderQueue {
    queue: RefCell<Vec<Entry>>,
    scheduled: Cell<bool>,
    scheduler: Box<dyn FrameScheduler>,
}

impl RenderQueue {
    pub fn new(scheduler: impl FrameScheduler + 'static) -> Self {
        Self {
            queue: RefCell::new(Vec::new()),
            scheduled: Cell::new(false),
            scheduler: Box::new(scheduler),
        }
    }

    /// Queue `target` for the next frame.
    pub fn push(&self, target: Entry) {
        {
            let mut queue = self.queue.borrow_mut();
            if !queue.iter().any(|queued| same(queued, &target)) {
                queue.push(target);
            }
        }
        if !self.scheduled.replace(true) {
            self.scheduler.request_frame();
        }
    }

    /// Remove `target` from the queue (it was rendered by other means).
    pub fn pop(&self, target: &Entry) -> bool {
        let mut queue = self.queue.borrow_mut();
        let before = queue.len();
        queue.retain(|queued| !same(queued, target));
        queue.len() != before
    }

    pub fn queued(&self, target: &Entry) -> bool {
        self.queue.borrow().iter().any(|queued| same(queued, target))
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    /// Whether a frame callback is pending.
    pub fn is_scheduled(&self) -> bool {
        self.scheduled.get()
    }

    /// Frame callback: force-render everything queued so far.
    ///
    /// A failing render does not stop the others; every error is logged and
    /// returned. Targets queued while draining wait for the next frame.
    pub fn drain(&self) -> Vec<RenderError> {
        self.scheduled.set(false);
        let batch = std::mem::take(&mut *self.queue.borrow_mut());
        tracing::debug!(count = batch.len(), "draining render queue");

        let mut errors = Vec::new();
        for target in batch {
            if let Err(err) = target.render_queued() {
                tracing::error!(target = %target.queue_name(), error = %err, "queued render failed");
                errors.push(err);
            }
        }
        errors
    }
}

impl fmt::Debug for RenderQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderQueue")
            .field("queued", &self.len())
            .field("scheduled", &self.scheduled.get())
            .finish_non_exhaustive()
    }
}

fn same(a: &Entry, b: &Entry) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}
