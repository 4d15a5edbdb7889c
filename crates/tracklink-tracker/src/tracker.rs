#![forbid(unsafe_code)]

//! The tracking runtime.
//!
//! # Design
//!
//! [`Tracker`] is a cheaply cloneable handle (`Rc` inside) to the shared
//! runtime state: the computation currently running (if any), the FIFO queue
//! of invalidated computations and the `after_flush` callbacks.
//!
//! # Failure Modes
//!
//! - **Reentrant flush**: calling [`Tracker::flush`] from inside a body or
//!   callback that is itself running under `flush()` returns
//!   [`TrackerError::ReentrantFlush`] and changes nothing.
//! - **Runaway invalidation**: a flush that recomputes more than its limit
//!   (default [`MAX_FLUSH_ROUNDS`]) stops with
//!   [`TrackerError::FlushLimitExceeded`]. Computations still queued stay
//!   queued for the next flush.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::computation::Computation;
use crate::dependency::Dependency;
use crate::error::{Result, TrackerError};
use crate::var::ReactiveVar;

/// Default upper bound on recomputations performed by a single flush.
pub const MAX_FLUSH_ROUNDS: usize = 1000;

/// Shared interior for [`Tracker`].
pub(crate) struct TrackerInner {
    /// Computation whose body is running right now.
    current: RefCell<Option<Computation>>,
    /// Invalidated computations awaiting rerun, in invalidation order.
    pending: RefCell<VecDeque<Computation>>,
    /// Callbacks run once the pending queue is empty.
    after_flush: RefCell<Vec<Box<dyn FnOnce()>>>,
    next_id: Cell<u64>,
    flushing: Cell<bool>,
    flush_limit: Cell<usize>,
}

impl TrackerInner {
    pub(crate) fn current(&self) -> Option<Computation> {
        self.current.borrow().clone()
    }

    pub(crate) fn schedule(&self, computation: Computation) {
        self.pending.borrow_mut().push_back(computation);
    }

    /// Run `f` with `computation` as the current computation.
    pub(crate) fn with_current<R>(&self, computation: Option<Computation>, f: impl FnOnce() -> R) -> R {
        let _guard = CurrentGuard::enter(self, computation);
        f()
    }
}

/// Restores the previous current computation on drop, even on unwind.
struct CurrentGuard<'a> {
    tracker: &'a TrackerInner,
    previous: Option<Computation>,
}

impl<'a> CurrentGuard<'a> {
    fn enter(tracker: &'a TrackerInner, computation: Option<Computation>) -> Self {
        let previous = tracker.current.replace(computation);
        Self { tracker, previous }
    }
}

impl Drop for CurrentGuard<'_> {
    fn drop(&mut self) {
        self.tracker.current.replace(self.previous.take());
    }
}

struct FlushGuard<'a>(&'a TrackerInner);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.flushing.set(false);
    }
}

/// Handle to a tracking runtime.
///
/// Cloning a `Tracker` creates a new handle to the **same** runtime.
#[derive(Clone)]
pub struct Tracker {
    inner: Rc<TrackerInner>,
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("active", &self.is_active())
            .field("pending", &self.pending_count())
            .field("flushing", &self.inner.flushing.get())
            .finish()
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracker {
    /// Create an empty runtime.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(TrackerInner {
                current: RefCell::new(None),
                pending: RefCell::new(VecDeque::new()),
                after_flush: RefCell::new(Vec::new()),
                next_id: Cell::new(1),
                flushing: Cell::new(false),
                flush_limit: Cell::new(MAX_FLUSH_ROUNDS),
            }),
        }
    }

    /// Override the per-flush recomputation limit.
    #[must_use]
    pub fn with_flush_limit(self, limit: usize) -> Self {
        self.inner.flush_limit.set(limit.max(1));
        self
    }

    pub(crate) fn downgrade(&self) -> std::rc::Weak<TrackerInner> {
        Rc::downgrade(&self.inner)
    }

    /// Create a computation and run its body once, synchronously.
    ///
    /// The body reruns at the next [`flush`](Self::flush) after any
    /// dependency it read changes. If another computation is current, the new
    /// computation is stopped when that parent invalidates.
    pub fn autorun(&self, body: impl FnMut(&Computation) + 'static) -> Computation {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);

        let computation = Computation::new(id, self.downgrade(), Box::new(body));

        if let Some(parent) = self.inner.current() {
            let child = computation.clone();
            parent.on_invalidate(move |_| child.stop());
            tracing::debug!(message = "tracker.autorun", id, parent = parent.id());
        } else {
            tracing::debug!(message = "tracker.autorun", id);
        }

        computation.run_first();
        computation
    }

    /// Run `f` with no current computation, so nothing it reads is tracked
    /// and nothing it creates is owned by an enclosing computation.
    pub fn nonreactive<R>(&self, f: impl FnOnce() -> R) -> R {
        self.inner.with_current(None, f)
    }

    /// The computation whose body is running, if any.
    #[must_use]
    pub fn current(&self) -> Option<Computation> {
        self.inner.current()
    }

    /// Whether a computation body is running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.current.borrow().is_some()
    }

    /// Whether a flush is in progress.
    #[must_use]
    pub fn is_flushing(&self) -> bool {
        self.inner.flushing.get()
    }

    /// Number of invalidated computations waiting for the next flush.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending.borrow().len()
    }

    /// Register a callback to run once the current (or next) flush has
    /// drained the pending queue.
    pub fn after_flush(&self, f: impl FnOnce() + 'static) {
        self.inner.after_flush.borrow_mut().push(Box::new(f));
    }

    /// Create a dependency bound to this runtime.
    #[must_use]
    pub fn dependency(&self) -> Dependency {
        Dependency::new(self)
    }

    /// Create a reactive var bound to this runtime.
    #[must_use]
    pub fn var<T: Clone + PartialEq + 'static>(&self, value: T) -> ReactiveVar<T> {
        ReactiveVar::new(self, value)
    }

    /// Rerun every invalidated, non-stopped computation, then run the
    /// `after_flush` callbacks. Returns the number of computations rerun.
    pub fn flush(&self) -> Result<usize> {
        if self.inner.flushing.get() {
            tracing::warn!(message = "tracker.flush.reentrant");
            return Err(TrackerError::ReentrantFlush);
        }
        self.inner.flushing.set(true);
        let _flushing = FlushGuard(&self.inner);

        let limit = self.inner.flush_limit.get();
        let mut rerun = 0usize;
        loop {
            let next = self.inner.pending.borrow_mut().pop_front();
            match next {
                Some(computation) => {
                    if computation.recompute() {
                        rerun += 1;
                        if rerun >= limit && !self.inner.pending.borrow().is_empty() {
                            tracing::warn!(message = "tracker.flush.limit", rounds = rerun);
                            return Err(TrackerError::FlushLimitExceeded { rounds: rerun });
                        }
                    }
                }
                None => {
                    let callbacks = std::mem::take(&mut *self.inner.after_flush.borrow_mut());
                    if callbacks.is_empty() {
                        break;
                    }
                    for callback in callbacks {
                        callback();
                    }
                }
            }
        }

        tracing::debug!(message = "tracker.flush", rerun);
        Ok(rerun)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
