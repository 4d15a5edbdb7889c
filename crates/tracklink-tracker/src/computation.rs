#![forbid(unsafe_code)]

//! Tracked computations.
//!
//! # Design
//!
//! A [`Computation`] wraps a body closure and its tracking state in shared,
//! reference-counted storage. While the body runs, the computation is the
//! tracker's current computation, so every [`Dependency`](crate::Dependency)
//! read registers it as a dependent. A later `changed()` on any of those
//! dependencies invalidates it; the tracker reruns it at the next flush.
//!
//! # Invariants
//!
//! 1. `invalidate()` is idempotent until the next rerun; the computation is
//!    queued at most once per invalidation.
//! 2. `stop()` is idempotent. A stopped computation is also invalidated, so
//!    `on_invalidate` callbacks always run before `on_stop` callbacks.
//! 3. The body is never re-entered: a rerun requested while the body is
//!    running is deferred to the next flush.
//! 4. Callbacks registered after the matching event fire immediately.
//!
//! # Failure Modes
//!
//! - **Tracker dropped**: the computation becomes inert. `invalidate()` and
//!   `stop()` still flip their flags and run callbacks, but nothing reruns.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::tracker::TrackerInner;

type Body = Box<dyn FnMut(&Computation)>;
type Callback = Box<dyn FnOnce(&Computation)>;

/// Shared interior for [`Computation`].
pub(crate) struct ComputationInner {
    id: u64,
    first_run: Cell<bool>,
    invalidated: Cell<bool>,
    stopped: Cell<bool>,
    /// `None` while the body runs, and after stop.
    body: RefCell<Option<Body>>,
    on_invalidate: RefCell<Vec<Callback>>,
    on_stop: RefCell<Vec<Callback>>,
    tracker: Weak<TrackerInner>,
}

/// Handle to a tracked computation.
///
/// Cloning a `Computation` creates a new handle to the **same** computation.
#[derive(Clone)]
pub struct Computation {
    pub(crate) inner: Rc<ComputationInner>,
}

impl std::fmt::Debug for Computation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computation")
            .field("id", &self.inner.id)
            .field("first_run", &self.inner.first_run.get())
            .field("invalidated", &self.inner.invalidated.get())
            .field("stopped", &self.inner.stopped.get())
            .finish()
    }
}

impl PartialEq for Computation {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Computation {}

impl Computation {
    pub(crate) fn new(id: u64, tracker: Weak<TrackerInner>, body: Body) -> Self {
        Self {
            inner: Rc::new(ComputationInner {
                id,
                first_run: Cell::new(true),
                invalidated: Cell::new(false),
                stopped: Cell::new(false),
                body: RefCell::new(Some(body)),
                on_invalidate: RefCell::new(Vec::new()),
                on_stop: RefCell::new(Vec::new()),
                tracker,
            }),
        }
    }

    pub(crate) fn from_weak(weak: &Weak<ComputationInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    pub(crate) fn downgrade(&self) -> Weak<ComputationInner> {
        Rc::downgrade(&self.inner)
    }

    /// Runtime-unique identifier.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// True only while the body runs for the first time.
    #[must_use]
    pub fn is_first_run(&self) -> bool {
        self.inner.first_run.get()
    }

    /// Whether a dependency changed since the last run.
    #[must_use]
    pub fn is_invalidated(&self) -> bool {
        self.inner.invalidated.get()
    }

    /// Whether the computation has been stopped.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.get()
    }

    /// Register a callback for the next invalidation. Runs immediately if the
    /// computation is already invalidated.
    pub fn on_invalidate(&self, f: impl FnOnce(&Computation) + 'static) {
        if self.inner.invalidated.get() {
            self.nonreactive(|| f(self));
        } else {
            self.inner.on_invalidate.borrow_mut().push(Box::new(f));
        }
    }

    /// Register a callback for stop. Runs immediately if already stopped.
    pub fn on_stop(&self, f: impl FnOnce(&Computation) + 'static) {
        if self.inner.stopped.get() {
            self.nonreactive(|| f(self));
        } else {
            self.inner.on_stop.borrow_mut().push(Box::new(f));
        }
    }

    /// Mark the computation stale and queue it for the next flush.
    pub fn invalidate(&self) {
        if self.inner.invalidated.get() {
            return;
        }
        self.inner.invalidated.set(true);

        if !self.inner.stopped.get() {
            if let Some(tracker) = self.inner.tracker.upgrade() {
                tracker.schedule(self.clone());
            }
        }

        let callbacks = std::mem::take(&mut *self.inner.on_invalidate.borrow_mut());
        for callback in callbacks {
            self.nonreactive(|| callback(self));
        }
    }

    /// Stop the computation. It will never rerun.
    pub fn stop(&self) {
        if self.inner.stopped.get() {
            return;
        }
        self.inner.stopped.set(true);
        self.invalidate();

        let callbacks = std::mem::take(&mut *self.inner.on_stop.borrow_mut());
        for callback in callbacks {
            self.nonreactive(|| callback(self));
        }

        // Release whatever the body captured.
        let body = self.inner.body.borrow_mut().take();
        drop(body);

        tracing::debug!(message = "computation.stop", id = self.inner.id);
    }

    pub(crate) fn run_first(&self) {
        self.run();
        self.inner.first_run.set(false);
    }

    /// Rerun if invalidated and not stopped. Returns whether the body ran.
    pub(crate) fn recompute(&self) -> bool {
        if !self.inner.invalidated.get() || self.inner.stopped.get() {
            return false;
        }
        self.inner.invalidated.set(false);
        self.run();
        true
    }

    fn run(&self) {
        let Some(tracker) = self.inner.tracker.upgrade() else {
            return;
        };
        let taken = self.inner.body.borrow_mut().take();
        let Some(mut body) = taken else {
            return;
        };

        tracker.with_current(Some(self.clone()), || body(self));

        if !self.inner.stopped.get() {
            *self.inner.body.borrow_mut() = Some(body);
        }
    }

    fn nonreactive(&self, f: impl FnOnce()) {
        match self.inner.tracker.upgrade() {
            Some(tracker) => tracker.with_current(None, f),
            None => f(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
