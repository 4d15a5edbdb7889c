#![forbid(unsafe_code)]

//! The seam between the data manager and a dependency-tracking runtime.
//!
//! The manager needs four things from a tracker: create a computation, learn
//! whether the body is on its first run, stop a computation, and run a block
//! outside any enclosing computation. [`TrackingRuntime`] names exactly
//! those. [`tracklink_tracker::Tracker`] implements it; other runtimes can
//! too.

use tracklink_tracker::{Computation, Tracker};

/// One tracked computation as seen by the data manager.
pub trait TrackedComputation {
    /// True while the body runs for the first time.
    fn is_first_run(&self) -> bool;

    /// Stop the computation. Idempotent. A stopped computation never reruns.
    fn stop(&self);

    fn is_stopped(&self) -> bool;
}

/// A dependency-tracking runtime.
pub trait TrackingRuntime {
    type Computation: TrackedComputation + Clone + 'static;

    /// Create a computation and run `body` once, synchronously. The runtime
    /// reruns `body` after any dependency read during a run changes.
    fn autorun(&self, body: Box<dyn FnMut(&Self::Computation)>) -> Self::Computation;

    /// Run `f` with no enclosing computation.
    fn nonreactive<R>(&self, f: impl FnOnce() -> R) -> R;
}

impl TrackedComputation for Computation {
    fn is_first_run(&self) -> bool {
        Computation::is_first_run(self)
    }

    fn stop(&self) {
        Computation::stop(self);
    }

    fn is_stopped(&self) -> bool {
        Computation::is_stopped(self)
    }
}

impl TrackingRuntime for Tracker {
    type Computation = Computation;

    fn autorun(&self, mut body: Box<dyn FnMut(&Computation)>) -> Computation {
        Tracker::autorun(self, move |c: &Computation| body(c))
    }

    fn nonreactive<R>(&self, f: impl FnOnce() -> R) -> R {
        Tracker::nonreactive(self, f)
    }
}
