#![forbid(unsafe_code)]

//! Reactive source markers.
//!
//! A [`Dependency`] carries no value. Code that owns a value calls
//! [`depend()`](Dependency::depend) when the value is read and
//! [`changed()`](Dependency::changed) when it is written. Dependents are held
//! weakly and removed when they invalidate, so a computation that stops
//! reading a source stops being invalidated by it after its next rerun.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::computation::{Computation, ComputationInner};
use crate::tracker::{Tracker, TrackerInner};

struct DependencyInner {
    tracker: Weak<TrackerInner>,
    dependents: RefCell<Vec<(u64, Weak<ComputationInner>)>>,
}

/// A reactive source marker bound to one [`Tracker`].
///
/// Cloning a `Dependency` creates a new handle to the **same** dependent set.
#[derive(Clone)]
pub struct Dependency {
    inner: Rc<DependencyInner>,
}

impl std::fmt::Debug for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dependency")
            .field("dependents", &self.inner.dependents.borrow().len())
            .finish()
    }
}

impl Dependency {
    #[must_use]
    pub fn new(tracker: &Tracker) -> Self {
        Self {
            inner: Rc::new(DependencyInner {
                tracker: tracker.downgrade(),
                dependents: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Register the current computation (if any) as a dependent.
    ///
    /// Returns `true` if a new dependent was added.
    pub fn depend(&self) -> bool {
        let current = self.inner.tracker.upgrade().and_then(|t| t.current());
        match current {
            Some(computation) => self.depend_on(&computation),
            None => false,
        }
    }

    /// Register `computation` as a dependent.
    pub fn depend_on(&self, computation: &Computation) -> bool {
        let id = computation.id();
        {
            let mut dependents = self.inner.dependents.borrow_mut();
            if dependents.iter().any(|(dep_id, _)| *dep_id == id) {
                return false;
            }
            dependents.push((id, computation.downgrade()));
        }

        let weak_self = Rc::downgrade(&self.inner);
        computation.on_invalidate(move |c| {
            if let Some(inner) = weak_self.upgrade() {
                inner
                    .dependents
                    .borrow_mut()
                    .retain(|(dep_id, _)| *dep_id != c.id());
            }
        });
        true
    }

    /// Invalidate every dependent.
    pub fn changed(&self) {
        // Collect first: invalidation callbacks edit the dependent list.
        let dependents: Vec<Computation> = self
            .inner
            .dependents
            .borrow()
            .iter()
            .filter_map(|(_, weak)| Computation::from_weak(weak))
            .collect();

        for computation in dependents {
            computation.invalidate();
        }
    }

    /// Whether any live computation depends on this source.
    #[must_use]
    pub fn has_dependents(&self) -> bool {
        let mut dependents = self.inner.dependents.borrow_mut();
        dependents.retain(|(_, weak)| weak.strong_count() > 0);
        !dependents.is_empty()
    }
}
