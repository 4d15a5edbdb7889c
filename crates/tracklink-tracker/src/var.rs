#![forbid(unsafe_code)]

//! Version-tracked reactive values.
//!
//! # Invariants
//!
//! 1. Version increments exactly once per `set` that changes the value.
//! 2. Setting a value equal to the current value is a no-op (no version bump,
//!    no invalidation).
//! 3. Tracked reads (`get`, `with`) register the current computation;
//!    `get_untracked` never does.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::dependency::Dependency;
use crate::tracker::Tracker;

struct VarInner<T> {
    value: RefCell<T>,
    version: Cell<u64>,
    dep: Dependency,
}

/// A shared value whose reads are tracked and whose writes invalidate the
/// computations that read it.
///
/// Cloning a `ReactiveVar` creates a new handle to the **same** value.
pub struct ReactiveVar<T> {
    inner: Rc<VarInner<T>>,
}

impl<T> Clone for ReactiveVar<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ReactiveVar<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactiveVar")
            .field("value", &*self.inner.value.borrow())
            .field("version", &self.inner.version.get())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> ReactiveVar<T> {
    #[must_use]
    pub fn new(tracker: &Tracker, value: T) -> Self {
        Self {
            inner: Rc::new(VarInner {
                value: RefCell::new(value),
                version: Cell::new(0),
                dep: Dependency::new(tracker),
            }),
        }
    }

    /// Read the value, tracking it in the current computation.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.dep.depend();
        self.inner.value.borrow().clone()
    }

    /// Read the value without tracking.
    #[must_use]
    pub fn get_untracked(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Access the value by reference, tracking it in the current computation.
    ///
    /// # Panics
    ///
    /// Panics if the closure calls `set` on the same var (re-entrant borrow).
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.dep.depend();
        f(&self.inner.value.borrow())
    }

    /// Replace the value. Equal values are ignored.
    pub fn set(&self, value: T) {
        {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return;
            }
            *current = value;
        }
        self.inner.version.set(self.inner.version.get() + 1);
        self.inner.dep.changed();
    }

    /// Modify a copy of the value in place and store it.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut value = self.get_untracked();
        f(&mut value);
        self.set(value);
    }

    /// Number of changing writes so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Whether any live computation reads this var.
    #[must_use]
    pub fn has_dependents(&self) -> bool {
        self.inner.dep.has_dependents()
    }
}
