#![forbid(unsafe_code)]

//! The component handle: the slice of a hosted component the data manager
//! reads and writes.
//!
//! # Design
//!
//! [`ComponentHandle`] is a cheaply cloneable `Rc` handle. It carries the
//! `data` mapping the manager patches, the "last fetch failed" flag, the
//! component's own state and the guarded state mutator.
//!
//! The mutator is guarded by a fetch-phase flag rather than by swapping the
//! mutator out. [`ComponentHandle::enter_fetch_phase`] returns a
//! [`FetchPhase`] guard; while any guard is alive, [`set_state`] fails with
//! [`BindError::ReentrantMutation`] and the attempt is recorded on the guard,
//! so a fetch that discards the error still fails. Dropping the guard
//! restores the prior phase on every path, including unwinding.
//!
//! [`set_state`]: ComponentHandle::set_state

use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;

use crate::error::{BindError, Result};
use crate::host::Host;
use crate::snapshot::{PatchSummary, Snapshot, patch};

static NEXT_COMPONENT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a hosted component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u64);

impl ComponentId {
    /// Allocate a fresh id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_COMPONENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "c{}", self.0)
    }
}

struct HandleInner {
    id: ComponentId,
    data: RefCell<Snapshot>,
    failed: Cell<bool>,
    state: RefCell<Snapshot>,
    /// Patches from `set_state` awaiting the next render pass.
    pending_state: RefCell<Snapshot>,
    fetch_phase: Cell<bool>,
    /// A mutation was attempted during the current fetch phase.
    mutation_attempted: Cell<bool>,
    render_requests: Cell<u64>,
    host: Rc<dyn Host>,
}

/// Shared handle to one hosted component.
#[derive(Clone)]
pub struct ComponentHandle {
    inner: Rc<HandleInner>,
}

impl std::fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentHandle")
            .field("id", &self.inner.id)
            .field("data", &*self.inner.data.borrow())
            .field("failed", &self.inner.failed.get())
            .field("fetch_phase", &self.inner.fetch_phase.get())
            .finish()
    }
}

impl ComponentHandle {
    #[must_use]
    pub fn new(host: Rc<dyn Host>) -> Self {
        Self {
            inner: Rc::new(HandleInner {
                id: ComponentId::next(),
                data: RefCell::new(Snapshot::new()),
                failed: Cell::new(false),
                state: RefCell::new(Snapshot::new()),
                pending_state: RefCell::new(Snapshot::new()),
                fetch_phase: Cell::new(false),
                mutation_attempted: Cell::new(false),
                render_requests: Cell::new(0),
                host,
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> ComponentId {
        self.inner.id
    }

    /// Borrow the data mapping.
    ///
    /// # Panics
    ///
    /// Panics if held across a call that patches data (re-entrant borrow).
    #[must_use]
    pub fn data(&self) -> Ref<'_, Snapshot> {
        self.inner.data.borrow()
    }

    /// Look up one data key.
    #[must_use]
    pub fn data_value(&self, key: &str) -> Option<Value> {
        self.inner.data.borrow().get(key).cloned()
    }

    /// Write a key that no snapshot owns. Patches never remove it unless a
    /// snapshot later claims the same key.
    pub fn insert_data(&self, key: impl Into<String>, value: Value) {
        self.inner.data.borrow_mut().insert(key.into(), value);
    }

    /// Whether the most recent fetch produced no usable snapshot.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.inner.failed.get()
    }

    pub(crate) fn set_failed(&self, failed: bool) {
        self.inner.failed.set(failed);
    }

    pub(crate) fn patch_data(&self, previous: Option<&Snapshot>, next: &Snapshot) -> PatchSummary {
        patch(&mut self.inner.data.borrow_mut(), previous, next)
    }

    /// Committed component state.
    #[must_use]
    pub fn state(&self) -> Snapshot {
        self.inner.state.borrow().clone()
    }

    pub(crate) fn commit_state(&self, state: Snapshot) {
        *self.inner.state.borrow_mut() = state;
    }

    /// Queue a state patch and ask the host for a render.
    ///
    /// Fails with [`BindError::ReentrantMutation`] during a data fetch.
    pub fn set_state(&self, patch: Snapshot) -> Result<()> {
        self.ensure_mutable()?;
        self.inner.pending_state.borrow_mut().extend(patch);
        self.request_render();
        Ok(())
    }

    /// Current state with queued patches applied, draining the queue.
    pub(crate) fn take_next_state(&self) -> Snapshot {
        let pending = std::mem::take(&mut *self.inner.pending_state.borrow_mut());
        let mut next = self.state();
        next.extend(pending);
        next
    }

    pub(crate) fn ensure_mutable(&self) -> Result<()> {
        if self.inner.fetch_phase.get() {
            self.inner.mutation_attempted.set(true);
            tracing::error!(
                message = "component.reentrant_set_state",
                component = %self.inner.id
            );
            return Err(BindError::ReentrantMutation);
        }
        Ok(())
    }

    /// Whether a data fetch is running for this component.
    #[must_use]
    pub fn in_fetch_phase(&self) -> bool {
        self.inner.fetch_phase.get()
    }

    /// Block state mutation until the returned guard drops.
    pub fn enter_fetch_phase(&self) -> FetchPhase<'_> {
        let previous = self.inner.fetch_phase.replace(true);
        let previous_attempted = self.inner.mutation_attempted.replace(false);
        FetchPhase {
            handle: self,
            previous,
            previous_attempted,
        }
    }

    /// Ask the host to force a render of this component.
    pub fn request_render(&self) {
        self.inner
            .render_requests
            .set(self.inner.render_requests.get() + 1);
        self.inner.host.request_render(self.inner.id);
    }

    /// Number of render requests sent to the host.
    #[must_use]
    pub fn render_requests(&self) -> u64 {
        self.inner.render_requests.get()
    }
}

/// Guard returned by [`ComponentHandle::enter_fetch_phase`].
#[must_use = "the fetch phase ends when the guard drops"]
pub struct FetchPhase<'a> {
    handle: &'a ComponentHandle,
    previous: bool,
    previous_attempted: bool,
}

impl FetchPhase<'_> {
    /// Whether `set_state` was called since this phase began, even if the
    /// caller discarded the error.
    #[must_use]
    pub fn mutation_attempted(&self) -> bool {
        self.handle.inner.mutation_attempted.get()
    }
}

impl Drop for FetchPhase<'_> {
    fn drop(&mut self) {
        let inner = &self.handle.inner;
        inner.fetch_phase.set(self.previous);
        // An enclosing phase sees attempts made in nested ones.
        let attempted = self.previous && (self.previous_attempted || inner.mutation_attempted.get());
        inner.mutation_attempted.set(attempted);
    }
}
