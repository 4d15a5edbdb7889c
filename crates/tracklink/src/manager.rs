#![forbid(unsafe_code)]

//! The data manager: one per hosted component.
//!
//! # Design
//!
//! [`DataManager`] owns at most one tracked computation per component. Each
//! call to [`calculate_data`](DataManager::calculate_data) stops the previous
//! computation and creates a fresh one whose body has two paths:
//!
//! - **First run**: enter the fetch phase, call the fetch function with the
//!   prospective props and state, validate the result, and hand it back to
//!   the manager through a shared slot.
//! - **Any later run** (a source read during the first run changed): stop,
//!   then ask the host to re-render. The render pass calls `calculate_data`
//!   again, which creates the next computation.
//!
//! # Invariants
//!
//! 1. At most one live computation per manager.
//! 2. `data` is only ever patched, never replaced.
//! 3. `is_failed()` on the handle is true iff the last fetch produced no
//!    snapshot.
//! 4. After [`dispose`](DataManager::dispose) (or drop) no render request is
//!    sent for this component.
//!
//! # Failure Modes
//!
//! - **Fetch returns `Err`**, **returns a non-mapping**, or **calls
//!   `set_state`** (even when the fetch discards the error): logged at `error`, counted, recorded as
//!   [`last_error`](DataManager::last_error), and the snapshot is treated as
//!   absent. Nothing propagates to the caller.
//! - **Runtime does not run the body synchronously**: handled like a failed
//!   fetch, with [`BindError::FetchNotRun`].

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::Serialize;
use serde_json::Value;

use crate::component::{ComponentHandle, ComponentId};
use crate::config::BindConfig;
use crate::cursor::{CursorProbe, live_cursor_keys};
use crate::error::{BindError, Result};
use crate::snapshot::{Snapshot, into_snapshot};
use crate::tracking::{TrackedComputation, TrackingRuntime};

/// A user-supplied data fetch function.
pub type FetchFn<P> = dyn Fn(&FetchContext<'_, P>) -> Result<Value>;

/// What a fetch function sees: the prospective inputs and read-only access
/// to the component.
pub struct FetchContext<'a, P> {
    props: &'a P,
    state: &'a Snapshot,
    component: &'a ComponentHandle,
}

impl<'a, P> FetchContext<'a, P> {
    pub(crate) fn new(props: &'a P, state: &'a Snapshot, component: &'a ComponentHandle) -> Self {
        Self {
            props,
            state,
            component,
        }
    }

    #[must_use]
    pub fn props(&self) -> &'a P {
        self.props
    }

    #[must_use]
    pub fn state(&self) -> &'a Snapshot {
        self.state
    }

    /// The component the data is for.
    #[must_use]
    pub fn id(&self) -> ComponentId {
        self.component.id()
    }

    /// The component's current data, as patched by the previous fetch.
    #[must_use]
    pub fn data_value(&self, key: &str) -> Option<Value> {
        self.component.data_value(key)
    }

    /// Always fails: state cannot change while its data is being computed.
    pub fn set_state(&self, patch: Snapshot) -> Result<()> {
        self.component.set_state(patch)
    }
}

/// Counters for one manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ManagerStats {
    /// Fetch function invocations.
    pub fetches: u64,
    /// Fetches that produced no snapshot.
    pub failures: u64,
    /// Tracked computations created.
    pub computations_created: u64,
    /// Render requests sent after an invalidation.
    pub forced_renders: u64,
    /// Live cursors found in snapshots.
    pub cursor_warnings: u64,
}

#[derive(Default)]
struct StatsCell(Cell<ManagerStats>);

impl StatsCell {
    fn bump(&self, f: impl FnOnce(&mut ManagerStats)) {
        let mut stats = self.0.get();
        f(&mut stats);
        self.0.set(stats);
    }
}

/// Owns the tracked computation and data lifecycle of one component.
pub struct DataManager<R: TrackingRuntime, P> {
    runtime: R,
    component: ComponentHandle,
    fetch: Option<Rc<FetchFn<P>>>,
    config: BindConfig,
    cursor_probe: Option<Rc<dyn CursorProbe>>,
    computation: Option<R::Computation>,
    previous: Option<Snapshot>,
    stats: Rc<StatsCell>,
    last_error: Option<BindError>,
}

impl<R: TrackingRuntime, P> std::fmt::Debug for DataManager<R, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataManager")
            .field("component", &self.component.id())
            .field("has_fetch", &self.fetch.is_some())
            .field("live", &self.has_live_computation())
            .field("stats", &self.stats())
            .finish()
    }
}

impl<R: TrackingRuntime, P: Clone + 'static> DataManager<R, P> {
    #[must_use]
    pub fn new(
        runtime: R,
        component: ComponentHandle,
        fetch: Option<Rc<FetchFn<P>>>,
        config: BindConfig,
    ) -> Self {
        Self {
            runtime,
            component,
            fetch,
            config,
            cursor_probe: None,
            computation: None,
            previous: None,
            stats: Rc::new(StatsCell::default()),
            last_error: None,
        }
    }

    /// Install the optional cursor probe.
    #[must_use]
    pub fn with_cursor_probe(mut self, probe: Option<Rc<dyn CursorProbe>>) -> Self {
        self.cursor_probe = probe;
        self
    }

    /// Compute a fresh snapshot for `props` and `state`.
    ///
    /// Returns `None` when there is no fetch function or the fetch failed.
    pub fn calculate_data(&mut self, props: &P, state: &Snapshot) -> Option<Snapshot> {
        let fetch = Rc::clone(self.fetch.as_ref()?);

        let result = if self.config.environment.is_server() {
            self.stats.bump(|s| s.fetches += 1);
            fetch_snapshot(fetch.as_ref(), props, state, &self.component)
        } else {
            self.track_fetch(fetch, props, state)
                .unwrap_or(Err(BindError::FetchNotRun))
        };

        match result {
            Ok(snapshot) => {
                self.last_error = None;
                self.warn_on_cursors(&snapshot);
                Some(snapshot)
            }
            Err(err) => {
                tracing::error!(
                    message = "data_manager.fetch_failed",
                    component = %self.component.id(),
                    reentrant = err.is_reentrant(),
                    error = %err
                );
                self.stats.bump(|s| s.failures += 1);
                self.last_error = Some(err);
                None
            }
        }
    }

    /// Replace the live computation with one that fetches once, then stops
    /// and requests a render on the first invalidation.
    fn track_fetch(
        &mut self,
        fetch: Rc<FetchFn<P>>,
        props: &P,
        state: &Snapshot,
    ) -> Option<Result<Snapshot>> {
        self.stop_computation();

        let slot: Rc<RefCell<Option<Result<Snapshot>>>> = Rc::new(RefCell::new(None));
        let mut inputs = Some((props.clone(), state.clone()));
        let body_slot = Rc::clone(&slot);
        let component = self.component.clone();
        let stats = Rc::clone(&self.stats);

        let body = move |c: &R::Computation| {
            if c.is_first_run() {
                if let Some((props, state)) = inputs.take() {
                    stats.bump(|s| s.fetches += 1);
                    let result = fetch_snapshot(fetch.as_ref(), &props, &state, &component);
                    *body_slot.borrow_mut() = Some(result);
                }
                return;
            }
            c.stop();
            stats.bump(|s| s.forced_renders += 1);
            tracing::debug!(message = "data_manager.invalidated", component = %component.id());
            component.request_render();
        };

        let runtime = &self.runtime;
        let computation = runtime.nonreactive(|| runtime.autorun(Box::new(body)));
        self.computation = Some(computation);
        self.stats.bump(|s| s.computations_created += 1);

        let result = slot.borrow_mut().take();
        result
    }

    fn warn_on_cursors(&self, snapshot: &Snapshot) {
        if !self.config.cursor_warnings {
            return;
        }
        let Some(probe) = self.cursor_probe.as_deref() else {
            return;
        };
        for key in live_cursor_keys(probe, snapshot) {
            tracing::warn!(
                message = "data_manager.live_cursor",
                component = %self.component.id(),
                key,
                hint = "materialize the cursor in the fetch function; a cursor in data is not reactive"
            );
            self.stats.bump(|s| s.cursor_warnings += 1);
        }
    }

    /// Patch the component's data from the previous snapshot to `snapshot`.
    ///
    /// `None` patches to an empty mapping and sets the failed flag.
    pub fn update_data(&mut self, snapshot: Option<Snapshot>) {
        let failed = snapshot.is_none();
        let next = snapshot.unwrap_or_default();

        self.component.set_failed(failed);
        let summary = self.component.patch_data(self.previous.as_ref(), &next);
        tracing::trace!(
            message = "data_manager.patch",
            component = %self.component.id(),
            written = summary.written,
            removed = summary.removed,
            failed
        );
        self.previous = Some(next);
    }

    /// [`calculate_data`](Self::calculate_data) then
    /// [`update_data`](Self::update_data).
    pub fn recompute(&mut self, props: &P, state: &Snapshot) {
        if self.fetch.is_none() {
            return;
        }
        let snapshot = self.calculate_data(props, state);
        self.update_data(snapshot);
    }
}

impl<R: TrackingRuntime, P> DataManager<R, P> {
    #[must_use]
    pub fn component(&self) -> &ComponentHandle {
        &self.component
    }

    #[must_use]
    pub fn config(&self) -> &BindConfig {
        &self.config
    }

    /// Stop the live computation, if any. Idempotent.
    pub fn dispose(&mut self) {
        if self.stop_computation() {
            tracing::debug!(message = "data_manager.dispose", component = %self.component.id());
        }
    }

    fn stop_computation(&mut self) -> bool {
        match self.computation.take() {
            Some(computation) => {
                computation.stop();
                true
            }
            None => false,
        }
    }

    /// Whether a non-stopped computation is held.
    #[must_use]
    pub fn has_live_computation(&self) -> bool {
        self.computation.as_ref().is_some_and(|c| !c.is_stopped())
    }

    #[must_use]
    pub fn stats(&self) -> ManagerStats {
        self.stats.0.get()
    }

    /// The failure recorded by the most recent fetch, if it failed.
    #[must_use]
    pub fn last_error(&self) -> Option<&BindError> {
        self.last_error.as_ref()
    }

    /// Snapshot the next patch will diff against.
    #[must_use]
    pub fn previous_snapshot(&self) -> Option<&Snapshot> {
        self.previous.as_ref()
    }
}

impl<R: TrackingRuntime, P> Drop for DataManager<R, P> {
    fn drop(&mut self) {
        self.stop_computation();
    }
}

fn fetch_snapshot<P>(
    fetch: &FetchFn<P>,
    props: &P,
    state: &Snapshot,
    component: &ComponentHandle,
) -> Result<Snapshot> {
    let phase = component.enter_fetch_phase();
    let value = fetch(&FetchContext::new(props, state, component));
    if phase.mutation_attempted() {
        return Err(BindError::ReentrantMutation);
    }
    into_snapshot(value?)
}
