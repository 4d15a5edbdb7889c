#![forbid(unsafe_code)]

//! Reactive components: a render function plus a data manager.
//!
//! [`ReactiveComponent`] is the lifecycle a host drives. [`TrackedComponent`]
//! implements it for both update policies in [`Purity`]: a plain component
//! renders on every update, a pure one skips updates whose props and state
//! are unchanged. Both recompute data the same way, before render, with the
//! prospective inputs.

use std::rc::Rc;

use crate::component::{ComponentHandle, ComponentId};
use crate::error::{BindError, Result};
use crate::manager::{DataManager, ManagerStats};
use crate::snapshot::Snapshot;
use crate::tracking::TrackingRuntime;

/// Update policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Purity {
    /// Re-render on every update.
    Plain,
    /// Re-render only when props or state changed (shallow compare).
    #[default]
    Pure,
}

impl Purity {
    #[must_use]
    pub fn from_pure(pure: bool) -> Self {
        if pure { Self::Pure } else { Self::Plain }
    }

    /// Whether an update from (`props`, `state`) to (`next_props`,
    /// `next_state`) should render.
    #[must_use]
    pub fn should_update<P: PartialEq>(
        self,
        props: &P,
        state: &Snapshot,
        next_props: &P,
        next_state: &Snapshot,
    ) -> bool {
        match self {
            Self::Plain => true,
            Self::Pure => props != next_props || state != next_state,
        }
    }
}

/// What a render function receives: the component's props with its data
/// spread alongside.
#[derive(Debug)]
pub struct RenderProps<'a, P> {
    pub props: &'a P,
    pub data: &'a Snapshot,
    /// The last fetch produced no snapshot.
    pub failed: bool,
}

impl<P> RenderProps<'_, P> {
    /// Look up a data key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }
}

/// A user-supplied render function.
pub type RenderFn<P, O> = dyn Fn(&RenderProps<'_, P>) -> O;

/// Lifecycle a host drives for one component.
pub trait ReactiveComponent {
    type Props;
    type Output;

    fn id(&self) -> ComponentId;

    /// Whether moving to the given inputs warrants a render.
    fn should_update(&self, next_props: &Self::Props, next_state: &Snapshot) -> bool;

    /// Before render, with prospective inputs. Recomputes data.
    fn will_update(&mut self, next_props: &Self::Props, next_state: &Snapshot);

    fn render(&self) -> Self::Output;

    /// Render error boundary. Performs no recovery.
    fn did_catch(&self, error: &BindError);

    /// Tear down. No render request is sent afterwards.
    fn unmount(&mut self);
}

/// Parts a factory hands to [`TrackedComponent::mount`].
pub(crate) struct Parts<R: TrackingRuntime, P, O> {
    pub manager: DataManager<R, P>,
    pub render: Rc<RenderFn<P, O>>,
    pub purity: Purity,
}

/// A component whose data comes from a tracked fetch function.
pub struct TrackedComponent<R: TrackingRuntime, P, O> {
    manager: DataManager<R, P>,
    render: Rc<RenderFn<P, O>>,
    purity: Purity,
    props: P,
    renders: u64,
    mounted: bool,
}

impl<R: TrackingRuntime, P: std::fmt::Debug, O> std::fmt::Debug for TrackedComponent<R, P, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedComponent")
            .field("id", &self.manager.component().id())
            .field("props", &self.props)
            .field("purity", &self.purity)
            .field("renders", &self.renders)
            .field("mounted", &self.mounted)
            .finish()
    }
}

impl<R, P, O> TrackedComponent<R, P, O>
where
    R: TrackingRuntime,
    P: Clone + PartialEq + 'static,
{
    /// Pre-mount: compute initial data from `props` and empty state.
    pub(crate) fn mount(parts: Parts<R, P, O>, props: P) -> Self {
        let Parts {
            mut manager,
            render,
            purity,
        } = parts;
        manager.recompute(&props, &Snapshot::new());
        tracing::debug!(
            message = "component.mount",
            component = %manager.component().id(),
            ?purity
        );
        Self {
            manager,
            render,
            purity,
            props,
            renders: 0,
            mounted: true,
        }
    }

    #[must_use]
    pub fn props(&self) -> &P {
        &self.props
    }

    #[must_use]
    pub fn state(&self) -> Snapshot {
        self.handle().state()
    }

    #[must_use]
    pub fn handle(&self) -> &ComponentHandle {
        self.manager.component()
    }

    #[must_use]
    pub fn data_value(&self, key: &str) -> Option<serde_json::Value> {
        self.handle().data_value(key)
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.handle().is_failed()
    }

    #[must_use]
    pub fn purity(&self) -> Purity {
        self.purity
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Completed update passes (each followed by a render).
    #[must_use]
    pub fn render_count(&self) -> u64 {
        self.renders
    }

    #[must_use]
    pub fn stats(&self) -> ManagerStats {
        self.manager.stats()
    }

    #[must_use]
    pub fn manager(&self) -> &DataManager<R, P> {
        &self.manager
    }

    /// New props from the parent. Returns whether an update pass ran.
    pub fn set_props(&mut self, next: P) -> bool {
        let next_state = self.handle().take_next_state();
        self.update(next, next_state, false)
    }

    /// Merge `patch` into state. Returns whether an update pass ran.
    ///
    /// Fails with [`BindError::ReentrantMutation`] during a data fetch.
    pub fn set_state(&mut self, patch: Snapshot) -> Result<bool> {
        self.handle().ensure_mutable()?;
        let mut next_state = self.handle().take_next_state();
        next_state.extend(patch);
        Ok(self.update(self.props.clone(), next_state, false))
    }

    /// Host-requested render: skips `should_update`, recomputes data with
    /// the current props and any queued state.
    pub fn force_update(&mut self) -> bool {
        let next_state = self.handle().take_next_state();
        self.update(self.props.clone(), next_state, true)
    }

    fn update(&mut self, next_props: P, next_state: Snapshot, force: bool) -> bool {
        if !self.mounted {
            return false;
        }
        let render = force || self.should_update(&next_props, &next_state);
        if render {
            self.will_update(&next_props, &next_state);
            self.renders += 1;
        }
        self.props = next_props;
        self.handle().commit_state(next_state);
        render
    }
}

impl<R, P, O> ReactiveComponent for TrackedComponent<R, P, O>
where
    R: TrackingRuntime,
    P: Clone + PartialEq + 'static,
{
    type Props = P;
    type Output = O;

    fn id(&self) -> ComponentId {
        self.handle().id()
    }

    fn should_update(&self, next_props: &P, next_state: &Snapshot) -> bool {
        let state = self.handle().state();
        self.purity
            .should_update(&self.props, &state, next_props, next_state)
    }

    fn will_update(&mut self, next_props: &P, next_state: &Snapshot) {
        self.manager.recompute(next_props, next_state);
    }

    fn render(&self) -> O {
        let data = self.handle().data();
        (self.render)(&RenderProps {
            props: &self.props,
            data: &data,
            failed: self.handle().is_failed(),
        })
    }

    fn did_catch(&self, error: &BindError) {
        tracing::warn!(
            message = "component.render_error",
            component = %self.id(),
            error = %error
        );
    }

    fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;
        self.manager.dispose();
        tracing::debug!(message = "component.unmount", component = %self.id());
    }
}
