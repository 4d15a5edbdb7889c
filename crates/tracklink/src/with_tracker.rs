#![forbid(unsafe_code)]

//! Wrapper glue: turn a fetch function and a render function into a
//! component factory.
//!
//! ```
//! use std::rc::Rc;
//! use serde_json::json;
//! use tracklink::{FetchContext, ReactiveComponent, RenderProps, RenderQueue, with_tracker};
//! use tracklink_tracker::Tracker;
//!
//! let tracker = Tracker::new();
//! let count = tracker.var(1);
//! let source = count.clone();
//!
//! let factory = with_tracker(move |_: &FetchContext<'_, ()>| Ok(json!({ "count": source.get() })))
//!     .wrap(|p: &RenderProps<'_, ()>| format!("count={}", p.data["count"]));
//!
//! let host = Rc::new(RenderQueue::new());
//! let mut component = factory.mount(tracker.clone(), host.clone(), ());
//! assert_eq!(component.render(), "count=1");
//!
//! count.set(2);
//! tracker.flush().unwrap();
//! for _ in host.drain() {
//!     component.force_update();
//! }
//! assert_eq!(component.render(), "count=2");
//! ```

use std::rc::Rc;

use serde_json::Value;

use crate::component::ComponentHandle;
use crate::config::BindConfig;
use crate::cursor::CursorProbe;
use crate::error::Result;
use crate::host::Host;
use crate::manager::{DataManager, FetchContext, FetchFn};
use crate::reactive::{Parts, Purity, RenderFn, RenderProps, TrackedComponent};
use crate::tracking::TrackingRuntime;

/// Start building a factory whose components fetch data with `fetch`.
pub fn with_tracker<P, F>(fetch: F) -> WithTracker<P>
where
    F: Fn(&FetchContext<'_, P>) -> Result<Value> + 'static,
{
    WithTracker {
        fetch: Some(Rc::new(fetch)),
        config: BindConfig::default(),
        pure: None,
        cursor_probe: None,
    }
}

/// Builder returned by [`with_tracker`].
pub struct WithTracker<P> {
    fetch: Option<Rc<FetchFn<P>>>,
    config: BindConfig,
    pure: Option<bool>,
    cursor_probe: Option<Rc<dyn CursorProbe>>,
}

impl<P> WithTracker<P> {
    /// A builder with no fetch function: mounted components never get data.
    #[must_use]
    pub fn without_data() -> Self {
        Self {
            fetch: None,
            config: BindConfig::default(),
            pure: None,
            cursor_probe: None,
        }
    }

    /// Override [`BindConfig::pure`] for this factory.
    #[must_use]
    pub fn pure(mut self, pure: bool) -> Self {
        self.pure = Some(pure);
        self
    }

    #[must_use]
    pub fn config(mut self, config: BindConfig) -> Self {
        self.config = config;
        self
    }

    /// Warn when a snapshot embeds values `probe` recognizes as live cursors.
    #[must_use]
    pub fn cursor_probe(mut self, probe: impl CursorProbe + 'static) -> Self {
        self.cursor_probe = Some(Rc::new(probe));
        self
    }

    /// Finish with the render function.
    pub fn wrap<O>(self, render: impl Fn(&RenderProps<'_, P>) -> O + 'static) -> ComponentFactory<P, O> {
        let purity = Purity::from_pure(self.pure.unwrap_or(self.config.pure));
        ComponentFactory {
            fetch: self.fetch,
            render: Rc::new(render),
            config: self.config,
            purity,
            cursor_probe: self.cursor_probe,
        }
    }
}

/// Mounts [`TrackedComponent`]s that share one fetch and render function.
pub struct ComponentFactory<P, O> {
    fetch: Option<Rc<FetchFn<P>>>,
    render: Rc<RenderFn<P, O>>,
    config: BindConfig,
    purity: Purity,
    cursor_probe: Option<Rc<dyn CursorProbe>>,
}

impl<P, O> Clone for ComponentFactory<P, O> {
    fn clone(&self) -> Self {
        Self {
            fetch: self.fetch.clone(),
            render: Rc::clone(&self.render),
            config: self.config.clone(),
            purity: self.purity,
            cursor_probe: self.cursor_probe.clone(),
        }
    }
}

impl<P, O> ComponentFactory<P, O>
where
    P: Clone + PartialEq + 'static,
{
    #[must_use]
    pub fn purity(&self) -> Purity {
        self.purity
    }

    #[must_use]
    pub fn config(&self) -> &BindConfig {
        &self.config
    }

    /// Create a component and compute its initial data.
    pub fn mount<R: TrackingRuntime>(
        &self,
        runtime: R,
        host: Rc<dyn Host>,
        props: P,
    ) -> TrackedComponent<R, P, O> {
        let handle = ComponentHandle::new(host);
        let manager = DataManager::new(runtime, handle, self.fetch.clone(), self.config.clone())
            .with_cursor_probe(self.cursor_probe.clone());
        TrackedComponent::mount(
            Parts {
                manager,
                render: Rc::clone(&self.render),
                purity: self.purity,
            },
            props,
        )
    }
}
