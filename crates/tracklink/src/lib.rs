#![forbid(unsafe_code)]

//! Re-render UI components when the reactive data they read changes.
//!
//! A component supplies a fetch function that reads reactive sources and
//! returns a [`Snapshot`]. The [`DataManager`] runs that function inside a
//! tracked computation, patches the result into the component's data and,
//! when any source it read changes, asks the [`Host`] to re-render.
//!
//! # Key Components
//!
//! - [`DataManager`] - per-component computation and data lifecycle
//! - [`ComponentHandle`] - data, failed flag and guarded state mutator
//! - [`TrackedComponent`] / [`ReactiveComponent`] - lifecycle a host drives
//! - [`with_tracker`] - builds component factories from fetch + render
//! - [`TrackingRuntime`] - seam to the dependency tracker
//! - [`BindConfig`] - client/server environment, purity, cursor warnings
//!
//! # Lifecycle
//!
//! ```text
//! mount ──► recompute ──► render
//!              ▲             │
//!              │   source changes, flush
//!   force_update ◄── host ◄──┘ (request_render)
//!
//! unmount ──► dispose (no further requests)
//! ```

pub mod component;
pub mod config;
pub mod cursor;
pub mod error;
pub mod host;
pub mod manager;
pub mod reactive;
pub mod snapshot;
pub mod tracking;
pub mod with_tracker;

pub use component::{ComponentHandle, ComponentId, FetchPhase};
pub use config::{BindConfig, Environment};
pub use cursor::{CursorProbe, MarkerCursorProbe};
pub use error::{BindError, Result};
pub use host::{Host, RenderQueue};
pub use manager::{DataManager, FetchContext, FetchFn, ManagerStats};
pub use reactive::{Purity, ReactiveComponent, RenderFn, RenderProps, TrackedComponent};
pub use snapshot::{PatchSummary, Snapshot};
pub use tracking::{TrackedComputation, TrackingRuntime};
pub use with_tracker::{ComponentFactory, WithTracker, with_tracker};
