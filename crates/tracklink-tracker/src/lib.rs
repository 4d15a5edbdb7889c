#![forbid(unsafe_code)]

//! Single-threaded dependency tracking for tracklink.
//!
//! This crate provides the tracking primitive the component bridge in
//! `tracklink` orchestrates:
//!
//! - [`Tracker`]: the runtime. Owns the current computation, the queue of
//!   invalidated computations and the flush loop.
//! - [`Computation`]: a tracked unit of work. Records which [`Dependency`]s it
//!   read and reruns at the next [`Tracker::flush`] after one of them changes.
//! - [`Dependency`]: a reactive source marker (`depend()` / `changed()`).
//! - [`ReactiveVar`]: a version-tracked value whose reads are tracked and
//!   whose writes invalidate readers.
//!
//! # Architecture
//!
//! Everything is `Rc<..>` based and `!Send`. Dependencies hold their
//! dependents as `Weak` pointers, so a dropped computation never keeps a
//! source alive and vice versa. Invalidation never reruns a computation
//! synchronously; reruns happen only inside `flush()`.
//!
//! # Invariants
//!
//! 1. A computation's body observes `is_first_run() == true` exactly once.
//! 2. A stopped computation never reruns and never re-enters the queue.
//! 3. `ReactiveVar::set` with an equal value is a no-op (no version bump, no
//!    invalidation).
//! 4. A computation created while another computation is current is stopped
//!    when that parent invalidates, unless created inside
//!    [`Tracker::nonreactive`].

pub mod computation;
pub mod dependency;
pub mod error;
pub mod tracker;
pub mod var;

pub use computation::Computation;
pub use dependency::Dependency;
pub use error::{Result, TrackerError};
pub use tracker::{MAX_FLUSH_ROUNDS, Tracker};
pub use var::ReactiveVar;
