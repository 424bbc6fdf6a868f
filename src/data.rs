//! The app's concrete queries and mutations.
//!
//! [`keys`] names every cache entry, [`queries`] and [`mutations`] build
//! options and mutations against the backends, and [`AppContext`] bundles the
//! collaborators so screens can call them without wiring anything themselves.

mod context;
pub mod keys;
pub mod mutations;
pub mod queries;

pub use context::{AppContext, Backends};
