//! Prelude module for convenient imports.
//!
//! ```
//! use watchdeck::prelude::*;
//! ```
//!
//! # What's included
//!
//! - [`QueryClient`], [`QueryOptions`], [`Query`] and [`Mutation`] - The cache and its inputs
//! - [`QueryKey`] and [`query_key!`](crate::query_key) - Cache keys
//! - [`Command`], [`Action`] and [`Subscription`] - Effects handed to the host
//! - [`AppContext`] - The app's queries and mutations bound to their backends

pub use crate::command::{Action, Command, Notification};
pub use crate::data::AppContext;
pub use crate::error::QueryError;
pub use crate::query::{
    Mutation, MutationResult, Query, QueryClient, QueryKey, QueryOptions, QueryResult, QueryState,
};
pub use crate::query_key;
pub use crate::subscription::Subscription;
