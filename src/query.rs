//! Query and mutation support with caching.
//!
//! This module provides a cache/invalidation coordinator for remote data,
//! similar to SWR or TanStack Query.
//!
//! # Features
//!
//! - **Queries**: keyed fetches with caching, in-flight deduplication and bounded retry
//! - **Observers**: subscription-based queries that refetch when invalidated
//! - **Mutations**: writes that invalidate key prefixes on success
//!
//! # Example
//!
//! ```rust,ignore
//! use watchdeck::prelude::*;
//! use watchdeck::query::{Query, QueryClient, QueryOptions};
//! use std::sync::Arc;
//!
//! let client = Arc::new(QueryClient::new());
//!
//! // Mount an observer for page 1 of the watchlist.
//! let sub = Subscription::new(Query::new(
//!     data::queries::watchlist(store, filters, Some("user-1"), 1),
//!     client.clone(),
//! ))
//! .map(Message::Watchlist);
//!
//! // Later, after adding a title, every page of the user's watchlist refetches.
//! add_to_watchlist.mutate(client.clone(), item).map(Message::Added)
//! ```

mod cache;
mod client;
mod config;
mod key;
pub mod mutation;
pub mod observer;
mod options;
mod state;

pub use client::{CacheEvent, QueryClient};
pub use config::{QueryConfig, RetryPolicy};
pub use key::{KeySegment, QueryKey};
pub use mutation::{Mutation, MutationResult, MutationState};
pub use observer::Query;
pub use options::{Fetcher, QueryOptions};
pub use state::{QueryResult, QueryState};
