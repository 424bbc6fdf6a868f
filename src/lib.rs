//! # Watchdeck - data layer for a movie and TV watchlist app
//!
//! Watchdeck owns every piece of remote data the app shows: the signed-in
//! user, each user's watchlist, and catalog search and trending results. Screens
//! never call a backend directly. They declare what they need as a keyed query
//! and receive cached, deduplicated, automatically refreshed results.
//!
//! ## Architecture
//!
//! 1. **Queries**: [`QueryOptions`](query::QueryOptions) pair a [`QueryKey`](query::QueryKey) with a fetcher
//! 2. **Cache**: the [`QueryClient`](query::QueryClient) caches results, shares in-flight fetches and retries failures
//! 3. **Observers**: a [`Query`](query::Query) subscription re-emits whenever its key is invalidated
//! 4. **Mutations**: a [`Mutation`](query::Mutation) writes and then invalidates the key prefixes it affects
//! 5. **Commands**: effects and notifications are returned to the host as [`Command`](command::Command)s
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use watchdeck::backend::mock::{MockAuth, MockCatalog};
//! use watchdeck::backend::{MediaKind, MemoryWatchlistStore};
//! use watchdeck::data::{AppContext, Backends};
//! use watchdeck::query::QueryConfig;
//! use watchdeck::storage::MemoryStorage;
//!
//! # async fn example() -> Result<(), watchdeck::error::QueryError> {
//! let ctx = AppContext::new(
//!     QueryConfig::default(),
//!     Arc::new(MemoryStorage::new()),
//!     Backends {
//!         auth: Arc::new(MockAuth::new()),
//!         movies: Arc::new(MockCatalog::new(MediaKind::Movie, Vec::new())),
//!         tv: Arc::new(MockCatalog::new(MediaKind::Tv, Vec::new())),
//!         watchlist: Arc::new(MemoryWatchlistStore::new()),
//!     },
//! );
//!
//! let viewer = ctx.client.fetch(&ctx.viewer()).await?;
//! let user_id = viewer.as_ref().map(|user| user.id.as_str());
//! let page = ctx.client.fetch(&ctx.watchlist_page(user_id, 1)).await?;
//! println!("{} titles on the watchlist", page.total_results);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod command;
pub mod config;
pub mod data;
pub mod error;
pub mod filters;
pub mod logging;
pub mod network;
pub mod prelude;
pub mod query;
pub mod storage;
pub mod subscription;
