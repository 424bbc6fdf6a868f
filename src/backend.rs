//! Contracts for the external systems the data layer talks to.
//!
//! Every backend is an async trait object so hosts can plug in real clients
//! and tests can plug in the in-crate mocks:
//! - [`AuthProvider`]: accounts and sessions
//! - [`MediaCatalog`]: content metadata search and trending lists
//! - [`WatchlistStore`]: the local-first store holding each user's watchlist
//!
//! Responses are parsed into the typed records in [`types`] at the boundary.

mod auth;
mod catalog;
pub mod mock;
pub mod types;
mod watchlist;

pub use auth::AuthProvider;
pub use catalog::{MediaCatalog, RestCatalog, SearchRequest, parse_page};
pub use types::{
    Credentials, MediaItem, MediaKind, MediaRef, PAGE_SIZE, Page, Session, SignUp, User,
};
pub use watchlist::{
    MemoryWatchlistStore, WatchlistEntry, WatchlistEvent, WatchlistRequest, WatchlistStore,
};
