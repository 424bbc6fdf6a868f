//! Cache keys for every query the app issues.
//!
//! Keys are hierarchical so one prefix covers a family of queries:
//! invalidating [`watchlist`] for a user covers every page of that user's list.

use crate::backend::MediaKind;
use crate::query::QueryKey;
use crate::query_key;

/// User segment for watchlist queries issued without a signed-in user.
pub const ANONYMOUS: &str = "anonymous";

/// `["viewer"]`
#[must_use]
pub fn viewer() -> QueryKey {
    query_key!["viewer"]
}

/// `["watchlist"]`: every user's watchlist.
#[must_use]
pub fn watchlists() -> QueryKey {
    query_key!["watchlist"]
}

/// `["watchlist", user_id]`
#[must_use]
pub fn watchlist(user_id: &str) -> QueryKey {
    query_key!["watchlist", user_id]
}

/// `["watchlist", user_id, page]`
#[must_use]
pub fn watchlist_page(user_id: &str, page: u32) -> QueryKey {
    watchlist(user_id).with(page)
}

/// `["search"]`: every catalog search.
#[must_use]
pub fn searches() -> QueryKey {
    query_key!["search"]
}

/// `["search", kind, term]`
#[must_use]
pub fn search(kind: MediaKind, term: &str) -> QueryKey {
    query_key!["search", kind.as_str(), term]
}

/// `["trending", kind, page]`
#[must_use]
pub fn trending(kind: MediaKind, page: u32) -> QueryKey {
    query_key!["trending", kind.as_str(), page]
}
