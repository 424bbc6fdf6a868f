//! Query option factories for each remote resource.
//!
//! Fetchers read the [`FilterStore`] when a request is issued, so the request
//! always reflects the current filters even if the options were built earlier.
//! [`affected_by`] names the cached queries a filter change makes outdated.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;

use crate::backend::{
    AuthProvider, MediaCatalog, MediaItem, PAGE_SIZE, Page, SearchRequest, User, WatchlistEntry,
    WatchlistRequest, WatchlistStore,
};
use crate::error::QueryError;
use crate::filters::{FilterState, FilterStore, INCLUDE_ADULT, WATCHED};
use crate::query::{QueryKey, QueryOptions, RetryPolicy};

use super::keys;

const VIEWER_STALE_TIME: Duration = Duration::from_secs(5 * 60);
const SEARCH_STALE_TIME: Duration = Duration::from_secs(5 * 60);
const TRENDING_STALE_TIME: Duration = Duration::from_secs(60 * 60);

/// The signed-in user, or `None` without a session.
///
/// A missing session is a normal state here, not an error, and is not retried.
pub fn viewer(auth: Arc<dyn AuthProvider>) -> QueryOptions<Option<User>> {
    QueryOptions::new(keys::viewer(), move || {
        let auth = Arc::clone(&auth);
        async move {
            match auth.current_user().await {
                Ok(user) => Ok(Some(user)),
                Err(QueryError::Unauthenticated) => Ok(None),
                Err(err) => Err(err),
            }
        }
        .boxed()
    })
    .with_stale_time(VIEWER_STALE_TIME)
}

/// One page of `user_id`'s watchlist, ordered and filtered by the current filters.
///
/// Without a user this resolves to an empty page and never calls the store.
pub fn watchlist(
    store: Arc<dyn WatchlistStore>,
    filters: FilterStore,
    user_id: Option<&str>,
    page: u32,
) -> QueryOptions<Page<WatchlistEntry>> {
    let Some(user_id) = user_id.filter(|id| !id.is_empty()) else {
        return QueryOptions::resolved(keys::watchlist_page(keys::ANONYMOUS, page), Page::empty())
            .with_retry(RetryPolicy::none());
    };

    let user_id = user_id.to_string();
    QueryOptions::new(keys::watchlist_page(&user_id, page), move || {
        let request = WatchlistRequest {
            user_id: user_id.clone(),
            page,
            page_size: PAGE_SIZE,
            sort: filters.sort(),
            watched: filters.flag(WATCHED),
        };
        let store = Arc::clone(&store);
        async move { store.entries(&request).await }.boxed()
    })
}

/// First page of catalog results for `term`.
///
/// A blank term resolves to an empty page without calling the catalog.
pub fn search(
    catalog: Arc<dyn MediaCatalog>,
    filters: FilterStore,
    term: &str,
) -> QueryOptions<Page<MediaItem>> {
    let term = term.trim().to_string();
    let key = keys::search(catalog.kind(), &term);
    if term.is_empty() {
        return QueryOptions::resolved(key, Page::empty()).with_retry(RetryPolicy::none());
    }

    QueryOptions::new(key, move || {
        let request = SearchRequest {
            query: term.clone(),
            page: 1,
            include_adult: filters.flag(INCLUDE_ADULT).unwrap_or(false),
            sort: filters.sort(),
        };
        let catalog = Arc::clone(&catalog);
        async move { catalog.search(&request).await }.boxed()
    })
    .with_stale_time(SEARCH_STALE_TIME)
}

/// This week's trending titles from `catalog`.
pub fn trending(catalog: Arc<dyn MediaCatalog>, page: u32) -> QueryOptions<Page<MediaItem>> {
    QueryOptions::new(keys::trending(catalog.kind(), page), move || {
        let catalog = Arc::clone(&catalog);
        async move { catalog.trending(page).await }.boxed()
    })
    .with_stale_time(TRENDING_STALE_TIME)
}

/// Key prefixes whose cached results no longer match the filters after a
/// change from `before` to `after`.
///
/// The search term is part of the search key, so a new term needs no
/// invalidation. Unknown flags are assumed to affect both lists.
#[must_use]
pub fn affected_by(before: &FilterState, after: &FilterState) -> Vec<QueryKey> {
    let mut search = before.sort != after.sort;
    let mut watchlist = before.sort != after.sort;
    let names = before.flags.keys().chain(after.flags.keys());
    for name in names.filter(|name| before.flag(name) != after.flag(name)) {
        match name.as_str() {
            WATCHED => watchlist = true,
            INCLUDE_ADULT => search = true,
            _ => {
                search = true;
                watchlist = true;
            }
        }
    }

    let mut prefixes = Vec::new();
    if search {
        prefixes.push(keys::searches());
    }
    if watchlist {
        prefixes.push(keys::watchlists());
    }
    prefixes
}
