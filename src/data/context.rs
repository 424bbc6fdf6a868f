use std::fmt;
use std::sync::Arc;

use crate::backend::{
    AuthProvider, Credentials, MediaCatalog, MediaItem, MediaKind, MediaRef, Page, RestCatalog,
    Session, SignUp, User, WatchlistEntry, WatchlistStore,
};
use crate::config::AppConfig;
use crate::error::QueryError;
use crate::filters::FilterStore;
use crate::network::NetworkStatus;
use crate::query::{Mutation, Query, QueryClient, QueryConfig, QueryOptions, QueryResult};
use crate::storage::{FileStorage, KeyValueStorage};
use crate::subscription::Subscription;

use super::{mutations, queries};

/// The external systems an [`AppContext`] talks to.
#[derive(Clone)]
pub struct Backends {
    pub auth: Arc<dyn AuthProvider>,
    pub movies: Arc<dyn MediaCatalog>,
    pub tv: Arc<dyn MediaCatalog>,
    pub watchlist: Arc<dyn WatchlistStore>,
}

/// Everything a screen needs to read and write app data.
///
/// Built once by the host and passed down explicitly. Tests build their own
/// with mock backends, so every test gets an isolated cache. Filter changes
/// invalidate the cached searches and watchlists that read them.
#[derive(Clone)]
pub struct AppContext {
    pub client: Arc<QueryClient>,
    pub filters: FilterStore,
    pub storage: Arc<dyn KeyValueStorage>,
    pub network: NetworkStatus,
    pub auth: Arc<dyn AuthProvider>,
    pub movies: Arc<dyn MediaCatalog>,
    pub tv: Arc<dyn MediaCatalog>,
    pub watchlist: Arc<dyn WatchlistStore>,
}

impl AppContext {
    pub fn new(config: QueryConfig, storage: Arc<dyn KeyValueStorage>, backends: Backends) -> Self {
        let network = NetworkStatus::new();
        let client = Arc::new(QueryClient::with_config(config).with_network(network.clone()));
        let filters = FilterStore::load(Arc::clone(&storage));
        let invalidator = Arc::clone(&client);
        filters.on_change(move |before, after| {
            for prefix in queries::affected_by(before, after) {
                invalidator.invalidate_queries(&prefix);
            }
        });
        Self {
            client,
            filters,
            storage,
            network,
            auth: backends.auth,
            movies: backends.movies,
            tv: backends.tv,
            watchlist: backends.watchlist,
        }
    }

    /// Builds a context with REST catalogs and file storage as configured.
    pub fn from_config(
        config: &AppConfig,
        auth: Arc<dyn AuthProvider>,
        watchlist: Arc<dyn WatchlistStore>,
    ) -> Result<Self, QueryError> {
        let catalog = &config.catalog;
        let movies = RestCatalog::new(
            MediaKind::Movie,
            &catalog.movies_base_url,
            catalog.api_key.clone(),
            catalog.timeout(),
        )?;
        let tv = RestCatalog::new(
            MediaKind::Tv,
            &catalog.tv_base_url,
            catalog.api_key.clone(),
            catalog.timeout(),
        )?;
        let path = match &config.storage.path {
            Some(path) => path.clone(),
            None => FileStorage::default_path()?,
        };
        let storage = FileStorage::open(path)?;

        Ok(Self::new(
            config.query_config(),
            Arc::new(storage),
            Backends {
                auth,
                movies: Arc::new(movies),
                tv: Arc::new(tv),
                watchlist,
            },
        ))
    }

    #[must_use]
    pub fn catalog(&self, kind: MediaKind) -> Arc<dyn MediaCatalog> {
        match kind {
            MediaKind::Movie => Arc::clone(&self.movies),
            MediaKind::Tv => Arc::clone(&self.tv),
        }
    }

    /// The persisted session id, if a user signed in earlier.
    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        mutations::stored_session(self.storage.as_ref())
    }

    /// Mounts `options` as an observer that refetches on invalidation.
    pub fn observe<V>(&self, options: QueryOptions<V>) -> Subscription<QueryResult<V>>
    where
        V: Clone + Send + Sync + 'static,
    {
        Subscription::new(Query::new(options, Arc::clone(&self.client)))
    }

    pub fn viewer(&self) -> QueryOptions<Option<User>> {
        queries::viewer(Arc::clone(&self.auth))
    }

    pub fn watchlist_page(
        &self,
        user_id: Option<&str>,
        page: u32,
    ) -> QueryOptions<Page<WatchlistEntry>> {
        queries::watchlist(Arc::clone(&self.watchlist), self.filters.clone(), user_id, page)
    }

    /// Searches `kind` for the current search text.
    pub fn search(&self, kind: MediaKind) -> QueryOptions<Page<MediaItem>> {
        queries::search(self.catalog(kind), self.filters.clone(), &self.filters.search())
    }

    pub fn trending(&self, kind: MediaKind, page: u32) -> QueryOptions<Page<MediaItem>> {
        queries::trending(self.catalog(kind), page)
    }

    pub fn add_to_watchlist(&self, user_id: &str) -> Mutation<MediaItem, u64> {
        mutations::add_to_watchlist(Arc::clone(&self.watchlist), user_id)
    }

    pub fn remove_from_watchlist(&self, user_id: &str) -> Mutation<MediaRef, u64> {
        mutations::remove_from_watchlist(Arc::clone(&self.watchlist), user_id)
    }

    pub fn mark_watched(&self, user_id: &str) -> Mutation<(MediaRef, bool), u64> {
        mutations::mark_watched(Arc::clone(&self.watchlist), user_id)
    }

    pub fn sign_in(&self) -> Mutation<Credentials, Session> {
        mutations::sign_in(Arc::clone(&self.auth), Arc::clone(&self.storage))
    }

    pub fn sign_up(&self) -> Mutation<SignUp, Session> {
        mutations::sign_up(Arc::clone(&self.auth), Arc::clone(&self.storage))
    }

    pub fn sign_out(&self) -> Mutation<(), ()> {
        mutations::sign_out(Arc::clone(&self.auth), Arc::clone(&self.storage))
    }

    pub fn request_password_recovery(&self, redirect_url: &str) -> Mutation<String, ()> {
        mutations::request_password_recovery(Arc::clone(&self.auth), redirect_url)
    }
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("client", &self.client)
            .field("filters", &self.filters)
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryWatchlistStore;
    use crate::backend::mock::{MockAuth, MockCatalog};
    use crate::storage::MemoryStorage;
    use tempfile::TempDir;

    fn context() -> AppContext {
        AppContext::new(
            QueryConfig::default(),
            Arc::new(MemoryStorage::new()),
            Backends {
                auth: Arc::new(MockAuth::new()),
                movies: Arc::new(MockCatalog::new(MediaKind::Movie, Vec::new())),
                tv: Arc::new(MockCatalog::new(MediaKind::Tv, Vec::new())),
                watchlist: Arc::new(MemoryWatchlistStore::new()),
            },
        )
    }

    #[test]
    fn test_catalog_by_kind() {
        let ctx = context();
        assert_eq!(ctx.catalog(MediaKind::Movie).kind(), MediaKind::Movie);
        assert_eq!(ctx.catalog(MediaKind::Tv).kind(), MediaKind::Tv);
    }

    #[test]
    fn test_search_uses_current_search_text() {
        let ctx = context();
        ctx.filters.set_search("alien").expect("persist");
        assert_eq!(
            ctx.search(MediaKind::Tv).key,
            crate::data::keys::search(MediaKind::Tv, "alien")
        );
    }

    #[test]
    fn test_client_follows_context_network() {
        let ctx = context();
        ctx.network.set_online(false);
        assert!(!ctx.client.network().is_online());
    }

    #[tokio::test]
    async fn test_session_id_after_sign_in() {
        let auth = MockAuth::new();
        auth.add_account("ada@example.com", "pw", "Ada");
        let ctx = AppContext {
            auth: Arc::new(auth),
            ..context()
        };
        assert_eq!(ctx.session_id(), None);

        let session = ctx
            .sign_in()
            .execute(&ctx.client, Credentials::new("ada@example.com", "pw"))
            .await
            .into_result()
            .expect("signed in");
        assert_eq!(ctx.session_id(), Some(session.id));
    }

    #[test]
    fn test_from_config_uses_configured_storage() {
        let dir = TempDir::new().expect("temp dir");
        let mut config = AppConfig::default();
        config.storage.path = Some(dir.path().join("storage.json"));

        let ctx = AppContext::from_config(
            &config,
            Arc::new(MockAuth::new()),
            Arc::new(MemoryWatchlistStore::new()),
        )
        .expect("context");
        ctx.filters.set_search("heat").expect("persist");
        assert!(dir.path().join("storage.json").exists());
    }
}
