//! Mounted queries.
//!
//! A [`Query`] is a subscription: while its stream is held, it keeps the
//! observer in sync with the cache.
//!
//! 1. If cached data exists, it's immediately emitted
//! 2. If data is stale or missing, a fetch is triggered
//! 3. When an invalidation covers the key, the stale data is emitted and refetched
//! 4. When another fetch or an optimistic write updates the key, the new state is emitted
//! 5. When the network comes back, stale or failed data is refetched
//!
//! Dropping the stream stops notifications but does not cancel a fetch in flight.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use futures::StreamExt;
use futures::stream::{self, BoxStream};
use tokio::sync::{broadcast, watch};
use tracing::debug;

use crate::subscription::{SubscriptionId, SubscriptionSource};

use super::client::{CacheEvent, QueryClient};
use super::options::QueryOptions;
use super::state::{QueryResult, QueryState};

/// A query subscription that observes one cache entry.
///
/// # Example
///
/// ```rust,ignore
/// use watchdeck::subscription::Subscription;
/// use watchdeck::query::{Query, QueryClient};
///
/// let client = Arc::new(QueryClient::new());
///
/// let sub = Subscription::new(Query::new(data::queries::viewer(auth), client.clone()))
///     .map(Message::Viewer);
/// ```
pub struct Query<V> {
    options: QueryOptions<V>,
    client: Arc<QueryClient>,
}

impl<V> Query<V>
where
    V: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub const fn new(options: QueryOptions<V>, client: Arc<QueryClient>) -> Self {
        Self { options, client }
    }

    #[must_use]
    pub const fn options(&self) -> &QueryOptions<V> {
        &self.options
    }
}

impl<V> SubscriptionSource for Query<V>
where
    V: Clone + Send + Sync + 'static,
{
    type Output = QueryResult<V>;

    fn stream(&self) -> BoxStream<'static, Self::Output> {
        // Subscribe before the first read so an invalidation racing the
        // initial fetch is not missed.
        let observer = Observer {
            options: self.options.clone(),
            events: self.client.subscribe(),
            network: self.client.network().subscribe(),
            client: self.client.clone(),
            seen: 0,
        };

        stream::unfold((Step::Initial, observer), |(step, mut observer)| async move {
            match step {
                Step::Initial => {
                    let snapshot = observer.client.snapshot::<V>(&observer.options.key);
                    if snapshot.is_stale {
                        Some((snapshot.state.into(), (Step::Fetching, observer)))
                    } else {
                        observer.seen = snapshot.generation;
                        Some((snapshot.state.into(), (Step::Watching, observer)))
                    }
                }

                Step::Fetching => {
                    let result = observer.client.fetch(&observer.options).await;
                    let snapshot = observer.client.snapshot::<V>(&observer.options.key);
                    observer.seen = snapshot.generation;
                    let state = match (snapshot.state, result) {
                        // Entry was removed while fetching; report what the fetch returned.
                        (QueryState::Loading, Ok(data)) => QueryState::Success {
                            data,
                            is_stale: true,
                        },
                        (QueryState::Loading, Err(err)) => QueryState::Error(err),
                        (state, _) => state,
                    };
                    Some((state.into(), (Step::Watching, observer)))
                }

                Step::Watching => {
                    let next = observer.watch().await?;
                    Some((next.0.into(), (next.1, observer)))
                }
            }
        })
        .boxed()
    }

    fn id(&self) -> SubscriptionId {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        SubscriptionId::of::<Self>(hasher.finish())
    }
}

impl<V> Hash for Query<V> {
    fn hash<H>(&self, hasher: &mut H)
    where
        H: std::hash::Hasher,
    {
        self.options.key.hash(hasher);
    }
}

/// Internal state machine for the Query subscription.
enum Step {
    Initial,
    Fetching,
    Watching,
}

struct Observer<V> {
    options: QueryOptions<V>,
    client: Arc<QueryClient>,
    events: broadcast::Receiver<CacheEvent>,
    network: watch::Receiver<bool>,
    /// Generation of the last state emitted.
    seen: u64,
}

impl<V> Observer<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Waits for the next change relevant to this key.
    ///
    /// Returns the state to emit and the step to continue with, or `None`
    /// when the client is gone.
    async fn watch(&mut self) -> Option<(QueryState<V>, Step)> {
        let key = self.options.key.clone();
        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Ok(CacheEvent::Invalidated(prefix)) if key.starts_with(&prefix) => {
                        debug!(%key, %prefix, "observer invalidated, refetching");
                        return Some((self.client.state(&key), Step::Fetching));
                    }
                    Ok(CacheEvent::Updated { key: updated, generation })
                        if updated == key && generation > self.seen =>
                    {
                        let snapshot = self.client.snapshot::<V>(&key);
                        self.seen = snapshot.generation;
                        return Some((snapshot.state, Step::Watching));
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(%key, skipped, "observer lagged behind cache events");
                        if self.client.is_stale(&key) {
                            return Some((self.client.state(&key), Step::Fetching));
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                },
                changed = self.network.changed() => {
                    changed.ok()?;
                    let online = *self.network.borrow_and_update();
                    if online && (self.client.is_stale(&key) || self.client.is_error(&key)) {
                        debug!(%key, "network restored, refetching");
                        return Some((self.client.state(&key), Step::Fetching));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;
    use crate::query::QueryConfig;
    use crate::query_key;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::timeout;

    fn counting(calls: &Arc<AtomicUsize>) -> QueryOptions<usize> {
        let calls = calls.clone();
        QueryOptions::new(query_key!["watchlist", "u1", 1], move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Box::pin(async move { Ok::<_, QueryError>(n) })
        })
    }

    fn long_lived_client() -> Arc<QueryClient> {
        Arc::new(QueryClient::with_config(QueryConfig::new(
            Duration::from_secs(60),
            Duration::from_secs(300),
        )))
    }

    #[tokio::test]
    async fn test_emits_loading_then_data() {
        let client = long_lived_client();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut stream = Query::new(counting(&calls), client).stream();

        let first = stream.next().await.expect("initial state");
        assert!(first.is_loading());

        let second = stream.next().await.expect("fetched state");
        assert_eq!(second.data(), Some(&1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fresh_cache_is_emitted_without_fetch() {
        let client = long_lived_client();
        client.set_entry(query_key!["watchlist", "u1", 1], 99_usize);
        let calls = Arc::new(AtomicUsize::new(0));
        let mut stream = Query::new(counting(&calls), client).stream();

        let first = stream.next().await.expect("cached state");
        assert_eq!(first.data(), Some(&99));
        assert!(!first.is_stale());

        let nothing = timeout(Duration::from_millis(50), stream.next()).await;
        assert!(nothing.is_err(), "fresh data should not trigger a fetch");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalidation_refetches() {
        let client = long_lived_client();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut stream = Query::new(counting(&calls), client.clone()).stream();
        stream.next().await.expect("loading");
        stream.next().await.expect("first fetch");

        client.invalidate_queries(&query_key!["watchlist", "u1"]);

        let stale = stream.next().await.expect("stale state");
        assert!(stale.is_stale());
        assert_eq!(stale.data(), Some(&1));

        let refreshed = stream.next().await.expect("refetched state");
        assert_eq!(refreshed.data(), Some(&2));
        assert!(!refreshed.is_stale());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unrelated_invalidation_is_ignored() {
        let client = long_lived_client();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut stream = Query::new(counting(&calls), client.clone()).stream();
        stream.next().await.expect("loading");
        stream.next().await.expect("first fetch");

        client.invalidate_queries(&query_key!["watchlist", "u2"]);
        client.invalidate_queries(&query_key!["viewer"]);

        let nothing = timeout(Duration::from_millis(50), stream.next()).await;
        assert!(nothing.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_optimistic_write_is_observed() {
        let client = long_lived_client();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut stream = Query::new(counting(&calls), client.clone()).stream();
        stream.next().await.expect("loading");
        stream.next().await.expect("first fetch");

        client.set_entry(query_key!["watchlist", "u1", 1], 500_usize);

        let updated = stream.next().await.expect("updated state");
        assert_eq!(updated.data(), Some(&500));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_query_id_consistency() {
        let client = Arc::new(QueryClient::new());
        let query1 = Query::new(QueryOptions::resolved(query_key!["user-123"], 42), client.clone());
        let query2 = Query::new(QueryOptions::resolved(query_key!["user-123"], 42), client);
        assert_eq!(query1.id(), query2.id());
    }

    #[test]
    fn test_query_id_different_keys() {
        let client = Arc::new(QueryClient::new());
        let query1 = Query::new(QueryOptions::resolved(query_key!["user-123"], 42), client.clone());
        let query2 = Query::new(QueryOptions::resolved(query_key!["user-456"], 42), client);
        assert_ne!(query1.id(), query2.id());
    }

    #[test]
    fn test_query_id_same_key_different_type() {
        let client = Arc::new(QueryClient::new());
        let query1 = Query::new(QueryOptions::resolved(query_key!["data"], 42), client.clone());
        let query2 = Query::new(
            QueryOptions::resolved(query_key!["data"], "test".to_string()),
            client,
        );
        assert_ne!(query1.id(), query2.id());
    }
}
