//! The cache and invalidation coordinator.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use dashmap::DashMap;
use futures::FutureExt;
use futures::future::BoxFuture;
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::command::Command;
use crate::error::QueryError;
use crate::network::NetworkStatus;

use super::cache::{CacheEntry, Erased, Outcome, SharedFetch};
use super::config::{QueryConfig, RetryPolicy};
use super::key::QueryKey;
use super::options::{Fetcher, QueryOptions};
use super::state::QueryState;

/// Notifications published by the [`QueryClient`] to mounted observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// Every entry whose key starts with this prefix was marked stale.
    Invalidated(QueryKey),
    /// The entry for `key` now holds the write with `generation`.
    Updated { key: QueryKey, generation: u64 },
}

/// A point-in-time view of one cache entry.
#[derive(Debug, Clone)]
pub(crate) struct Snapshot<V> {
    pub state: QueryState<V>,
    pub generation: u64,
    pub is_stale: bool,
}

enum Acquired {
    Cached(Outcome),
    Fetch(SharedFetch),
}

/// A client for managing the query cache and invalidation.
///
/// The `QueryClient` is the single authority over cached remote data. It:
/// - caches fetch results by [`QueryKey`], successes and failures alike
/// - runs at most one fetch per key at a time, attaching later callers to it
/// - retries transient failures with exponential backoff, pausing while offline
/// - marks entries stale by key prefix and notifies mounted observers
///
/// It is an explicitly constructed handle, cheap to clone, so tests and
/// separate screen trees can each own an isolated cache.
///
/// # Example
///
/// ```rust
/// use watchdeck::query::{QueryClient, QueryConfig};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let config = QueryConfig::new(
///     Duration::from_secs(30),  // stale_time
///     Duration::from_secs(300), // cache_time
/// );
///
/// let client = Arc::new(QueryClient::with_config(config));
/// assert!(client.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct QueryClient {
    cache: Arc<DashMap<QueryKey, CacheEntry>>,
    events_tx: broadcast::Sender<CacheEvent>,
    config: QueryConfig,
    network: NetworkStatus,
}

impl QueryClient {
    /// Creates a new query client with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(QueryConfig::default())
    }

    /// Creates a new query client with the given configuration.
    #[must_use]
    pub fn with_config(config: QueryConfig) -> Self {
        let (events_tx, _) = broadcast::channel(100);
        Self {
            cache: Arc::new(DashMap::new()),
            events_tx,
            config,
            network: NetworkStatus::new(),
        }
    }

    /// Uses `network` as the connectivity signal for retries and reconnect refetches.
    #[must_use]
    pub fn with_network(mut self, network: NetworkStatus) -> Self {
        self.network = network;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &QueryConfig {
        &self.config
    }

    #[must_use]
    pub const fn network(&self) -> &NetworkStatus {
        &self.network
    }

    /// Returns the query's data, fetching it if missing or stale.
    ///
    /// Concurrent calls for the same key share one underlying fetch and
    /// resolve to the same value or the same error.
    pub async fn fetch<V>(&self, options: &QueryOptions<V>) -> Result<V, QueryError>
    where
        V: Clone + Send + Sync + 'static,
    {
        self.load(options, false).await
    }

    /// Fetches regardless of freshness. Still joins a fetch already in flight.
    pub async fn refetch<V>(&self, options: &QueryOptions<V>) -> Result<V, QueryError>
    where
        V: Clone + Send + Sync + 'static,
    {
        self.load(options, true).await
    }

    /// Returns the cached state without waiting.
    ///
    /// When the entry is missing or stale this starts a background fetch
    /// (deduplicated like [`fetch`](Self::fetch)) and returns what is cached,
    /// or [`QueryState::Loading`] if nothing is. Must be called within a Tokio runtime.
    pub fn get<V>(&self, options: &QueryOptions<V>) -> QueryState<V>
    where
        V: Clone + Send + Sync + 'static,
    {
        match self.acquire(options, false) {
            Acquired::Cached(outcome) => state_from(&options.key, outcome, false),
            Acquired::Fetch(_) => self.state(&options.key),
        }
    }

    /// Returns the cached state for `key` without fetching.
    #[must_use]
    pub fn state<V>(&self, key: &QueryKey) -> QueryState<V>
    where
        V: Clone + Send + Sync + 'static,
    {
        self.snapshot(key).state
    }

    pub(crate) fn snapshot<V>(&self, key: &QueryKey) -> Snapshot<V>
    where
        V: Clone + Send + Sync + 'static,
    {
        let now = Instant::now();
        self.cache.get(key).map_or(
            Snapshot {
                state: QueryState::Loading,
                generation: 0,
                is_stale: true,
            },
            |entry| {
                let is_stale = entry.is_stale(now);
                let state = entry.outcome.clone().map_or(QueryState::Loading, |outcome| {
                    state_from(key, outcome, is_stale)
                });
                Snapshot {
                    state,
                    generation: entry.generation(),
                    is_stale,
                }
            },
        )
    }

    /// Returns the cached data for `key`, if it holds a success of type `V`.
    #[must_use]
    pub fn get_entry<V>(&self, key: &QueryKey) -> Option<V>
    where
        V: Clone + Send + Sync + 'static,
    {
        self.cache
            .get(key)
            .and_then(|entry| match &entry.outcome {
                Some(Ok(data)) => data.downcast_ref::<V>().cloned(),
                _ => None,
            })
    }

    /// Writes `value` for `key` directly, bypassing any fetch.
    ///
    /// The write supersedes a fetch already in flight for the key: when that
    /// fetch settles, its result is discarded.
    pub fn set_entry<V>(&self, key: QueryKey, value: V)
    where
        V: Clone + Send + Sync + 'static,
    {
        let generation = {
            let mut entry = self
                .cache
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::new(self.config.stale_time));
            let generation = entry.next_generation();
            entry.settle(generation, Ok(Arc::new(value)), Instant::now());
            generation
        };
        debug!(%key, generation, "cache entry set");
        let _ = self.events_tx.send(CacheEvent::Updated { key, generation });
    }

    /// Returns `true` if `key` is missing, invalidated or past its stale time.
    #[must_use]
    pub fn is_stale(&self, key: &QueryKey) -> bool {
        let now = Instant::now();
        self.cache.get(key).is_none_or(|entry| entry.is_stale(now))
    }

    /// Returns `true` if a fetch for `key` is in flight.
    #[must_use]
    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.cache
            .get(key)
            .is_some_and(|entry| entry.in_flight.is_some())
    }

    /// Returns `true` if the entry for `key` holds a failed fetch.
    #[must_use]
    pub fn is_error(&self, key: &QueryKey) -> bool {
        self.cache
            .get(key)
            .is_some_and(|entry| matches!(entry.outcome, Some(Err(_))))
    }

    /// Marks every entry whose key starts with `prefix` as stale.
    ///
    /// Nothing is fetched here. Mounted observers of affected keys are notified
    /// and refetch; other callers refetch on their next `get` or `fetch`.
    /// Returns the number of entries marked.
    pub fn invalidate_queries(&self, prefix: &QueryKey) -> usize {
        let mut marked = 0;
        for mut entry in self.cache.iter_mut() {
            if entry.key().starts_with(prefix) {
                entry.value_mut().mark_stale();
                marked += 1;
            }
        }
        info!(%prefix, marked, "invalidated queries");
        let _ = self.events_tx.send(CacheEvent::Invalidated(prefix.clone()));
        marked
    }

    /// Returns a command that invalidates `prefix` when executed.
    ///
    /// The command completes without producing any messages.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// fn update(&mut self, msg: Message) -> Command<Message> {
    ///     match msg {
    ///         Message::WatchlistChanged => {
    ///             self.query_client.invalidate(&query_key!["watchlist"])
    ///         }
    ///     }
    /// }
    /// ```
    pub fn invalidate<Msg>(&self, prefix: &QueryKey) -> Command<Msg>
    where
        Msg: Send + 'static,
    {
        let client = self.clone();
        let prefix = prefix.clone();
        Command::actions(
            futures::stream::once(async move {
                client.invalidate_queries(&prefix);
            })
            .filter_map(|()| async { None }),
        )
    }

    /// Removes the entry for `key`. A fetch in flight still completes but is not cached.
    pub fn remove(&self, key: &QueryKey) -> bool {
        self.cache.remove(key).is_some()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Removes idle entries not updated within `cache_time`. Returns how many were removed.
    pub fn collect_garbage(&self) -> usize {
        let now = Instant::now();
        let cache_time = self.config.cache_time;
        let before = self.cache.len();
        self.cache.retain(|_, entry| !entry.should_gc(now, cache_time));
        let removed = before.saturating_sub(self.cache.len());
        if removed > 0 {
            debug!(removed, "collected idle cache entries");
        }
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Subscribes to invalidation and update notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events_tx.subscribe()
    }

    async fn load<V>(&self, options: &QueryOptions<V>, force: bool) -> Result<V, QueryError>
    where
        V: Clone + Send + Sync + 'static,
    {
        let outcome = match self.acquire(options, force) {
            Acquired::Cached(outcome) => outcome,
            Acquired::Fetch(future) => future.await,
        };
        downcast(&options.key, outcome)
    }

    /// Returns the cached outcome if fresh, otherwise the key's single in-flight fetch.
    fn acquire<V>(&self, options: &QueryOptions<V>, force: bool) -> Acquired
    where
        V: Clone + Send + Sync + 'static,
    {
        let key = &options.key;
        let stale_time = options.stale_time.unwrap_or(self.config.stale_time);
        let mut entry = self
            .cache
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::new(stale_time));
        entry.stale_time = stale_time;

        if !force && !entry.is_stale(Instant::now()) {
            if let Some(outcome) = entry.outcome.clone() {
                debug!(%key, "cache hit");
                return Acquired::Cached(outcome);
            }
        }

        if let Some(flight) = &entry.in_flight {
            debug!(%key, generation = flight.generation, "joining in-flight fetch");
            return Acquired::Fetch(flight.future.clone());
        }

        let generation = entry.next_generation();
        debug!(%key, generation, "starting fetch");
        let retry = options.retry.unwrap_or(self.config.retry);
        let future = self.spawn_fetch(key.clone(), Arc::clone(&options.fetcher), retry, generation);
        entry.begin(generation, future.clone());
        Acquired::Fetch(future)
    }

    /// Runs the fetch on its own task so it completes even if every caller goes away.
    ///
    /// The first attempt is built before spawning, so whatever the fetcher reads
    /// synchronously is captured at the moment the request is issued.
    fn spawn_fetch<V>(
        &self,
        key: QueryKey,
        fetcher: Fetcher<V>,
        retry: RetryPolicy,
        generation: u64,
    ) -> SharedFetch
    where
        V: Clone + Send + Sync + 'static,
    {
        let first = std::panic::catch_unwind(AssertUnwindSafe(|| fetcher())).unwrap_or_else(|_| {
            futures::future::ready(Err(QueryError::Aborted("fetcher panicked".to_string()))).boxed()
        });
        let client = self.clone();
        let task = tokio::spawn(async move {
            let result = AssertUnwindSafe(client.fetch_with_retry(&key, first, &fetcher, retry))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(QueryError::Aborted("fetcher panicked".to_string())));
            client.settle(&key, generation, result.map(|data| Arc::new(data) as Erased))
        });

        async move {
            task.await
                .unwrap_or_else(|err| Err(QueryError::Aborted(err.to_string())))
        }
        .boxed()
        .shared()
    }

    /// Awaits `first`, then calls the fetcher again for each retry.
    async fn fetch_with_retry<V>(
        &self,
        key: &QueryKey,
        first: BoxFuture<'static, Result<V, QueryError>>,
        fetcher: &Fetcher<V>,
        retry: RetryPolicy,
    ) -> Result<V, QueryError> {
        let mut attempt = 0;
        let mut next = first;
        loop {
            match next.await {
                Ok(data) => return Ok(data),
                Err(err) if err.is_retryable() && attempt < retry.max_retries => {
                    let delay = retry.delay_for(attempt);
                    attempt += 1;
                    warn!(%key, attempt, max_retries = retry.max_retries, ?delay, error = %err, "fetch failed, retrying");
                    if !self.network.is_online() {
                        debug!(%key, "offline, retry suspended until reconnect");
                        self.network.wait_until_online().await;
                    }
                    tokio::time::sleep(delay).await;
                    next = fetcher();
                }
                Err(err) => {
                    warn!(%key, attempts = attempt + 1, error = %err, "fetch failed");
                    return Err(err);
                }
            }
        }
    }

    /// Applies a settled fetch and returns the outcome now held for the key.
    fn settle(&self, key: &QueryKey, generation: u64, outcome: Outcome) -> Outcome {
        let (current, applied) = {
            let Some(mut entry) = self.cache.get_mut(key) else {
                debug!(%key, generation, "entry removed before fetch settled");
                return outcome;
            };
            let applied = entry.settle(generation, outcome.clone(), Instant::now());
            (entry.outcome.clone().unwrap_or(outcome), applied)
        };

        if applied {
            debug!(%key, generation, ok = current.is_ok(), "fetch settled");
            let _ = self.events_tx.send(CacheEvent::Updated {
                key: key.clone(),
                generation,
            });
        } else {
            debug!(%key, generation, "dropping response superseded by a newer write");
        }
        current
    }
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new()
    }
}

fn downcast<V: Clone + 'static>(key: &QueryKey, outcome: Outcome) -> Result<V, QueryError> {
    let data = outcome?;
    data.downcast_ref::<V>()
        .cloned()
        .ok_or_else(|| QueryError::TypeMismatch {
            key: key.to_string(),
        })
}

fn state_from<V: Clone + 'static>(key: &QueryKey, outcome: Outcome, is_stale: bool) -> QueryState<V> {
    match downcast(key, outcome) {
        Ok(data) => QueryState::Success { data, is_stale },
        Err(err) => QueryState::Error(err),
    }
}
