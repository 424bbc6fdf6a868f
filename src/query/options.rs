use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::QueryError;

use super::config::RetryPolicy;
use super::key::QueryKey;

/// The async function that loads a query's data.
///
/// It is called anew for every fetch, so anything it reads from shared stores
/// is read at fetch time rather than when the options were built.
pub type Fetcher<V> = Arc<dyn Fn() -> BoxFuture<'static, Result<V, QueryError>> + Send + Sync>;

/// A declarative description of a unit of remote data.
///
/// # Example
///
/// ```
/// use watchdeck::error::QueryError;
/// use watchdeck::query::QueryOptions;
/// use watchdeck::query_key;
///
/// let options = QueryOptions::new(query_key!["greeting"], || {
///     Box::pin(async { Ok::<_, QueryError>("hello".to_string()) })
/// });
/// assert_eq!(options.key, query_key!["greeting"]);
/// ```
pub struct QueryOptions<V> {
    pub key: QueryKey,
    pub(crate) fetcher: Fetcher<V>,
    /// Overrides [`QueryConfig::stale_time`](super::QueryConfig::stale_time) for this query.
    pub stale_time: Option<Duration>,
    /// Overrides [`QueryConfig::retry`](super::QueryConfig::retry) for this query.
    pub retry: Option<RetryPolicy>,
}

impl<V> QueryOptions<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new<F>(key: QueryKey, fetcher: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<V, QueryError>> + Send + Sync + 'static,
    {
        Self {
            key,
            fetcher: Arc::new(fetcher),
            stale_time: None,
            retry: None,
        }
    }

    /// Options whose fetch resolves immediately to `value` without touching a backend.
    ///
    /// Used when a required identifier is missing, so the caller still gets a
    /// well-formed (empty) result instead of an unauthenticated request.
    pub fn resolved(key: QueryKey, value: V) -> Self {
        Self::new(key, move || {
            let value = value.clone();
            async move { Ok::<_, QueryError>(value) }.boxed()
        })
    }

    #[must_use]
    pub const fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }

    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Invokes the fetcher once, bypassing the cache.
    pub fn run(&self) -> BoxFuture<'static, Result<V, QueryError>> {
        (self.fetcher)()
    }
}

impl<V> Clone for QueryOptions<V> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            fetcher: Arc::clone(&self.fetcher),
            stale_time: self.stale_time,
            retry: self.retry,
        }
    }
}

impl<V> fmt::Debug for QueryOptions<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryOptions")
            .field("key", &self.key)
            .field("stale_time", &self.stale_time)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
