//! Long-lived sources of messages, such as a mounted query.
//!
//! A [`SubscriptionSource`] describes how to open a stream; a [`Subscription`]
//! wraps a source so the host can map its output into its own message type and
//! tell identical subscriptions apart by [`SubscriptionId`].

use std::any::TypeId;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream::BoxStream;

/// Identity of a subscription: the source type plus a hash of its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    type_id: TypeId,
    hash: u64,
}

impl SubscriptionId {
    /// Creates an id for source type `T` with the given parameter hash.
    #[must_use]
    pub fn of<T: 'static>(hash: u64) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            hash,
        }
    }
}

/// A source that can open a stream of outputs.
pub trait SubscriptionSource: Send + Sync + 'static {
    type Output: Send + 'static;

    /// Opens a new stream. Each call starts an independent observation.
    fn stream(&self) -> BoxStream<'static, Self::Output>;

    /// Returns the identity used to deduplicate subscriptions.
    fn id(&self) -> SubscriptionId;
}

/// A subscription producing messages of type `Msg`.
///
/// # Example
///
/// ```rust,ignore
/// let sub = Subscription::new(Query::new(options, client.clone()))
///     .map(Message::Watchlist);
/// ```
pub struct Subscription<Msg> {
    id: SubscriptionId,
    spawn: Arc<dyn Fn() -> BoxStream<'static, Msg> + Send + Sync>,
}

impl<Msg: Send + 'static> Subscription<Msg> {
    /// Wraps a subscription source.
    pub fn new<S>(source: S) -> Self
    where
        S: SubscriptionSource<Output = Msg>,
    {
        let id = source.id();
        Self {
            id,
            spawn: Arc::new(move || source.stream()),
        }
    }

    /// Transforms the messages produced by this subscription.
    #[must_use]
    pub fn map<T, F>(self, f: F) -> Subscription<T>
    where
        T: Send + 'static,
        F: Fn(Msg) -> T + Clone + Send + Sync + 'static,
    {
        let spawn = self.spawn;
        Subscription {
            id: self.id,
            spawn: Arc::new(move || (spawn)().map(f.clone()).boxed()),
        }
    }

    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Opens the underlying stream.
    #[must_use]
    pub fn stream(&self) -> BoxStream<'static, Msg> {
        (self.spawn)()
    }
}

impl<Msg> Clone for Subscription<Msg> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            spawn: Arc::clone(&self.spawn),
        }
    }
}
