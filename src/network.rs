//! Connectivity signal shared by the query client and its observers.
//!
//! The host platform reports connectivity changes through [`NetworkStatus::set_online`].
//! While offline, automatic fetch retries are suspended; when the network comes
//! back, mounted queries with stale or failed data refetch.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::info;

use crate::subscription::{SubscriptionId, SubscriptionSource};

/// Cloneable handle to the current connectivity state.
#[derive(Debug, Clone)]
pub struct NetworkStatus {
    tx: Arc<watch::Sender<bool>>,
}

impl NetworkStatus {
    /// Creates a status that starts online.
    #[must_use]
    pub fn new() -> Self {
        Self::with_initial(true)
    }

    #[must_use]
    pub fn with_initial(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    /// Records a connectivity change. Repeated reports of the same state are ignored.
    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            info!(online, "network status changed");
        }
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves immediately when online, otherwise when connectivity returns.
    pub async fn wait_until_online(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|online| *online).await;
    }

    /// Subscribes to connectivity changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for NetworkStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Emits the current connectivity, then every change.
///
/// Hosts mount this to show an offline banner.
impl SubscriptionSource for NetworkStatus {
    type Output = bool;

    fn stream(&self) -> BoxStream<'static, bool> {
        WatchStream::new(self.subscribe()).boxed()
    }

    fn id(&self) -> SubscriptionId {
        SubscriptionId::of::<Self>(0)
    }
}
