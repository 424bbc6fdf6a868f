//! The local-first store holding each user's watchlist.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::error::QueryError;
use crate::filters::{Sort, SortDirection, SortField};

use super::types::{MediaItem, MediaRef, Page};

/// A change to a user's watchlist. The store's state is the fold of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WatchlistEvent {
    Added { user_id: String, item: MediaItem },
    Removed { user_id: String, media: MediaRef },
    MarkedWatched { user_id: String, media: MediaRef, watched: bool },
    Rated { user_id: String, media: MediaRef, rating: u8 },
}

impl WatchlistEvent {
    #[must_use]
    pub fn user_id(&self) -> &str {
        match self {
            Self::Added { user_id, .. }
            | Self::Removed { user_id, .. }
            | Self::MarkedWatched { user_id, .. }
            | Self::Rated { user_id, .. } => user_id,
        }
    }
}

/// A title on a user's watchlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub item: MediaItem,
    /// Sequence number of the event that added the title.
    pub added_seq: u64,
    pub watched: bool,
    pub rating: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchlistRequest {
    pub user_id: String,
    pub page: u32,
    pub page_size: usize,
    pub sort: Sort,
    /// Only entries with this watched state; `None` returns all.
    pub watched: Option<bool>,
}

/// Read and write access to watchlists.
#[async_trait]
pub trait WatchlistStore: Send + Sync {
    /// Appends `event` and returns its sequence number.
    async fn commit(&self, event: WatchlistEvent) -> Result<u64, QueryError>;

    async fn entries(&self, request: &WatchlistRequest) -> Result<Page<WatchlistEntry>, QueryError>;

    /// Yields the latest committed sequence number after every commit.
    fn changes(&self) -> watch::Receiver<u64>;
}

#[derive(Debug, Default)]
struct Inner {
    log: Vec<(u64, WatchlistEvent)>,
    view: BTreeMap<(String, MediaRef), WatchlistEntry>,
}

impl Inner {
    fn apply(&mut self, seq: u64, event: &WatchlistEvent) {
        match event {
            WatchlistEvent::Added { user_id, item } => {
                self.view
                    .entry((user_id.clone(), item.media_ref()))
                    .and_modify(|entry| entry.item = item.clone())
                    .or_insert_with(|| WatchlistEntry {
                        item: item.clone(),
                        added_seq: seq,
                        watched: false,
                        rating: None,
                    });
            }
            WatchlistEvent::Removed { user_id, media } => {
                self.view.remove(&(user_id.clone(), *media));
            }
            WatchlistEvent::MarkedWatched {
                user_id,
                media,
                watched,
            } => {
                if let Some(entry) = self.view.get_mut(&(user_id.clone(), *media)) {
                    entry.watched = *watched;
                }
            }
            WatchlistEvent::Rated {
                user_id,
                media,
                rating,
            } => {
                if let Some(entry) = self.view.get_mut(&(user_id.clone(), *media)) {
                    entry.rating = Some(*rating);
                }
            }
        }
    }
}

/// An in-process [`WatchlistStore`] keeping an append-only event log and a
/// materialized view of it. Clones share the same data.
#[derive(Debug, Clone)]
pub struct MemoryWatchlistStore {
    inner: Arc<Mutex<Inner>>,
    changes: Arc<watch::Sender<u64>>,
    reads: Arc<AtomicUsize>,
}

impl MemoryWatchlistStore {
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            changes: Arc::new(changes),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Rebuilds a store by replaying `events` in order.
    #[must_use]
    pub fn replay(events: impl IntoIterator<Item = WatchlistEvent>) -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.lock();
            for event in events {
                let seq = inner.log.len() as u64 + 1;
                inner.apply(seq, &event);
                inner.log.push((seq, event));
            }
            let last = inner.log.len() as u64;
            store.changes.send_replace(last);
        }
        store
    }

    /// Every committed event with its sequence number.
    #[must_use]
    pub fn events(&self) -> Vec<(u64, WatchlistEvent)> {
        self.inner.lock().log.clone()
    }

    /// How many times [`entries`](WatchlistStore::entries) was called.
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl Default for MemoryWatchlistStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WatchlistStore for MemoryWatchlistStore {
    async fn commit(&self, event: WatchlistEvent) -> Result<u64, QueryError> {
        let seq = {
            let mut inner = self.inner.lock();
            let seq = inner.log.len() as u64 + 1;
            inner.apply(seq, &event);
            debug!(seq, user_id = event.user_id(), "committed watchlist event");
            inner.log.push((seq, event));
            seq
        };
        self.changes.send_replace(seq);
        Ok(seq)
    }

    async fn entries(&self, request: &WatchlistRequest) -> Result<Page<WatchlistEntry>, QueryError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let mut entries: Vec<WatchlistEntry> = {
            let inner = self.inner.lock();
            inner
                .view
                .iter()
                .filter(|((user_id, _), entry)| {
                    *user_id == request.user_id
                        && request.watched.is_none_or(|watched| entry.watched == watched)
                })
                .map(|(_, entry)| entry.clone())
                .collect()
        };
        sort_entries(&mut entries, request.sort);
        Ok(Page::paginate(entries, request.page, request.page_size))
    }

    fn changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}

fn sort_entries(entries: &mut [WatchlistEntry], sort: Sort) {
    match sort.field {
        SortField::AddedAt => entries.sort_by_key(|entry| entry.added_seq),
        SortField::Title => entries.sort_by_key(|entry| entry.item.title.to_lowercase()),
        SortField::ReleaseDate => entries.sort_by(|a, b| a.item.release_date.cmp(&b.item.release_date)),
        SortField::Rating => entries.sort_by(|a, b| {
            a.item
                .rating
                .partial_cmp(&b.item.rating)
                .unwrap_or(std::cmp::Ordering::Equal)
        }),
    }
    if sort.direction == SortDirection::Descending {
        entries.reverse();
    }
}
