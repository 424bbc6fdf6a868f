use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, Shared};
use tokio::time::Instant;

use crate::error::QueryError;

/// A type-erased cached value. Each key holds values of one concrete type.
pub type Erased = Arc<dyn Any + Send + Sync>;

/// The settled result of a fetch.
pub type Outcome = Result<Erased, QueryError>;

/// A fetch that any number of callers can await.
pub type SharedFetch = Shared<BoxFuture<'static, Outcome>>;

/// The fetch currently running for a key.
pub struct InFlight {
    pub generation: u64,
    pub future: SharedFetch,
}

impl fmt::Debug for InFlight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InFlight")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// A cached entry with timestamp, staleness and in-flight information.
///
/// Every write to an entry, fetched or optimistic, gets a generation number.
/// An outcome older than the last applied generation is discarded, and a
/// fetch issued before an invalidation settles as stale.
#[derive(Debug)]
pub struct CacheEntry {
    pub outcome: Option<Outcome>,
    pub updated_at: Option<Instant>,
    pub stale_time: Duration,
    pub invalidated: bool,
    pub in_flight: Option<InFlight>,
    issued: u64,
    applied: u64,
    invalidated_through: u64,
}

impl CacheEntry {
    /// Creates an empty entry that has never been fetched.
    pub const fn new(stale_time: Duration) -> Self {
        Self {
            outcome: None,
            updated_at: None,
            stale_time,
            invalidated: false,
            in_flight: None,
            issued: 0,
            applied: 0,
            invalidated_through: 0,
        }
    }

    /// Checks if this entry is stale at `now`.
    pub fn is_stale(&self, now: Instant) -> bool {
        if self.invalidated {
            return true;
        }
        match (&self.outcome, self.updated_at) {
            (Some(_), Some(updated_at)) => now.duration_since(updated_at) > self.stale_time,
            _ => true,
        }
    }

    /// Generation of the write currently held by this entry (0 if none).
    pub const fn generation(&self) -> u64 {
        self.applied
    }

    /// Marks this entry as stale, including any fetch already in flight.
    pub const fn mark_stale(&mut self) {
        self.invalidated = true;
        self.invalidated_through = self.issued;
    }

    /// Reserves the next write generation.
    pub const fn next_generation(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    /// Records `future` as the in-flight fetch for `generation`.
    pub fn begin(&mut self, generation: u64, future: SharedFetch) {
        self.in_flight = Some(InFlight { generation, future });
    }

    /// Applies the outcome of write `generation`.
    ///
    /// Clears the in-flight slot if it belongs to `generation`. Returns `false`
    /// when a newer write was already applied and the outcome was dropped.
    pub fn settle(&mut self, generation: u64, outcome: Outcome, now: Instant) -> bool {
        if self
            .in_flight
            .as_ref()
            .is_some_and(|flight| flight.generation == generation)
        {
            self.in_flight = None;
        }

        if generation < self.applied {
            return false;
        }

        self.applied = generation;
        self.outcome = Some(outcome);
        self.updated_at = Some(now);
        self.invalidated = generation <= self.invalidated_through;
        true
    }

    /// Checks if this entry should be garbage collected based on cache time.
    pub fn should_gc(&self, now: Instant, cache_time: Duration) -> bool {
        self.in_flight.is_none()
            && self
                .updated_at
                .is_none_or(|updated_at| now.duration_since(updated_at) > cache_time)
    }
}
