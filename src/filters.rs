//! Search, sort and filter state shared by every screen.
//!
//! [`FilterStore`] holds the current [`FilterState`]. Query fetchers read it
//! when a request is issued, not when the options are built, so a setter call
//! is visible to the very next fetch even while an earlier one is still in
//! flight. Every change is persisted so the state survives restarts, and
//! reported to the listeners registered with [`FilterStore::on_change`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::StorageError;
use crate::storage::KeyValueStorage;

/// Storage key for the persisted filter state.
pub const STORAGE_KEY: &str = "filters";

/// Flag name: only show titles marked as watched (`true`) or unwatched (`false`).
pub const WATCHED: &str = "watched";

/// Flag name: include adult titles in catalog searches.
pub const INCLUDE_ADULT: &str = "include_adult";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    AddedAt,
    Title,
    ReleaseDate,
    Rating,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

impl SortDirection {
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Sort {
    #[must_use]
    pub const fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }
}

/// UI-driven query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterState {
    pub search: String,
    pub sort: Sort,
    /// Tri-state boolean filters: a missing name means "no preference".
    pub flags: BTreeMap<String, bool>,
}

impl FilterState {
    #[must_use]
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.flags.get(name).copied()
    }
}

type Listener = Arc<dyn Fn(&FilterState, &FilterState) + Send + Sync>;

/// Cloneable handle to the process-wide filter state.
#[derive(Clone)]
pub struct FilterStore {
    state: Arc<RwLock<FilterState>>,
    storage: Arc<dyn KeyValueStorage>,
    listeners: Arc<RwLock<Vec<Listener>>>,
}

impl FilterStore {
    /// Restores the persisted state from `storage`.
    ///
    /// Missing or unreadable state falls back to the default; a corrupt
    /// document is logged and replaced on the next write.
    pub fn load(storage: Arc<dyn KeyValueStorage>) -> Self {
        let state = match storage.get(STORAGE_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!(error = %err, "discarding corrupt filter state");
                FilterState::default()
            }),
            Ok(None) => FilterState::default(),
            Err(err) => {
                warn!(error = %err, "failed to read filter state");
                FilterState::default()
            }
        };
        Self {
            state: Arc::new(RwLock::new(state)),
            storage,
            listeners: Arc::default(),
        }
    }

    /// Registers `listener`, called with the previous and new state after
    /// every setter that changes something.
    pub fn on_change(&self, listener: impl Fn(&FilterState, &FilterState) + Send + Sync + 'static) {
        self.listeners.write().push(Arc::new(listener));
    }

    /// Returns a copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> FilterState {
        self.state.read().clone()
    }

    #[must_use]
    pub fn search(&self) -> String {
        self.state.read().search.clone()
    }

    #[must_use]
    pub fn sort(&self) -> Sort {
        self.state.read().sort
    }

    #[must_use]
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.state.read().flag(name)
    }

    pub fn set_search(&self, search: impl Into<String>) -> Result<(), StorageError> {
        let search = search.into();
        self.update(|state| state.search = search)
    }

    pub fn set_sort(&self, sort: Sort) -> Result<(), StorageError> {
        self.update(|state| state.sort = sort)
    }

    pub fn toggle_sort_direction(&self) -> Result<(), StorageError> {
        self.update(|state| state.sort.direction = state.sort.direction.toggled())
    }

    /// Sets flag `name`; `None` clears it.
    pub fn set_flag(&self, name: &str, value: Option<bool>) -> Result<(), StorageError> {
        self.update(|state| match value {
            Some(value) => {
                state.flags.insert(name.to_string(), value);
            }
            None => {
                state.flags.remove(name);
            }
        })
    }

    pub fn reset(&self) -> Result<(), StorageError> {
        self.update(|state| *state = FilterState::default())
    }

    /// Applies `change` in memory, notifies listeners, then persists.
    ///
    /// The in-memory change is kept even when persisting fails.
    fn update(&self, change: impl FnOnce(&mut FilterState)) -> Result<(), StorageError> {
        let (before, after) = {
            let mut state = self.state.write();
            let before = state.clone();
            change(&mut state);
            (before, state.clone())
        };
        if before == after {
            return Ok(());
        }

        let listeners = self.listeners.read().clone();
        for listener in &listeners {
            listener(&before, &after);
        }

        let serialized = serde_json::to_string(&after)?;
        self.storage.set(STORAGE_KEY, &serialized).inspect_err(|err| {
            warn!(error = %err, "failed to persist filter state");
        })
    }
}

impl fmt::Debug for FilterStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterStore")
            .field("state", &*self.state.read())
            .finish_non_exhaustive()
    }
}
