// Shared fixtures for integration tests
#![allow(dead_code)]

use std::sync::Arc;

use watchdeck::backend::mock::{MockAuth, MockCatalog};
use watchdeck::backend::{MediaItem, MediaKind, MemoryWatchlistStore};
use watchdeck::data::{AppContext, Backends};
use watchdeck::query::QueryConfig;
use watchdeck::storage::{KeyValueStorage, MemoryStorage};

pub struct Fixture {
    pub ctx: AppContext,
    pub auth: MockAuth,
    pub movies: MockCatalog,
    pub tv: MockCatalog,
    pub watchlist: MemoryWatchlistStore,
}

pub fn fixture(config: QueryConfig) -> Fixture {
    fixture_with(config, movies())
}

/// A fixture serving movies from `movies`.
pub fn fixture_with(config: QueryConfig, movies: MockCatalog) -> Fixture {
    build(config, movies, Arc::new(MemoryStorage::new()))
}

/// A fixture persisting to `storage`.
pub fn fixture_with_storage(config: QueryConfig, storage: Arc<dyn KeyValueStorage>) -> Fixture {
    build(config, movies(), storage)
}

fn build(config: QueryConfig, movies: MockCatalog, storage: Arc<dyn KeyValueStorage>) -> Fixture {
    let auth = MockAuth::new();
    let tv = MockCatalog::new(MediaKind::Tv, vec![show(1399, "Game of Thrones")]);
    let watchlist = MemoryWatchlistStore::new();
    let ctx = AppContext::new(
        config,
        storage,
        Backends {
            auth: Arc::new(auth.clone()),
            movies: Arc::new(movies.clone()),
            tv: Arc::new(tv.clone()),
            watchlist: Arc::new(watchlist.clone()),
        },
    );
    Fixture {
        ctx,
        auth,
        movies,
        tv,
        watchlist,
    }
}

pub fn movies() -> MockCatalog {
    MockCatalog::new(
        MediaKind::Movie,
        vec![
            movie(348, "Alien"),
            movie(679, "Aliens"),
            movie(603, "The Matrix"),
            movie(949, "Heat"),
        ],
    )
}

pub fn movie(id: u64, title: &str) -> MediaItem {
    MediaItem {
        id,
        kind: MediaKind::Movie,
        title: title.to_string(),
        overview: String::new(),
        release_date: None,
        rating: None,
        poster_path: None,
    }
}

pub fn show(id: u64, title: &str) -> MediaItem {
    MediaItem {
        kind: MediaKind::Tv,
        ..movie(id, title)
    }
}
