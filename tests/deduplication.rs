// Integration tests for in-flight request sharing

mod common;

use std::time::Duration;

use futures::StreamExt;
use tokio::time::{sleep, timeout};
use watchdeck::backend::{MediaItem, MediaKind, Page};
use watchdeck::query::{QueryConfig, QueryState};

use common::{fixture_with, movies};

const LATENCY: Duration = Duration::from_millis(100);

fn config() -> QueryConfig {
    QueryConfig::new(Duration::from_secs(60), Duration::from_secs(300))
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_fetches_share_one_request() -> color_eyre::Result<()> {
    let f = fixture_with(config(), movies().with_delay(LATENCY));
    f.ctx.filters.set_search("alien")?;
    let options = f.ctx.search(MediaKind::Movie);

    let (a, b) = tokio::join!(f.ctx.client.fetch(&options), f.ctx.client.fetch(&options));

    assert_eq!(a?, b?);
    assert_eq!(f.movies.calls(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_two_gets_before_response_issue_one_call() -> color_eyre::Result<()> {
    let f = fixture_with(config(), movies().with_delay(LATENCY));
    f.ctx.filters.set_search("alien")?;
    let options = f.ctx.search(MediaKind::Movie);

    assert_eq!(f.ctx.client.get(&options), QueryState::Loading);
    assert_eq!(f.ctx.client.get(&options), QueryState::Loading);
    assert!(f.ctx.client.is_fetching(&options.key));

    sleep(LATENCY * 2).await;

    let state = f.ctx.client.get(&options);
    let page = state.data().expect("fetched");
    assert_eq!(page.total_results, 2);
    assert_eq!(f.movies.calls(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_two_observers_share_one_request() -> color_eyre::Result<()> {
    let f = fixture_with(config(), movies().with_delay(LATENCY));
    let options = f.ctx.trending(MediaKind::Movie, 1);

    let mut first = f.ctx.observe(options.clone()).stream();
    let mut second = f.ctx.observe(options).stream();

    assert!(first.next().await.expect("loading").is_loading());
    assert!(second.next().await.expect("loading").is_loading());

    let a = first.next().await.expect("fetched");
    let b = second.next().await.expect("fetched");
    assert_eq!(a.data(), b.data());
    assert_eq!(a.data().map(|page| page.results.len()), Some(4));
    assert_eq!(f.movies.calls(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_unmounting_does_not_cancel_fetch() -> color_eyre::Result<()> {
    let f = fixture_with(config(), movies().with_delay(LATENCY));
    let options = f.ctx.trending(MediaKind::Movie, 1);

    let mut observer = f.ctx.observe(options.clone()).stream();
    assert!(observer.next().await.expect("loading").is_loading());
    let pending = timeout(LATENCY / 2, observer.next()).await;
    assert!(pending.is_err(), "fetch should still be in flight");
    drop(observer);

    sleep(LATENCY).await;

    let cached: Option<Page<MediaItem>> = f.ctx.client.get_entry(&options.key);
    assert_eq!(cached.map(|page| page.results.len()), Some(4));
    assert_eq!(f.movies.calls(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_fresh_entry_is_served_from_cache() -> color_eyre::Result<()> {
    let f = fixture_with(config(), movies());
    let options = f.ctx.trending(MediaKind::Movie, 1);

    f.ctx.client.fetch(&options).await?;
    f.ctx.client.fetch(&options).await?;
    assert_eq!(f.movies.calls(), 1);

    f.ctx.client.refetch(&options).await?;
    assert_eq!(f.movies.calls(), 2);
    Ok(())
}
