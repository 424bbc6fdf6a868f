// Integration tests for mutation-driven invalidation

mod common;

use std::time::Duration;

use futures::StreamExt;
use tokio::time::timeout;
use watchdeck::backend::Credentials;
use watchdeck::command::{Action, NotificationLevel};
use watchdeck::data::keys;
use watchdeck::error::QueryError;
use watchdeck::query::QueryConfig;

use common::{fixture, movie};

const QUIET: Duration = Duration::from_millis(50);

fn config() -> QueryConfig {
    QueryConfig::new(Duration::from_secs(60), Duration::from_secs(300))
}

#[tokio::test(start_paused = true)]
async fn test_adding_a_title_refetches_the_mounted_page_once() -> color_eyre::Result<()> {
    let f = fixture(config());
    let user = f.auth.signed_in("ada@example.com", "pw", "Ada");

    let mut page = f.ctx.observe(f.ctx.watchlist_page(Some(&user.id), 1)).stream();
    assert!(page.next().await.expect("loading").is_loading());
    let empty = page.next().await.expect("fetched");
    assert_eq!(empty.data().map(|p| p.results.len()), Some(0));
    assert_eq!(f.watchlist.read_count(), 1);

    let seq = f
        .ctx
        .add_to_watchlist(&user.id)
        .execute(&f.ctx.client, movie(348, "Alien"))
        .await
        .into_result()?;
    assert_eq!(seq, 1);

    let stale = page.next().await.expect("stale state");
    assert!(stale.is_stale());

    let refreshed = page.next().await.expect("refetched state");
    assert!(!refreshed.is_stale());
    let titles: Vec<String> = refreshed
        .data()
        .map(|p| p.results.iter().map(|e| e.item.title.clone()).collect())
        .unwrap_or_default();
    assert_eq!(titles, vec!["Alien".to_string()]);

    assert!(timeout(QUIET, page.next()).await.is_err(), "exactly one refetch");
    assert_eq!(f.watchlist.read_count(), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_other_users_pages_are_left_alone() -> color_eyre::Result<()> {
    let f = fixture(config());
    let ada = f.auth.add_account("ada@example.com", "pw", "Ada");
    let bob = f.auth.add_account("bob@example.com", "pw", "Bob");

    let mut bobs = f.ctx.observe(f.ctx.watchlist_page(Some(&bob.id), 1)).stream();
    bobs.next().await.expect("loading");
    bobs.next().await.expect("fetched");

    f.ctx
        .add_to_watchlist(&ada.id)
        .execute(&f.ctx.client, movie(603, "The Matrix"))
        .await
        .into_result()?;

    assert!(timeout(QUIET, bobs.next()).await.is_err());
    assert_eq!(f.watchlist.read_count(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_unmounted_pages_refetch_on_next_read() -> color_eyre::Result<()> {
    let f = fixture(config());
    let user = f.auth.signed_in("ada@example.com", "pw", "Ada");
    let page_one = f.ctx.watchlist_page(Some(&user.id), 1);
    let page_two = f.ctx.watchlist_page(Some(&user.id), 2);

    f.ctx.client.fetch(&page_one).await?;
    f.ctx.client.fetch(&page_two).await?;
    assert_eq!(f.watchlist.read_count(), 2);

    f.ctx
        .add_to_watchlist(&user.id)
        .execute(&f.ctx.client, movie(949, "Heat"))
        .await
        .into_result()?;

    // Invalidation marks entries without fetching.
    assert_eq!(f.watchlist.read_count(), 2);
    assert!(f.ctx.client.is_stale(&keys::watchlist_page(&user.id, 1)));
    assert!(f.ctx.client.is_stale(&keys::watchlist_page(&user.id, 2)));

    let refreshed = f.ctx.client.fetch(&page_one).await?;
    assert_eq!(refreshed.total_results, 1);
    assert_eq!(f.watchlist.read_count(), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_sign_in_refreshes_the_viewer() -> color_eyre::Result<()> {
    let f = fixture(config());
    f.auth.add_account("ada@example.com", "pw", "Ada");

    let mut viewer = f.ctx.observe(f.ctx.viewer()).stream();
    viewer.next().await.expect("loading");
    let signed_out = viewer.next().await.expect("fetched");
    assert_eq!(signed_out.data(), Some(&None));

    let actions: Vec<_> = f
        .ctx
        .sign_in()
        .mutate(f.ctx.client.clone(), Credentials::new("ada@example.com", "pw"))
        .into_stream()
        .collect()
        .await;
    assert!(matches!(actions.last(), Some(Action::Message(Ok(_)))));

    viewer.next().await.expect("stale viewer");
    let signed_in = viewer.next().await.expect("refetched viewer");
    let name = signed_in
        .data()
        .and_then(|user| user.as_ref())
        .map(|user| user.name.clone());
    assert_eq!(name.as_deref(), Some("Ada"));
    assert_eq!(f.auth.calls("current_user"), 2);
    assert!(f.ctx.session_id().is_some());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_unauthenticated_write_requests_sign_in() {
    let f = fixture(config());
    f.auth.fail_with(Some(QueryError::Unauthenticated));

    let actions: Vec<_> = f
        .ctx
        .sign_out()
        .mutate(f.ctx.client.clone(), ())
        .into_stream()
        .collect()
        .await;

    // Signing out without a session still succeeds locally.
    assert!(matches!(actions.last(), Some(Action::Message(Ok(())))));

    let actions: Vec<_> = f
        .ctx
        .sign_in()
        .mutate(f.ctx.client.clone(), Credentials::new("ada@example.com", "pw"))
        .into_stream()
        .collect()
        .await;
    assert!(matches!(
        &actions[0],
        Action::Notify(n) if n.level == NotificationLevel::Error
    ));
    assert!(matches!(&actions[1], Action::RequireSignIn));
}
