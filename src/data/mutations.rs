//! Mutation factories for every write the app performs.
//!
//! Watchlist writes invalidate the acting user's watchlist. Session changes
//! invalidate the viewer and every watchlist, since both depend on who is
//! signed in.

use std::sync::Arc;

use futures::FutureExt;
use tracing::warn;

use crate::backend::{
    AuthProvider, Credentials, MediaItem, MediaRef, Session, SignUp, WatchlistEvent, WatchlistStore,
};
use crate::error::QueryError;
use crate::query::Mutation;
use crate::storage::KeyValueStorage;

use super::keys;

/// Storage key of the persisted session id.
pub const SESSION_KEY: &str = "session";

/// Adds a title to `user_id`'s watchlist. Resolves to the event's sequence number.
pub fn add_to_watchlist(store: Arc<dyn WatchlistStore>, user_id: &str) -> Mutation<MediaItem, u64> {
    let user = user_id.to_string();
    Mutation::new("add_to_watchlist", move |item: MediaItem| {
        let store = Arc::clone(&store);
        let event = WatchlistEvent::Added {
            user_id: user.clone(),
            item,
        };
        async move { store.commit(event).await }.boxed()
    })
    .invalidates(keys::watchlist(user_id))
    .notify_success("Added to watchlist")
    .notify_error("Could not add to watchlist")
}

pub fn remove_from_watchlist(
    store: Arc<dyn WatchlistStore>,
    user_id: &str,
) -> Mutation<MediaRef, u64> {
    let user = user_id.to_string();
    Mutation::new("remove_from_watchlist", move |media: MediaRef| {
        let store = Arc::clone(&store);
        let event = WatchlistEvent::Removed {
            user_id: user.clone(),
            media,
        };
        async move { store.commit(event).await }.boxed()
    })
    .invalidates(keys::watchlist(user_id))
    .notify_success("Removed from watchlist")
    .notify_error("Could not remove from watchlist")
}

/// Marks a title as watched (`true`) or unwatched.
pub fn mark_watched(
    store: Arc<dyn WatchlistStore>,
    user_id: &str,
) -> Mutation<(MediaRef, bool), u64> {
    let user = user_id.to_string();
    Mutation::new("mark_watched", move |(media, watched): (MediaRef, bool)| {
        let store = Arc::clone(&store);
        let event = WatchlistEvent::MarkedWatched {
            user_id: user.clone(),
            media,
            watched,
        };
        async move { store.commit(event).await }.boxed()
    })
    .invalidates(keys::watchlist(user_id))
    .notify_error("Could not update watchlist")
}

pub fn sign_in(
    auth: Arc<dyn AuthProvider>,
    storage: Arc<dyn KeyValueStorage>,
) -> Mutation<Credentials, Session> {
    Mutation::new("sign_in", move |credentials: Credentials| {
        let auth = Arc::clone(&auth);
        let storage = Arc::clone(&storage);
        async move {
            let session = auth.create_session(&credentials).await?;
            persist_session(storage.as_ref(), &session);
            Ok::<_, QueryError>(session)
        }
        .boxed()
    })
    .invalidates(keys::viewer())
    .invalidates(keys::watchlists())
    .notify_error("Could not sign in")
}

/// Creates an account and signs into it.
pub fn sign_up(
    auth: Arc<dyn AuthProvider>,
    storage: Arc<dyn KeyValueStorage>,
) -> Mutation<SignUp, Session> {
    Mutation::new("sign_up", move |request: SignUp| {
        let auth = Arc::clone(&auth);
        let storage = Arc::clone(&storage);
        async move {
            auth.create_account(&request).await?;
            let credentials = Credentials::new(request.email, request.password);
            let session = auth.create_session(&credentials).await?;
            persist_session(storage.as_ref(), &session);
            Ok::<_, QueryError>(session)
        }
        .boxed()
    })
    .invalidates(keys::viewer())
    .invalidates(keys::watchlists())
    .notify_success("Welcome!")
    .notify_error("Could not create account")
}

pub fn sign_out(
    auth: Arc<dyn AuthProvider>,
    storage: Arc<dyn KeyValueStorage>,
) -> Mutation<(), ()> {
    Mutation::new("sign_out", move |()| {
        let auth = Arc::clone(&auth);
        let storage = Arc::clone(&storage);
        async move {
            let result = auth.delete_session().await;
            // The local session is dropped even if the provider already forgot it.
            if let Err(err) = storage.remove(SESSION_KEY) {
                warn!(error = %err, "failed to remove persisted session");
            }
            match result {
                Ok(()) | Err(QueryError::Unauthenticated) => Ok(()),
                Err(err) => Err(err),
            }
        }
        .boxed()
    })
    .invalidates(keys::viewer())
    .invalidates(keys::watchlists())
    .notify_error("Could not sign out")
}

/// Emails a password recovery link. Invalidates nothing.
pub fn request_password_recovery(
    auth: Arc<dyn AuthProvider>,
    redirect_url: &str,
) -> Mutation<String, ()> {
    let redirect_url = redirect_url.to_string();
    Mutation::new("request_password_recovery", move |email: String| {
        let auth = Arc::clone(&auth);
        let redirect_url = redirect_url.clone();
        async move { auth.create_recovery(&email, &redirect_url).await }.boxed()
    })
    .notify_success("Check your email for a recovery link")
    .notify_error("Could not send recovery email")
}

/// The persisted session id, if any.
#[must_use]
pub fn stored_session(storage: &dyn KeyValueStorage) -> Option<String> {
    storage.get(SESSION_KEY).unwrap_or_else(|err| {
        warn!(error = %err, "failed to read persisted session");
        None
    })
}

fn persist_session(storage: &dyn KeyValueStorage, session: &Session) {
    if let Err(err) = storage.set(SESSION_KEY, &session.id) {
        warn!(error = %err, "failed to persist session");
    }
}
