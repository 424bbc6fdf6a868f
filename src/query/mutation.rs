//! Write operations and the invalidations they trigger.
//!
//! A [`Mutation`] pairs a write against a backend with the query-key prefixes
//! that become stale once the write succeeds. Unlike queries, mutations are not
//! cached and are never retried automatically.
//!
//! # Example
//!
//! ```rust,ignore
//! use watchdeck::query::{Mutation, QueryError};
//! use watchdeck::query_key;
//!
//! let add = Mutation::new("add_to_watchlist", move |item: MediaItem| {
//!     let store = store.clone();
//!     Box::pin(async move { store.commit(WatchlistEvent::added(&user, item)).await })
//! })
//! .invalidates(query_key!["watchlist", user.clone()])
//! .notify_success("Added to watchlist");
//!
//! // In the host's update function:
//! add.mutate(client.clone(), item).map(Message::Added)
//! ```

use std::fmt;
use std::sync::Arc;

use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream;
use tracing::{info, warn};

use crate::command::{Action, Command, Notification};
use crate::error::QueryError;

use super::client::QueryClient;
use super::key::QueryKey;

type Mutator<I, O> = Arc<dyn Fn(I) -> BoxFuture<'static, Result<O, QueryError>> + Send + Sync>;

/// The state of a mutation result.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationState<T> {
    /// Mutation is idle (not yet started).
    Idle,
    /// Mutation is in progress.
    Loading,
    /// Mutation succeeded with a result.
    Success(T),
    /// Mutation failed with an error.
    Error(QueryError),
}

/// A mutation result containing the current state.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationResult<T> {
    /// The current state of the mutation.
    pub state: MutationState<T>,
}

impl<T> MutationResult<T> {
    /// Returns the result data if the mutation succeeded, otherwise `None`.
    pub const fn data(&self) -> Option<&T> {
        match &self.state {
            MutationState::Success(data) => Some(data),
            _ => None,
        }
    }

    /// Returns the error if the mutation failed, otherwise `None`.
    pub const fn error(&self) -> Option<&QueryError> {
        match &self.state {
            MutationState::Error(err) => Some(err),
            _ => None,
        }
    }

    /// Returns `true` if the mutation is currently loading.
    pub const fn is_loading(&self) -> bool {
        matches!(self.state, MutationState::Loading)
    }

    /// Returns `true` if the mutation succeeded.
    pub const fn is_success(&self) -> bool {
        matches!(self.state, MutationState::Success(_))
    }

    /// Returns `true` if the mutation failed.
    pub const fn is_error(&self) -> bool {
        matches!(self.state, MutationState::Error(_))
    }

    /// Converts a settled result into a `Result`.
    ///
    /// `Idle` and `Loading` map to [`QueryError::Aborted`].
    pub fn into_result(self) -> Result<T, QueryError> {
        match self.state {
            MutationState::Success(data) => Ok(data),
            MutationState::Error(err) => Err(err),
            MutationState::Idle | MutationState::Loading => {
                Err(QueryError::Aborted("mutation has not settled".to_string()))
            }
        }
    }
}

impl<T> From<MutationState<T>> for MutationResult<T> {
    fn from(state: MutationState<T>) -> Self {
        Self { state }
    }
}

/// A write operation with its cache side effects.
pub struct Mutation<I, O> {
    name: String,
    mutator: Mutator<I, O>,
    invalidates: Vec<QueryKey>,
    success_notice: Option<String>,
    error_notice: Option<String>,
}

impl<I, O> Mutation<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Creates a mutation named `name` (used in logs) around `mutator`.
    pub fn new<F>(name: impl Into<String>, mutator: F) -> Self
    where
        F: Fn(I) -> BoxFuture<'static, Result<O, QueryError>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            mutator: Arc::new(mutator),
            invalidates: Vec::new(),
            success_notice: None,
            error_notice: None,
        }
    }

    /// Declares a key prefix to invalidate after a successful write.
    #[must_use]
    pub fn invalidates(mut self, prefix: QueryKey) -> Self {
        self.invalidates.push(prefix);
        self
    }

    /// Shows `text` as a success notification when the write succeeds.
    #[must_use]
    pub fn notify_success(mut self, text: impl Into<String>) -> Self {
        self.success_notice = Some(text.into());
        self
    }

    /// Prefixes the error notification shown when the write fails.
    #[must_use]
    pub fn notify_error(mut self, text: impl Into<String>) -> Self {
        self.error_notice = Some(text.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The prefixes invalidated on success, in declaration order.
    #[must_use]
    pub fn invalidation_keys(&self) -> &[QueryKey] {
        &self.invalidates
    }

    /// Runs the write once and, on success, invalidates every declared prefix.
    pub async fn execute(&self, client: &QueryClient, input: I) -> MutationResult<O> {
        match (self.mutator)(input).await {
            Ok(output) => {
                for prefix in &self.invalidates {
                    client.invalidate_queries(prefix);
                }
                info!(mutation = %self.name, invalidated = self.invalidates.len(), "mutation succeeded");
                MutationState::Success(output).into()
            }
            Err(err) => {
                warn!(mutation = %self.name, error = %err, "mutation failed");
                MutationState::Error(err).into()
            }
        }
    }

    /// Runs the write as a [`Command`].
    ///
    /// The command emits the configured notifications, [`Action::RequireSignIn`]
    /// when the session is missing, and finally the result as a message.
    pub fn mutate(&self, client: Arc<QueryClient>, input: I) -> Command<Result<O, QueryError>> {
        let mutation = self.clone();
        Command::actions(
            stream::once(async move {
                let result = mutation.execute(&client, input).await.into_result();
                stream::iter(mutation.settle_actions(result))
            })
            .flatten(),
        )
    }

    fn settle_actions(&self, result: Result<O, QueryError>) -> Vec<Action<Result<O, QueryError>>> {
        let mut actions = Vec::with_capacity(3);
        match &result {
            Ok(_) => {
                if let Some(text) = &self.success_notice {
                    actions.push(Action::Notify(Notification::success(text.clone())));
                }
            }
            Err(err) => {
                let prefix = self.error_notice.as_deref().unwrap_or("Something went wrong");
                actions.push(Action::Notify(Notification::error(format!("{prefix}: {err}"))));
                if err.is_unauthenticated() {
                    actions.push(Action::RequireSignIn);
                }
            }
        }
        actions.push(Action::Message(result));
        actions
    }
}

impl<I, O> Clone for Mutation<I, O> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            mutator: Arc::clone(&self.mutator),
            invalidates: self.invalidates.clone(),
            success_notice: self.success_notice.clone(),
            error_notice: self.error_notice.clone(),
        }
    }
}

impl<I, O> fmt::Debug for Mutation<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutation")
            .field("name", &self.name)
            .field("invalidates", &self.invalidates)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::NotificationLevel;
    use crate::query_key;
    use std::time::Duration;

    fn doubling() -> Mutation<i32, i32> {
        Mutation::new("double", |n: i32| Box::pin(async move { Ok::<_, QueryError>(n * 2) }))
    }

    fn failing(err: QueryError) -> Mutation<i32, i32> {
        Mutation::new("fail", move |_n: i32| {
            let err = err.clone();
            Box::pin(async move { Err::<i32, _>(err) })
        })
    }

    #[test]
    fn test_mutation_result_data() {
        let result = MutationResult::from(MutationState::Success(42));
        assert_eq!(result.data(), Some(&42));

        let result: MutationResult<i32> = MutationState::Idle.into();
        assert_eq!(result.data(), None);

        let result: MutationResult<i32> = MutationState::Loading.into();
        assert_eq!(result.data(), None);

        let result: MutationResult<i32> =
            MutationState::Error(QueryError::FetchError("error".to_string())).into();
        assert_eq!(result.data(), None);
    }

    #[test]
    fn test_mutation_result_predicates() {
        let idle: MutationResult<i32> = MutationState::Idle.into();
        assert!(!idle.is_loading());
        assert!(!idle.is_success());
        assert!(!idle.is_error());

        let loading: MutationResult<i32> = MutationState::Loading.into();
        assert!(loading.is_loading());

        let success = MutationResult::from(MutationState::Success(42));
        assert!(success.is_success());
        assert!(!success.is_error());

        let error: MutationResult<i32> = MutationState::Error(QueryError::Unauthenticated).into();
        assert!(error.is_error());
        assert_eq!(error.error(), Some(&QueryError::Unauthenticated));
    }

    #[tokio::test]
    async fn test_execute_invalidates_declared_prefixes() {
        let client = QueryClient::with_config(crate::query::QueryConfig::new(
            Duration::from_secs(60),
            Duration::from_secs(300),
        ));
        client.set_entry(query_key!["watchlist", "u1", 1], 1);
        client.set_entry(query_key!["viewer"], 2);
        client.set_entry(query_key!["search", "movie", "x"], 3);

        let mutation = doubling()
            .invalidates(query_key!["watchlist", "u1"])
            .invalidates(query_key!["viewer"]);
        let result = mutation.execute(&client, 21).await;

        assert_eq!(result.data(), Some(&42));
        assert!(client.is_stale(&query_key!["watchlist", "u1", 1]));
        assert!(client.is_stale(&query_key!["viewer"]));
        assert!(!client.is_stale(&query_key!["search", "movie", "x"]));
    }

    #[tokio::test]
    async fn test_failed_execute_does_not_invalidate() {
        let client = QueryClient::with_config(crate::query::QueryConfig::new(
            Duration::from_secs(60),
            Duration::from_secs(300),
        ));
        client.set_entry(query_key!["watchlist", "u1", 1], 1);

        let mutation =
            failing(QueryError::NetworkError("down".into())).invalidates(query_key!["watchlist"]);
        let result = mutation.execute(&client, 1).await;

        assert!(result.is_error());
        assert!(!client.is_stale(&query_key!["watchlist", "u1", 1]));
    }

    #[tokio::test]
    async fn test_mutate_emits_notification_then_message() {
        let client = Arc::new(QueryClient::new());
        let cmd = doubling().notify_success("Doubled").mutate(client, 4);

        let actions: Vec<_> = cmd.into_stream().collect().await;
        assert_eq!(actions.len(), 2);
        assert!(matches!(
            &actions[0],
            Action::Notify(n) if n.level == NotificationLevel::Success && n.text == "Doubled"
        ));
        assert!(matches!(&actions[1], Action::Message(Ok(8))));
    }

    #[tokio::test]
    async fn test_mutate_routes_unauthenticated_to_sign_in() {
        let client = Arc::new(QueryClient::new());
        let cmd = failing(QueryError::Unauthenticated)
            .notify_error("Could not save")
            .mutate(client, 1);

        let actions: Vec<_> = cmd.into_stream().collect().await;
        assert_eq!(actions.len(), 3);
        assert!(matches!(
            &actions[0],
            Action::Notify(n) if n.level == NotificationLevel::Error
                && n.text == "Could not save: Not authenticated"
        ));
        assert!(matches!(&actions[1], Action::RequireSignIn));
        assert!(matches!(
            &actions[2],
            Action::Message(Err(QueryError::Unauthenticated))
        ));
    }
}
