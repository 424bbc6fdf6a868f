//! Configurable in-process backends for tests and offline demos.
//!
//! Both mocks count their calls, can simulate latency, and can be told to
//! fail, so tests can assert exactly how often the data layer reached a backend.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::sleep;

use crate::error::QueryError;

use super::auth::AuthProvider;
use super::catalog::{MediaCatalog, SearchRequest};
use super::types::{Credentials, MediaItem, MediaKind, PAGE_SIZE, Page, Session, SignUp, User};

#[derive(Debug, Default)]
struct AuthState {
    accounts: BTreeMap<String, (String, User)>,
    session: Option<Session>,
    recoveries: Vec<(String, String)>,
    calls: BTreeMap<&'static str, usize>,
    next_id: u64,
}

/// An [`AuthProvider`] holding accounts in memory.
///
/// Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockAuth {
    state: Arc<Mutex<AuthState>>,
    failure: Arc<Mutex<Option<QueryError>>>,
    delay: Duration,
}

impl MockAuth {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every call by `delay`.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Registers an account and returns it.
    pub fn add_account(&self, email: &str, password: &str, name: &str) -> User {
        let mut state = self.state.lock();
        state.next_id += 1;
        let user = User {
            id: format!("user-{}", state.next_id),
            email: email.to_string(),
            name: name.to_string(),
            email_verified: false,
        };
        state
            .accounts
            .insert(email.to_string(), (password.to_string(), user.clone()));
        user
    }

    /// Registers an account and signs it in.
    pub fn signed_in(&self, email: &str, password: &str, name: &str) -> User {
        let user = self.add_account(email, password, name);
        let mut state = self.state.lock();
        state.next_id += 1;
        state.session = Some(Session {
            id: format!("session-{}", state.next_id),
            user_id: user.id.clone(),
            expires_at: None,
        });
        user
    }

    /// Makes every subsequent call fail with `error`; `None` restores normal behavior.
    pub fn fail_with(&self, error: Option<QueryError>) {
        *self.failure.lock() = error;
    }

    /// How many times `method` was called.
    #[must_use]
    pub fn calls(&self, method: &str) -> usize {
        self.state.lock().calls.get(method).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.state.lock().session.clone()
    }

    /// Recovery requests as `(email, redirect_url)` pairs.
    #[must_use]
    pub fn recoveries(&self) -> Vec<(String, String)> {
        self.state.lock().recoveries.clone()
    }

    async fn enter(&self, method: &'static str) -> Result<(), QueryError> {
        *self.state.lock().calls.entry(method).or_default() += 1;
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        self.failure.lock().clone().map_or(Ok(()), Err)
    }

    fn session_user(state: &AuthState) -> Result<User, QueryError> {
        let session = state.session.as_ref().ok_or(QueryError::Unauthenticated)?;
        state
            .accounts
            .values()
            .find(|(_, user)| user.id == session.user_id)
            .map(|(_, user)| user.clone())
            .ok_or(QueryError::Unauthenticated)
    }
}

#[async_trait]
impl AuthProvider for MockAuth {
    async fn current_user(&self) -> Result<User, QueryError> {
        self.enter("current_user").await?;
        Self::session_user(&self.state.lock())
    }

    async fn create_account(&self, request: &SignUp) -> Result<User, QueryError> {
        self.enter("create_account").await?;
        if self.state.lock().accounts.contains_key(&request.email) {
            return Err(QueryError::Backend {
                status: 409,
                message: format!("account {} already exists", request.email),
            });
        }
        Ok(self.add_account(&request.email, &request.password, &request.name))
    }

    async fn create_session(&self, credentials: &Credentials) -> Result<Session, QueryError> {
        self.enter("create_session").await?;
        let mut state = self.state.lock();
        let user_id = match state.accounts.get(&credentials.email) {
            Some((password, user)) if *password == credentials.password => user.id.clone(),
            _ => return Err(QueryError::Unauthenticated),
        };
        state.next_id += 1;
        let session = Session {
            id: format!("session-{}", state.next_id),
            user_id,
            expires_at: None,
        };
        state.session = Some(session.clone());
        Ok(session)
    }

    async fn delete_session(&self) -> Result<(), QueryError> {
        self.enter("delete_session").await?;
        self.state
            .lock()
            .session
            .take()
            .map(|_| ())
            .ok_or(QueryError::Unauthenticated)
    }

    async fn create_recovery(&self, email: &str, redirect_url: &str) -> Result<(), QueryError> {
        self.enter("create_recovery").await?;
        self.state
            .lock()
            .recoveries
            .push((email.to_string(), redirect_url.to_string()));
        Ok(())
    }

    async fn complete_recovery(
        &self,
        user_id: &str,
        _secret: &str,
        password: &str,
    ) -> Result<(), QueryError> {
        self.enter("complete_recovery").await?;
        let mut state = self.state.lock();
        let account = state
            .accounts
            .values_mut()
            .find(|(_, user)| user.id == user_id)
            .ok_or_else(|| QueryError::NotFound(format!("user {user_id}")))?;
        account.0 = password.to_string();
        Ok(())
    }

    async fn create_verification(&self, _redirect_url: &str) -> Result<(), QueryError> {
        self.enter("create_verification").await?;
        Self::session_user(&self.state.lock()).map(|_| ())
    }

    async fn complete_verification(&self, user_id: &str, _secret: &str) -> Result<(), QueryError> {
        self.enter("complete_verification").await?;
        let mut state = self.state.lock();
        let account = state
            .accounts
            .values_mut()
            .find(|(_, user)| user.id == user_id)
            .ok_or_else(|| QueryError::NotFound(format!("user {user_id}")))?;
        account.1.email_verified = true;
        Ok(())
    }
}

/// A [`MediaCatalog`] serving a fixed list of titles.
///
/// Searches match titles case-insensitively. Clones share counters and
/// queued failures.
#[derive(Debug, Clone)]
pub struct MockCatalog {
    kind: MediaKind,
    items: Arc<Vec<MediaItem>>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    failures: Arc<Mutex<VecDeque<QueryError>>>,
    requests: Arc<Mutex<Vec<SearchRequest>>>,
}

impl MockCatalog {
    #[must_use]
    pub fn new(kind: MediaKind, items: Vec<MediaItem>) -> Self {
        Self {
            kind,
            items: Arc::new(items),
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
            failures: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Delays every call by `delay`.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fails the next call with `error`. Queued failures are consumed in order.
    pub fn fail_next(&self, error: QueryError) {
        self.failures.lock().push_back(error);
    }

    /// Fails the next `times` calls with `error`.
    pub fn fail_times(&self, times: usize, error: &QueryError) {
        let mut failures = self.failures.lock();
        failures.extend(std::iter::repeat_n(error.clone(), times));
    }

    /// Total calls to `search` and `trending`.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every search request received, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().clone()
    }

    async fn enter(&self) -> Result<(), QueryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        self.failures.lock().pop_front().map_or(Ok(()), Err)
    }
}

#[async_trait]
impl MediaCatalog for MockCatalog {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    async fn search(&self, request: &SearchRequest) -> Result<Page<MediaItem>, QueryError> {
        self.requests.lock().push(request.clone());
        self.enter().await?;
        let needle = request.query.to_lowercase();
        let mut matches: Vec<MediaItem> = self
            .items
            .iter()
            .filter(|item| item.title.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        super::types::sort_media(&mut matches, request.sort);
        Ok(Page::paginate(matches, request.page, PAGE_SIZE))
    }

    async fn trending(&self, page: u32) -> Result<Page<MediaItem>, QueryError> {
        self.enter().await?;
        Ok(Page::paginate(self.items.to_vec(), page, PAGE_SIZE))
    }
}
