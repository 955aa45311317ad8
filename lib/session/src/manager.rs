//! The session manager: owns the client's authentication state.
//!
//! Responsibilities:
//! - Restoring a persisted session at startup
//! - Login and logout
//! - Background validation of the access token on a fixed interval
//! - Refreshing tokens when the server rejects the access token
//! - Persisting every change so the session survives restarts
//!
//! # Concurrency
//!
//! Exactly one state-mutating operation runs at a time: login, logout,
//! refresh and profile updates all take the write gate, so store writes never
//! interleave. Concurrent refresh requests share a single in-flight refresh
//! and therefore a single network call and a single persisted token pair.
//! The refresh runs on its own task, so it finishes and releases the gate
//! even when every caller stops waiting for it.
//! Validation only reads the session until it needs a refresh.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use backoffice_access::{
    ApiError, SessionError, SessionState, SessionView, StoreError, TokenPair, User, UserPatch,
};
use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use rootcause::Report;
use tokio::sync::{Mutex as AsyncMutex, watch};
use tracing::{debug, error, info, warn};

use crate::api::AuthApi;
use crate::config::SessionSettings;
use crate::store::{PersistedSession, TokenStore};
use crate::validation::PeriodicTask;

/// Consecutive transient validation failures before logging at error level.
const VALIDATION_FAILURE_ESCALATION: u32 = 3;

type RefreshFuture = BoxFuture<'static, Result<User, SessionError>>;

fn store_failure(report: &Report<StoreError>) -> SessionError {
    SessionError::from(report.current_context().clone())
}

/// Result of one background validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Nobody is logged in; nothing was checked.
    NoSession,
    /// The server accepted the access token.
    Valid,
    /// The access token was rejected and a refresh renewed it.
    Refreshed,
    /// The access token was rejected and the refresh failed; the session ended.
    Expired,
    /// The check failed for another reason; the session was left untouched.
    Unresolved,
}

/// The live session. Only the manager sees the tokens.
struct Session {
    state: SessionState,
    user: Option<User>,
    tokens: Option<TokenPair>,
    is_loading: bool,
    last_error: Option<String>,
}

impl Session {
    fn new() -> Self {
        Self {
            state: SessionState::Uninitialized,
            user: None,
            tokens: None,
            is_loading: false,
            last_error: None,
        }
    }

    fn view(&self) -> SessionView {
        SessionView {
            state: self.state,
            user: self.user.clone(),
            is_loading: self.is_loading,
            error: self.last_error.clone(),
        }
    }
}

struct Inner {
    api: Arc<dyn AuthApi>,
    store: Arc<dyn TokenStore>,
    settings: SessionSettings,
    session: Mutex<Session>,
    views: watch::Sender<SessionView>,
    write_gate: AsyncMutex<()>,
    refresh_flight: Mutex<Option<WeakShared<RefreshFuture>>>,
    validation: Mutex<Option<PeriodicTask>>,
    validation_failures: AtomicU32,
}

/// Resets the loading flag if an operation is abandoned mid-flight.
struct LoadingGuard<'a>(&'a Inner);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.0.read(|s| s.is_loading) {
            self.0.update(|s| s.is_loading = false);
        }
    }
}

impl Inner {
    fn read<R>(&self, f: impl FnOnce(&Session) -> R) -> R {
        let session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        f(&session)
    }

    /// Mutates the session and publishes the new view.
    fn update<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        let result = f(&mut session);
        self.views.send_replace(session.view());
        result
    }

    fn access_token(&self) -> Option<String> {
        self.read(|s| s.tokens.as_ref().map(|t| t.access_token().to_string()))
    }

    /// Replaces any running validation task with a fresh one.
    fn start_validation(self: &Arc<Self>, first_delay: Duration) {
        let weak = Arc::downgrade(self);
        let task = PeriodicTask::spawn(first_delay, self.settings.validate_interval(), move || {
            let inner = weak.upgrade()?;
            Some(async move {
                AuthSessionManager { inner }.validate().await;
            })
        });

        let previous = self
            .validation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            previous.cancel();
        }
    }

    /// Starts validation unless a task is already running.
    fn ensure_validation(self: &Arc<Self>) {
        let running = self
            .validation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished());
        if !running {
            self.start_validation(self.settings.validate_interval());
        }
    }

    fn stop_validation(&self) {
        let task = self
            .validation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.cancel();
            debug!("periodic validation stopped");
        }
    }

    /// Tears the session down: store, memory and timer.
    fn end_session(&self, error: Option<String>) {
        self.stop_validation();
        if let Err(report) = self.store.clear() {
            error!(error = %report, "failed to clear persisted session");
        }
        self.validation_failures.store(0, Ordering::SeqCst);
        self.update(|s| {
            s.state = SessionState::Anonymous;
            s.user = None;
            s.tokens = None;
            s.is_loading = false;
            s.last_error = error;
        });
    }

    /// Persists and installs a freshly issued session.
    fn install(&self, user: User, tokens: TokenPair) -> Result<(), SessionError> {
        self.store
            .save(&tokens, &user)
            .map_err(|report| store_failure(&report))?;
        self.validation_failures.store(0, Ordering::SeqCst);
        self.update(|s| {
            s.state = SessionState::Authenticated;
            s.user = Some(user);
            s.tokens = Some(tokens);
            s.is_loading = false;
            s.last_error = None;
        });
        Ok(())
    }

    fn check_admin_area(&self, user: &User) -> Result<(), SessionError> {
        let role = user.role();
        if role.satisfies(&self.settings.admin_area_role) {
            Ok(())
        } else {
            Err(SessionError::InsufficientRole { role: role.clone() })
        }
    }

    async fn login_locked(
        self: &Arc<Self>,
        email: &str,
        password: &str,
    ) -> Result<User, SessionError> {
        let response = self
            .api
            .login(email, password)
            .await
            .map_err(SessionError::from_login_failure)?;
        self.check_admin_area(&response.user)?;

        let user = response.user.clone();
        self.install(response.user, response.tokens)?;
        self.start_validation(self.settings.validate_interval());
        Ok(user)
    }

    /// Runs one refresh on its own task so it completes even if every
    /// caller stops waiting; callers share the task's result.
    fn spawn_refresh(self: &Arc<Self>) -> Shared<RefreshFuture> {
        let task = tokio::spawn(Arc::clone(self).refresh_once());
        async move {
            task.await.unwrap_or_else(|e| {
                error!(error = %e, "refresh task failed");
                Err(SessionError::SessionExpired)
            })
        }
        .boxed()
        .shared()
    }

    async fn refresh_once(self: Arc<Self>) -> Result<User, SessionError> {
        let _gate = self.write_gate.lock().await;

        let refresh_token = match self.store.load() {
            Ok(Some(persisted)) => persisted.tokens.refresh_token().to_string(),
            Ok(None) => {
                debug!("no refresh token stored; ending session");
                self.end_session(None);
                return Err(SessionError::SessionExpired);
            }
            Err(report) => {
                warn!(error = %store_failure(&report), "persisted session unreadable during refresh");
                self.end_session(None);
                return Err(SessionError::SessionExpired);
            }
        };

        self.update(|s| {
            if s.state.is_authenticated() {
                s.state = SessionState::Refreshing;
            }
        });

        let response = match self.api.refresh(&refresh_token).await {
            Ok(response) => response,
            Err(error) => {
                warn!(error = %error, "token refresh failed; ending session");
                let error = match error {
                    ApiError::Unauthorized { .. } => SessionError::SessionExpired,
                    other => SessionError::from(other),
                };
                self.end_session(Some(SessionError::SessionExpired.user_message()));
                return Err(error);
            }
        };

        if let Err(error) = self.check_admin_area(&response.user) {
            warn!(error = %error, "refreshed user lost admin access; ending session");
            self.end_session(Some(error.user_message()));
            return Err(error);
        }

        let user = response.user.clone();
        if let Err(error) = self.install(response.user, response.tokens) {
            error!(error = %error, "failed to persist refreshed tokens; ending session");
            self.end_session(Some(error.user_message()));
            return Err(error);
        }
        self.ensure_validation();
        info!(user_id = %user.id(), "tokens refreshed");
        Ok(user)
    }

    async fn update_profile_locked(
        &self,
        tokens: &TokenPair,
        user: &User,
        patch: &UserPatch,
    ) -> Result<User, SessionError> {
        let fields = self
            .api
            .update_profile(tokens.access_token(), patch)
            .await
            .map_err(|error| match error {
                ApiError::Unauthorized { message } => SessionError::ServerRejected {
                    status: Some(401),
                    message,
                },
                other => SessionError::from(other),
            })?;

        let merged = user
            .merged_with(&fields)
            .map_err(|e| SessionError::ServerRejected {
                status: None,
                message: Some(format!("Unexpected profile data: {e}")),
            })?;

        self.store
            .save(tokens, &merged)
            .map_err(|report| store_failure(&report))?;
        self.update(|s| {
            s.user = Some(merged.clone());
            s.is_loading = false;
        });
        Ok(merged)
    }
}

/// Owns the client's authentication session.
///
/// Cloning is cheap; all clones share the same session. The periodic
/// validation task stops when the session ends, on [`shutdown`], or when the
/// last clone is dropped.
///
/// [`shutdown`]: AuthSessionManager::shutdown
#[derive(Clone)]
pub struct AuthSessionManager {
    inner: Arc<Inner>,
}

impl AuthSessionManager {
    /// Creates a manager in the `Uninitialized` state.
    ///
    /// Call [`start`](Self::start) to restore any persisted session.
    #[must_use]
    pub fn new(
        api: Arc<dyn AuthApi>,
        store: Arc<dyn TokenStore>,
        settings: SessionSettings,
    ) -> Self {
        let (views, _) = watch::channel(SessionView::uninitialized());
        Self {
            inner: Arc::new(Inner {
                api,
                store,
                settings,
                session: Mutex::new(Session::new()),
                views,
                write_gate: AsyncMutex::new(()),
                refresh_flight: Mutex::new(None),
                validation: Mutex::new(None),
                validation_failures: AtomicU32::new(0),
            }),
        }
    }

    /// Restores the persisted session, if any.
    ///
    /// A restored session is trusted optimistically and validated in the
    /// background right away. Unreadable persisted state is discarded.
    /// Calling `start` again after the first time has no effect.
    pub async fn start(&self) -> SessionState {
        let _gate = self.inner.write_gate.lock().await;
        let state = self.inner.read(|s| s.state);
        if state != SessionState::Uninitialized {
            return state;
        }

        self.inner.update(|s| s.state = SessionState::Restoring);
        let restored = match self.inner.store.load() {
            Ok(restored) => restored,
            Err(report) => {
                warn!(error = %store_failure(&report), "discarding unreadable persisted session");
                if let Err(report) = self.inner.store.clear() {
                    error!(error = %report, "failed to clear persisted session");
                }
                None
            }
        };

        match restored {
            Some(PersistedSession { tokens, user }) => {
                info!(user_id = %user.id(), "restored persisted session");
                self.inner.update(|s| {
                    s.state = SessionState::Authenticated;
                    s.user = Some(user);
                    s.tokens = Some(tokens);
                });
                self.inner.start_validation(Duration::ZERO);
                SessionState::Authenticated
            }
            None => {
                debug!("no persisted session");
                self.inner.update(|s| s.state = SessionState::Anonymous);
                SessionState::Anonymous
            }
        }
    }

    /// Logs in with email and password.
    ///
    /// Only roles allowed in the admin area may log in; anyone else gets
    /// [`SessionError::InsufficientRole`] and nothing is persisted. On failure
    /// the error's user message is also stored in the view.
    ///
    /// # Errors
    ///
    /// Returns the reason the login failed.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, SessionError> {
        let _gate = self.inner.write_gate.lock().await;
        self.inner.update(|s| {
            s.is_loading = true;
            s.last_error = None;
        });
        let _loading = LoadingGuard(&self.inner);

        let result = self.inner.login_locked(email, password).await;
        match &result {
            Ok(user) => info!(user_id = %user.id(), role = %user.role(), "logged in"),
            Err(error) if error.is_fatal() => {
                warn!(error = %error, "login refused; clearing session");
                self.inner.end_session(Some(error.user_message()));
            }
            Err(error) => {
                warn!(error = %error, "login failed");
                let message = error.user_message();
                self.inner.update(|s| {
                    s.last_error = Some(message);
                    s.is_loading = false;
                });
            }
        }
        result
    }

    /// Ends the session. Never contacts the server and always succeeds.
    pub async fn logout(&self) {
        let _gate = self.inner.write_gate.lock().await;
        self.inner.end_session(None);
        info!("logged out");
    }

    /// Exchanges the stored refresh token for a new token pair.
    ///
    /// Concurrent calls share one refresh. Any failure ends the session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SessionExpired`] if there is no refresh token or
    /// the server rejects it, or the error that prevented the refresh.
    pub async fn refresh(&self) -> Result<User, SessionError> {
        let flight = {
            let mut slot = self
                .inner
                .refresh_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref().and_then(WeakShared::upgrade) {
                Some(flight) => {
                    debug!("joining in-flight refresh");
                    flight
                }
                None => {
                    let flight = self.inner.spawn_refresh();
                    *slot = flight.downgrade();
                    flight
                }
            }
        };

        let result = flight.clone().await;

        {
            let mut slot = self
                .inner
                .refresh_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let finished = slot
                .as_ref()
                .and_then(WeakShared::upgrade)
                .is_none_or(|current| current.ptr_eq(&flight));
            if finished {
                *slot = None;
            }
        }
        result
    }

    /// Checks the access token with the server.
    ///
    /// A 401 triggers exactly one refresh; if that fails the session ends.
    /// Other failures leave the session untouched.
    pub async fn validate(&self) -> ValidationOutcome {
        let Some(token) = self.inner.access_token() else {
            return ValidationOutcome::NoSession;
        };

        match self.inner.api.validate(&token).await {
            Ok(()) => {
                self.inner.validation_failures.store(0, Ordering::SeqCst);
                debug!("session still valid");
                ValidationOutcome::Valid
            }
            Err(error) if error.is_unauthorized() => {
                match self.inner.access_token() {
                    Some(current) if current == token => {}
                    Some(_) => {
                        debug!("access token rotated during validation; skipping refresh");
                        return ValidationOutcome::Valid;
                    }
                    None => return ValidationOutcome::NoSession,
                }

                info!("access token rejected; refreshing");
                match self.refresh().await {
                    Ok(_) => ValidationOutcome::Refreshed,
                    Err(error) => {
                        warn!(error = %error, "session ended after failed refresh");
                        ValidationOutcome::Expired
                    }
                }
            }
            Err(error) => {
                let failures = self.inner.validation_failures.fetch_add(1, Ordering::SeqCst) + 1;
                if failures >= VALIDATION_FAILURE_ESCALATION {
                    error!(
                        error = %error,
                        consecutive_failures = failures,
                        "session validation keeps failing; keeping session"
                    );
                } else {
                    warn!(
                        error = %error,
                        consecutive_failures = failures,
                        "session validation failed; keeping session"
                    );
                }
                ValidationOutcome::Unresolved
            }
        }
    }

    /// Updates the logged-in user's profile and caches the result.
    ///
    /// On failure the cached user is left exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotAuthenticated`] without a session, or the
    /// reason the server or store rejected the update.
    pub async fn update_profile(&self, patch: &UserPatch) -> Result<User, SessionError> {
        let _gate = self.inner.write_gate.lock().await;

        let current = self.inner.read(|s| match (&s.tokens, &s.user) {
            (Some(tokens), Some(user)) if s.state.is_authenticated() => {
                Some((tokens.clone(), user.clone()))
            }
            _ => None,
        });
        let Some((tokens, user)) = current else {
            let error = SessionError::NotAuthenticated;
            let message = error.user_message();
            self.inner.update(|s| s.last_error = Some(message));
            return Err(error);
        };

        self.inner.update(|s| {
            s.is_loading = true;
            s.last_error = None;
        });
        let _loading = LoadingGuard(&self.inner);

        let result = self.inner.update_profile_locked(&tokens, &user, patch).await;
        match &result {
            Ok(user) => info!(user_id = %user.id(), "profile updated"),
            Err(error) => {
                warn!(error = %error, "profile update failed");
                let message = error.user_message();
                self.inner.update(|s| {
                    s.last_error = Some(message);
                    s.is_loading = false;
                });
            }
        }
        result
    }

    /// Clears the last error shown to the user.
    pub fn clear_error(&self) {
        self.inner.update(|s| s.last_error = None);
    }

    /// Returns the current read-only view.
    #[must_use]
    pub fn view(&self) -> SessionView {
        self.inner.read(Session::view)
    }

    /// Subscribes to view changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.inner.views.subscribe()
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.read(|s| s.state)
    }

    /// Returns true if a user is logged in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner
            .read(|s| s.state.is_authenticated() && s.user.is_some())
    }

    /// Returns the cached user, if logged in.
    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.inner.read(|s| s.user.clone())
    }

    /// Returns the access token for authorizing other API calls.
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.inner.access_token()
    }

    /// Stops background validation. The session itself is kept.
    pub fn shutdown(&self) {
        self.inner.stop_validation();
    }
}

impl std::fmt::Debug for AuthSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSessionManager")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
