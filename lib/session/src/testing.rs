//! In-crate fake of the remote API with per-call counters.

use async_trait::async_trait;
use backoffice_access::{ApiError, Role, TokenPair, User, UserFields, UserPatch};
use std::sync::Mutex;
use std::time::Duration;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::api::{AuthApi, AuthResponse};

/// Builds a login/refresh response for a user with `role`.
pub(crate) fn auth_response(role: Role, access_token: &str) -> AuthResponse {
    AuthResponse {
        user: User::new("1", "Admin", "admin@x.com", role),
        tokens: TokenPair::new(access_token, format!("{access_token}-refresh")),
    }
}

pub(crate) struct FakeApi {
    login: Mutex<Result<AuthResponse, ApiError>>,
    refresh: Mutex<Result<AuthResponse, ApiError>>,
    validate: Mutex<Result<(), ApiError>>,
    profile: Mutex<Result<UserFields, ApiError>>,
    login_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    validate_calls: AtomicUsize,
    profile_calls: AtomicUsize,
    refresh_delay: Mutex<Duration>,
    profile_tokens: Mutex<Vec<String>>,
}

impl FakeApi {
    pub(crate) fn new() -> Self {
        Self {
            login: Mutex::new(Ok(auth_response(Role::Admin, "t1"))),
            refresh: Mutex::new(Ok(auth_response(Role::Admin, "t2"))),
            validate: Mutex::new(Ok(())),
            profile: Mutex::new(Ok(UserFields::new())),
            login_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            validate_calls: AtomicUsize::new(0),
            profile_calls: AtomicUsize::new(0),
            refresh_delay: Mutex::new(Duration::ZERO),
            profile_tokens: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn set_login(&self, result: Result<AuthResponse, ApiError>) {
        *self.login.lock().expect("lock") = result;
    }

    pub(crate) fn set_refresh(&self, result: Result<AuthResponse, ApiError>) {
        *self.refresh.lock().expect("lock") = result;
    }

    pub(crate) fn set_validate(&self, result: Result<(), ApiError>) {
        *self.validate.lock().expect("lock") = result;
    }

    pub(crate) fn set_profile(&self, result: Result<UserFields, ApiError>) {
        *self.profile.lock().expect("lock") = result;
    }

    /// Makes every refresh take `delay` before answering.
    pub(crate) fn set_refresh_delay(&self, delay: Duration) {
        *self.refresh_delay.lock().expect("lock") = delay;
    }

    /// Access tokens sent with each profile update, in call order.
    pub(crate) fn profile_tokens(&self) -> Vec<String> {
        self.profile_tokens.lock().expect("lock").clone()
    }

    pub(crate) fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn validate_calls(&self) -> usize {
        self.validate_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthApi for FakeApi {
    async fn login(&self, _email: &str, _password: &str) -> Result<AuthResponse, ApiError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.login.lock().expect("lock").clone()
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<AuthResponse, ApiError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        let delay = *self.refresh_delay.lock().expect("lock");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.refresh.lock().expect("lock").clone()
    }

    async fn validate(&self, _access_token: &str) -> Result<(), ApiError> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.validate.lock().expect("lock").clone()
    }

    async fn update_profile(
        &self,
        access_token: &str,
        _patch: &UserPatch,
    ) -> Result<UserFields, ApiError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        self.profile_tokens
            .lock()
            .expect("lock")
            .push(access_token.to_string());
        tokio::task::yield_now().await;
        self.profile.lock().expect("lock").clone()
    }
}
