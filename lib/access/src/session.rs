//! Session types shared between the session manager and its consumers.
//!
//! The manager owns the live session; UI collaborators only ever see the
//! read-only [`SessionView`] projection.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::user::User;

/// Access and refresh tokens issued together by the server.
///
/// Both tokens are opaque bearer strings. `Debug` output redacts them.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    /// Short-lived credential attached to API calls.
    access_token: String,
    /// Longer-lived credential used only to obtain a new pair.
    refresh_token: String,
}

impl TokenPair {
    /// Creates a new token pair.
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// Returns the access token.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Returns the refresh token.
    #[must_use]
    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Lifecycle state of the client session.
///
/// ```text
///   Uninitialized ──start──→ Restoring ──→ Authenticated ⇄ Refreshing
///                                 │              │
///                                 └──→ Anonymous ←┘ (logout / failure)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// The manager has not looked at persisted state yet.
    Uninitialized,
    /// Persisted state is being loaded.
    Restoring,
    /// No session.
    Anonymous,
    /// A user is logged in.
    Authenticated,
    /// A logged-in session is renewing its tokens.
    Refreshing,
}

impl SessionState {
    /// Returns true for states that hold a logged-in user.
    ///
    /// `Refreshing` counts as authenticated; it is invisible to the UI.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated | Self::Refreshing)
    }

    /// Returns true while the authentication check has not resolved.
    #[must_use]
    pub fn is_resolving(&self) -> bool {
        matches!(self, Self::Uninitialized | Self::Restoring)
    }
}

/// Read-only projection of the session consumed by UI collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    /// Current lifecycle state.
    pub state: SessionState,
    /// The cached user, present while authenticated.
    pub user: Option<User>,
    /// Whether a login or profile update is in flight.
    pub is_loading: bool,
    /// Last human-readable error from login or profile update.
    pub error: Option<String>,
}

impl SessionView {
    /// The view before the manager has started.
    #[must_use]
    pub fn uninitialized() -> Self {
        Self {
            state: SessionState::Uninitialized,
            user: None,
            is_loading: false,
            error: None,
        }
    }

    /// Returns true if a user is logged in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.is_authenticated() && self.user.is_some()
    }
}

impl Default for SessionView {
    fn default() -> Self {
        Self::uninitialized()
    }
}
