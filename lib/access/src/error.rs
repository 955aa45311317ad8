//! Error types for the access crate.
//!
//! Errors are layered:
//! - `ApiError`: failures talking to the remote API
//! - `StoreError`: failures reading or writing persisted session state
//! - `SessionError`: what the session manager reports to its callers

use std::fmt;

use crate::role::Role;

/// Message used when the server rejects a request without explaining why.
const GENERIC_FAILURE: &str = "The server could not process the request";

/// Errors from a single request to the remote API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// No response was received (connection refused, DNS, reset, ...).
    Network { details: String },
    /// The server answered 401.
    Unauthorized { message: Option<String> },
    /// The server answered with another non-2xx status, or with `success: false`.
    Rejected { status: u16, message: Option<String> },
    /// The response body could not be understood.
    InvalidResponse { details: String },
}

impl ApiError {
    /// Returns true if the server rejected the credential as unauthorized.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network { details } => write!(f, "network unavailable: {details}"),
            Self::Unauthorized { message } => {
                write!(f, "unauthorized: {}", message.as_deref().unwrap_or(GENERIC_FAILURE))
            }
            Self::Rejected { status, message } => write!(
                f,
                "server rejected request ({status}): {}",
                message.as_deref().unwrap_or(GENERIC_FAILURE)
            ),
            Self::InvalidResponse { details } => write!(f, "invalid server response: {details}"),
        }
    }
}

impl std::error::Error for ApiError {}

/// Errors from the persistent token store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Persisted state is unreadable or only partially present.
    Corrupted { details: String },
    /// The backing storage could not be read or written.
    Io { details: String },
    /// A value could not be serialized for storage.
    Serialization { details: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupted { details } => write!(f, "persisted session is corrupted: {details}"),
            Self::Io { details } => write!(f, "session storage I/O failed: {details}"),
            Self::Serialization { details } => {
                write!(f, "failed to serialize session: {details}")
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// Errors reported by the session manager.
///
/// `Clone` so that callers sharing a coalesced refresh all receive the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The server rejected the email/password combination.
    InvalidCredentials { message: Option<String> },
    /// Authentication succeeded but the role cannot enter the admin area.
    InsufficientRole { role: Role },
    /// The server could not be reached.
    NetworkUnavailable { details: String },
    /// Tokens were rejected and could not be renewed.
    SessionExpired,
    /// The server rejected the request with a non-2xx status or `success: false`.
    ServerRejected { status: Option<u16>, message: Option<String> },
    /// Persisted session state was inconsistent.
    CorruptedPersistedState { details: String },
    /// The operation needs a logged-in user.
    NotAuthenticated,
    /// Persisting the session failed.
    Storage { details: String },
}

impl SessionError {
    /// Maps a failed login request.
    ///
    /// On the login endpoint a 401 means the credentials were wrong.
    #[must_use]
    pub fn from_login_failure(error: ApiError) -> Self {
        match error {
            ApiError::Unauthorized { message } => Self::InvalidCredentials { message },
            other => Self::from(other),
        }
    }

    /// Returns the message shown to the user for this error.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidCredentials { message } => message
                .clone()
                .unwrap_or_else(|| "Invalid email or password".to_string()),
            Self::InsufficientRole { .. } => {
                "Access denied: this account is not allowed in the admin area".to_string()
            }
            Self::NetworkUnavailable { .. } => {
                "Unable to reach the server. Check your connection and try again.".to_string()
            }
            Self::SessionExpired => "Your session has expired. Please log in again.".to_string(),
            Self::ServerRejected { message, .. } => message
                .clone()
                .unwrap_or_else(|| GENERIC_FAILURE.to_string()),
            Self::CorruptedPersistedState { .. } => {
                "The saved session could not be read".to_string()
            }
            Self::NotAuthenticated => "You need to log in first".to_string(),
            Self::Storage { .. } => "The session could not be saved on this device".to_string(),
        }
    }

    /// Returns true if this error ended the session.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SessionExpired | Self::InsufficientRole { .. })
    }
}

impl From<ApiError> for SessionError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::Network { details } => Self::NetworkUnavailable { details },
            ApiError::Unauthorized { .. } => Self::SessionExpired,
            ApiError::Rejected { status, message } => Self::ServerRejected {
                status: Some(status),
                message,
            },
            ApiError::InvalidResponse { details } => Self::ServerRejected {
                status: None,
                message: Some(format!("Unexpected server response: {details}")),
            },
        }
    }
}

impl From<StoreError> for SessionError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Corrupted { details } => Self::CorruptedPersistedState { details },
            StoreError::Io { details } | StoreError::Serialization { details } => {
                Self::Storage { details }
            }
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCredentials { message } => write!(
                f,
                "invalid credentials: {}",
                message.as_deref().unwrap_or("rejected by server")
            ),
            Self::InsufficientRole { role } => {
                write!(f, "role '{role}' is not allowed in the admin area")
            }
            Self::NetworkUnavailable { details } => write!(f, "network unavailable: {details}"),
            Self::SessionExpired => write!(f, "session has expired"),
            Self::ServerRejected { status, message } => {
                let message = message.as_deref().unwrap_or(GENERIC_FAILURE);
                match status {
                    Some(status) => write!(f, "server rejected request ({status}): {message}"),
                    None => write!(f, "server rejected request: {message}"),
                }
            }
            Self::CorruptedPersistedState { details } => {
                write!(f, "persisted session is corrupted: {details}")
            }
            Self::NotAuthenticated => write!(f, "not authenticated"),
            Self::Storage { details } => write!(f, "session storage failed: {details}"),
        }
    }
}

impl std::error::Error for SessionError {}
