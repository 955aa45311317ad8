//! Access control primitives for the back-office.
//!
//! This crate provides:
//! - The role hierarchy (`Role`, `satisfies`)
//! - The cached user record (`User`, `UserPatch`)
//! - Session types (`TokenPair`, `SessionState`, `SessionView`)
//! - The view gate (`AccessGuard`, `GuardDecision`)
//! - Error types shared with the session manager
//!
//! # Example
//!
//! ```
//! use backoffice_access::{AccessGuard, GuardDecision, Role, SessionState, SessionView, User};
//!
//! let view = SessionView {
//!     state: SessionState::Authenticated,
//!     user: Some(User::new("1", "Alice", "alice@example.com", Role::User)),
//!     is_loading: false,
//!     error: None,
//! };
//!
//! let guard = AccessGuard::requiring(Role::Admin);
//! assert!(matches!(
//!     guard.evaluate(&view, "/admin/settings"),
//!     GuardDecision::Denied { .. }
//! ));
//! assert!(Role::Admin.satisfies(&Role::Viewer));
//! ```

pub mod error;
pub mod guard;
pub mod role;
pub mod session;
pub mod user;

// Re-export main types at crate root
pub use error::{ApiError, SessionError, StoreError};
pub use guard::{AccessGuard, GuardDecision};
pub use role::{Role, satisfies};
pub use session::{SessionState, SessionView, TokenPair};
pub use user::{User, UserFields, UserPatch};
