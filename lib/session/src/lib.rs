//! Authentication session management for the back-office client.
//!
//! This crate provides:
//! - The remote auth API client (`AuthApi`, `HttpAuthApi`)
//! - Durable token storage (`TokenStore`, `FileTokenStore`, `MemoryTokenStore`)
//! - The session manager (`AuthSessionManager`) with background validation
//!   and coalesced token refresh
//! - Route guards bound to the live session (`GuardedView`)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use backoffice_session::{
//!     ApiConfig, AuthSessionManager, HttpAuthApi, MemoryTokenStore, SessionSettings,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let api = HttpAuthApi::new(ApiConfig::new("http://localhost:3001/api"))?;
//! let manager = AuthSessionManager::new(
//!     Arc::new(api),
//!     Arc::new(MemoryTokenStore::new()),
//!     SessionSettings::default(),
//! );
//!
//! manager.start().await;
//! let user = manager.login("admin@example.com", "secret").await?;
//! println!("logged in as {}", user.display_name());
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod manager;
pub mod store;
pub mod validation;
pub mod view;

#[cfg(test)]
mod testing;

// Re-export main types at crate root
pub use api::{AuthApi, AuthResponse, HttpAuthApi};
pub use config::{ApiConfig, SessionSettings};
pub use manager::{AuthSessionManager, ValidationOutcome};
pub use store::{FileTokenStore, MemoryTokenStore, PersistedSession, TokenStore};
pub use validation::PeriodicTask;
pub use view::GuardedView;
