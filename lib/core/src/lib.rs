//! Core domain types and utilities for the back-office.
//!
//! This crate provides the foundational types and error handling shared by
//! the access-control and session crates.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::UserId;
