//! Role hierarchy for back-office access control.
//!
//! Roles form a total order `viewer < user < admin`. A role satisfies a
//! requirement when its rank is at least the requirement's rank. Roles the
//! client does not recognize rank 0 and never satisfy anything.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Back-office role as reported by the server.
///
/// Unrecognized role names are preserved in [`Role::Unknown`] so that a
/// cached user record round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    /// Read-only access; not allowed into the admin area.
    Viewer,
    /// Standard back-office user.
    User,
    /// Administrator with full back-office access.
    Admin,
    /// A role name the client does not know about.
    Unknown(String),
}

impl Role {
    /// Parses a role from its wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        Self::from(name.to_string())
    }

    /// Returns the wire name of this role.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Viewer => "viewer",
            Self::User => "user",
            Self::Admin => "admin",
            Self::Unknown(name) => name,
        }
    }

    /// Returns the rank of this role (`viewer=1`, `user=2`, `admin=3`, unknown `0`).
    #[must_use]
    pub fn rank(&self) -> u8 {
        match self {
            Self::Viewer => 1,
            Self::User => 2,
            Self::Admin => 3,
            Self::Unknown(_) => 0,
        }
    }

    /// Returns true if this role grants at least the privileges of `required`.
    #[must_use]
    pub fn satisfies(&self, required: &Role) -> bool {
        let rank = self.rank();
        rank > 0 && rank >= required.rank()
    }
}

/// Checks an actual role against an optional requirement.
///
/// With no requirement any authenticated user passes.
#[must_use]
pub fn satisfies(actual: &Role, required: Option<&Role>) -> bool {
    match required {
        Some(required) => actual.satisfies(required),
        None => true,
    }
}

impl From<String> for Role {
    fn from(name: String) -> Self {
        match name.as_str() {
            "viewer" => Self::Viewer,
            "user" => Self::User,
            "admin" => Self::Admin,
            _ => Self::Unknown(name),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Unknown(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
