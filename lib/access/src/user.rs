//! User domain type and profile patches.
//!
//! The server owns user records. The client keeps a cached copy that is
//! authoritative only until the next successful validate or refresh response
//! overwrites it.

use backoffice_core::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::role::Role;

/// Raw JSON fields of a user record, as returned by a profile update.
pub type UserFields = Map<String, Value>;

fn default_active() -> bool {
    true
}

/// A back-office user as cached by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Server-assigned user ID.
    id: UserId,
    /// Name shown in the back-office header and tables.
    #[serde(rename = "nome")]
    display_name: String,
    /// Login email address.
    email: String,
    /// Back-office role.
    role: Role,
    /// Avatar image URL, if the user uploaded one.
    #[serde(rename = "avatar", default, skip_serializing_if = "Option::is_none")]
    avatar_url: Option<String>,
    /// Whether the account is enabled.
    #[serde(rename = "ativo", default = "default_active")]
    active: bool,
    /// When the user record was created.
    #[serde(rename = "createdAt", default = "Utc::now")]
    created_at: DateTime<Utc>,
    /// When the user record was last updated.
    #[serde(rename = "updatedAt", default = "Utc::now")]
    updated_at: DateTime<Utc>,
}

impl User {
    /// Creates an active user with fresh timestamps.
    #[must_use]
    pub fn new(
        id: impl Into<UserId>,
        display_name: impl Into<String>,
        email: impl Into<String>,
        role: Role,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            display_name: display_name.into(),
            email: email.into(),
            role,
            avatar_url: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the user's ID.
    #[must_use]
    pub fn id(&self) -> &UserId {
        &self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Returns the email address.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns the user's role.
    #[must_use]
    pub fn role(&self) -> &Role {
        &self.role
    }

    /// Returns the avatar URL, if any.
    #[must_use]
    pub fn avatar_url(&self) -> Option<&str> {
        self.avatar_url.as_deref()
    }

    /// Returns true if the account is enabled.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Returns when the user was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the user was last updated.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns a copy of this user with `fields` overlaid on its JSON form.
    ///
    /// Fields absent from `fields` keep their cached values. The original is
    /// left untouched, so a merge that fails to produce a valid user has no
    /// effect on the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the merged record is not a valid user.
    pub fn merged_with(&self, fields: &UserFields) -> Result<User, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(record) = &mut value {
            for (key, field) in fields {
                record.insert(key.clone(), field.clone());
            }
        }
        serde_json::from_value(value)
    }
}

/// Partial user sent to the profile endpoint.
///
/// Only fields that are set are serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPatch {
    /// New display name.
    #[serde(rename = "nome", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// New email address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// New avatar URL.
    #[serde(rename = "avatar", skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl UserPatch {
    /// Creates a patch that only changes the display name.
    #[must_use]
    pub fn display_name(name: impl Into<String>) -> Self {
        Self {
            display_name: Some(name.into()),
            ..Self::default()
        }
    }
}
