//! Persistent token storage.
//!
//! A persisted session is three well-known keys (access token, refresh token,
//! JSON user record) that are always written together and cleared together.
//! Readers never observe a token without its user or the other way around:
//! a partial or unreadable record is reported as corrupted.

use backoffice_access::{StoreError, TokenPair, User};
use backoffice_core::Result;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Key holding the access token.
pub const ACCESS_TOKEN_KEY: &str = "admin_token";
/// Key holding the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "admin_refresh_token";
/// Key holding the JSON-serialized user record.
pub const USER_KEY: &str = "admin_user";

/// A session as read back from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedSession {
    /// The stored token pair.
    pub tokens: TokenPair,
    /// The cached user the tokens belong to.
    pub user: User,
}

/// Durable storage for the session.
///
/// All operations are synchronous and atomic with respect to each other.
pub trait TokenStore: Send + Sync {
    /// Persists a token pair together with its user.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized or written.
    fn save(&self, tokens: &TokenPair, user: &User) -> Result<(), StoreError>;

    /// Loads the persisted session, or `None` if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupted`] for partial or unreadable records.
    fn load(&self) -> Result<Option<PersistedSession>, StoreError>;

    /// Removes the persisted session. Clearing an empty store succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be modified.
    fn clear(&self) -> Result<(), StoreError>;
}

type Entries = BTreeMap<String, String>;

fn encode(tokens: &TokenPair, user: &User) -> Result<Entries, StoreError> {
    let user_json = serde_json::to_string(user).map_err(|e| StoreError::Serialization {
        details: e.to_string(),
    })?;

    let mut entries = Entries::new();
    entries.insert(ACCESS_TOKEN_KEY.to_string(), tokens.access_token().to_string());
    entries.insert(
        REFRESH_TOKEN_KEY.to_string(),
        tokens.refresh_token().to_string(),
    );
    entries.insert(USER_KEY.to_string(), user_json);
    Ok(entries)
}

fn decode(entries: &Entries) -> Result<Option<PersistedSession>, StoreError> {
    let access = entries.get(ACCESS_TOKEN_KEY).filter(|v| !v.is_empty());
    let refresh = entries.get(REFRESH_TOKEN_KEY).filter(|v| !v.is_empty());
    let user = entries.get(USER_KEY);

    let (access, refresh, user) = match (access, refresh, user) {
        (None, None, None) => return Ok(None),
        (Some(access), Some(refresh), Some(user)) => (access, refresh, user),
        _ => {
            return Err(StoreError::Corrupted {
                details: "session keys are only partially present".to_string(),
            }
            .into());
        }
    };

    let user: User = serde_json::from_str(user).map_err(|e| StoreError::Corrupted {
        details: format!("unreadable user record: {e}"),
    })?;

    Ok(Some(PersistedSession {
        tokens: TokenPair::new(access.as_str(), refresh.as_str()),
        user,
    }))
}

/// In-process store. Survives nothing, useful for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    entries: Mutex<Entries>,
}

impl MemoryTokenStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with raw key/value entries.
    #[must_use]
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: Mutex::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Returns true if no key is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

impl TokenStore for MemoryTokenStore {
    fn save(&self, tokens: &TokenPair, user: &User) -> Result<(), StoreError> {
        let encoded = encode(tokens, user)?;
        *self.entries.lock().unwrap_or_else(PoisonError::into_inner) = encoded;
        Ok(())
    }

    fn load(&self) -> Result<Option<PersistedSession>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        decode(&entries)
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

/// Store backed by a single JSON document on disk.
///
/// Writes go to a sibling temporary file that is then renamed over the
/// target, so an interrupted write leaves the previous document intact.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileTokenStore {
    /// Creates a store persisting to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Returns the document path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn io_error(action: &str, path: &Path, error: &std::io::Error) -> StoreError {
    StoreError::Io {
        details: format!("{action} {}: {error}", path.display()),
    }
}

impl TokenStore for FileTokenStore {
    fn save(&self, tokens: &TokenPair, user: &User) -> Result<(), StoreError> {
        let entries = encode(tokens, user)?;
        let document = serde_json::to_vec_pretty(&entries).map_err(|e| StoreError::Serialization {
            details: e.to_string(),
        })?;

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| io_error("create", parent, &e))?;
        }
        let temp = self.temp_path();
        std::fs::write(&temp, document).map_err(|e| io_error("write", &temp, &e))?;
        std::fs::rename(&temp, &self.path).map_err(|e| io_error("replace", &self.path, &e))?;
        Ok(())
    }

    fn load(&self) -> Result<Option<PersistedSession>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error("read", &self.path, &e).into()),
        };

        let entries: Entries = serde_json::from_str(&raw).map_err(|e| StoreError::Corrupted {
            details: format!("unreadable session document: {e}"),
        })?;
        decode(&entries)
    }

    fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("remove", &self.path, &e).into()),
        }
    }
}
