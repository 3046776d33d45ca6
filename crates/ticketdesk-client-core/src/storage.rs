use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::auth::{SessionUser, UserRole};

pub const AUTH_TOKEN_KEY: &str = "authToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const USER_ROLE_KEY: &str = "userRole";
pub const USER_NAME_KEY: &str = "userName";
pub const USER_ID_KEY: &str = "userId";

pub const SESSION_KEYS: [&str; 5] = [
    AUTH_TOKEN_KEY,
    REFRESH_TOKEN_KEY,
    USER_ROLE_KEY,
    USER_NAME_KEY,
    USER_ID_KEY,
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("session_storage_read_failed:{message}")]
    Read { message: String },
    #[error("session_storage_write_failed:{message}")]
    Write { message: String },
    #[error("session_storage_decode_failed:{message}")]
    Decode { message: String },
}

/// Durable string key/value storage holding the session fields.
pub trait SessionStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

impl<S> SessionStorage for std::sync::Arc<S>
where
    S: SessionStorage + ?Sized,
{
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove_item(key)
    }
}

/// Session fields as read back from storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedSession {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<SessionUser>,
}

impl PersistedSession {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.user.is_none()
    }
}

pub fn load_session(storage: &dyn SessionStorage) -> Result<PersistedSession, StorageError> {
    let access_token = non_empty(storage.get_item(AUTH_TOKEN_KEY)?);
    let refresh_token = non_empty(storage.get_item(REFRESH_TOKEN_KEY)?);
    let user_id = non_empty(storage.get_item(USER_ID_KEY)?);
    let user_name = non_empty(storage.get_item(USER_NAME_KEY)?);
    let user_role = non_empty(storage.get_item(USER_ROLE_KEY)?).and_then(|raw| UserRole::parse(&raw));

    let user = match (user_id, user_role) {
        (Some(id), Some(role)) => Some(SessionUser {
            id,
            name: user_name.unwrap_or_default(),
            role,
        }),
        _ => None,
    };

    Ok(PersistedSession {
        access_token,
        refresh_token,
        user,
    })
}

pub fn persist_login(
    storage: &dyn SessionStorage,
    access_token: &str,
    refresh_token: &str,
    user: &SessionUser,
) -> Result<(), StorageError> {
    storage.set_item(AUTH_TOKEN_KEY, access_token)?;
    storage.set_item(REFRESH_TOKEN_KEY, refresh_token)?;
    storage.set_item(USER_ROLE_KEY, user.role.as_str())?;
    storage.set_item(USER_NAME_KEY, &user.name)?;
    storage.set_item(USER_ID_KEY, &user.id)
}

/// Removes every session key. Keeps going past individual failures and
/// reports the first one.
pub fn clear_session(storage: &dyn SessionStorage) -> Result<(), StorageError> {
    let mut first_error = None;
    for key in SESSION_KEYS {
        if let Err(error) = storage.remove_item(key) {
            tracing::warn!(key, %error, "failed to remove session key");
            first_error.get_or_insert(error);
        }
    }
    match first_error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.items
            .lock()
            .map(|items| items.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl SessionStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self.items.lock().map_err(|_| StorageError::Read {
            message: "memory storage lock poisoned".to_string(),
        })?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::Write {
            message: "memory storage lock poisoned".to_string(),
        })?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::Write {
            message: "memory storage lock poisoned".to_string(),
        })?;
        items.remove(key);
        Ok(())
    }
}

/// JSON object on disk, rewritten whole on every mutation.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_items(&self) -> Result<BTreeMap<String, String>, StorageError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(BTreeMap::new());
            }
            Err(error) => {
                return Err(StorageError::Read {
                    message: format!("{}: {error}", self.path.display()),
                });
            }
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|error| StorageError::Decode {
            message: format!("{}: {error}", self.path.display()),
        })
    }

    fn write_items(&self, items: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let write_error = |error: std::io::Error| StorageError::Write {
            message: format!("{}: {error}", self.path.display()),
        };
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty())
        {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }
        let serialized = serde_json::to_string_pretty(items).map_err(|error| {
            StorageError::Write {
                message: format!("failed to serialize session storage: {error}"),
            }
        })?;
        let staging = self.path.with_extension("tmp");
        std::fs::write(&staging, serialized).map_err(write_error)?;
        std::fs::rename(&staging, &self.path).map_err(write_error)
    }

    fn mutate(
        &self,
        apply: impl FnOnce(&mut BTreeMap<String, String>),
    ) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut items = self.read_items()?;
        apply(&mut items);
        self.write_items(&items)
    }
}

impl SessionStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(self.read_items()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.mutate(|items| {
            items.insert(key.to_string(), value.to_string());
        })
    }

    /// An undecodable file is replaced by the remaining (empty) map so that
    /// sign-out can always clear it.
    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut items = match self.read_items() {
            Ok(items) => items,
            Err(StorageError::Decode { message }) => {
                tracing::warn!(%message, "discarding undecodable session file");
                BTreeMap::new()
            }
            Err(error) => return Err(error),
        };
        items.remove(key);
        self.write_items(&items)
    }
}
