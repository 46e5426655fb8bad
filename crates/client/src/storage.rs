//! Client-side session persistence.
//!
//! A single process-wide slot of string keys, mirroring what a browser keeps
//! in local storage. Values are JSON-encoded by [`SessionStore`].

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;
use serde::de::DeserializeOwned;

use vendorportal_auth::{EmployeePermissions, UserProfile};

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";
pub const PERMISSIONS_KEY: &str = "employee_permissions";

const SESSION_FILE: &str = "session.json";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("corrupt value under '{key}': {message}")]
    Corrupt { key: String, message: String },

    #[error("storage lock poisoned")]
    Poisoned,
}

pub type StorageResult<T> = Result<T, StorageError>;

/// String key/value slot backing the session.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    fn set(&self, key: &str, value: String) -> StorageResult<()>;
    /// Remove `key`, returning the value it held.
    fn remove(&self, key: &str) -> StorageResult<Option<String>>;
    /// Remove `key` only while it still holds `expected`.
    fn remove_if(&self, key: &str, expected: &str) -> StorageResult<bool>;
}

impl<S> KeyValueStore for Arc<S>
where
    S: KeyValueStore + ?Sized,
{
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: String) -> StorageResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<Option<String>> {
        (**self).remove(key)
    }

    fn remove_if(&self, key: &str, expected: &str) -> StorageResult<bool> {
        (**self).remove_if(key, expected)
    }
}

/// In-memory store for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<HashMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let map = self.inner.read().map_err(|_| StorageError::Poisoned)?;
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> StorageResult<()> {
        let mut map = self.inner.write().map_err(|_| StorageError::Poisoned)?;
        map.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<Option<String>> {
        let mut map = self.inner.write().map_err(|_| StorageError::Poisoned)?;
        Ok(map.remove(key))
    }

    fn remove_if(&self, key: &str, expected: &str) -> StorageResult<bool> {
        let mut map = self.inner.write().map_err(|_| StorageError::Poisoned)?;
        if map.get(key).is_some_and(|v| v == expected) {
            map.remove(key);
            return Ok(true);
        }
        Ok(false)
    }
}

/// File-backed store: one JSON object in `<dir>/session.json`.
///
/// Every write replaces the file through a temp file and a rename, so a reader
/// never sees a half-written session. Two processes sharing the directory get
/// last-write-wins.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    inner: Mutex<HashMap<String, String>>,
}

impl FileStore {
    pub fn open(dir: impl AsRef<Path>) -> StorageResult<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(SESSION_FILE);

        let map = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<HashMap<String, String>>(&bytes) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "discarding unreadable session file");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            inner: Mutex::new(map),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, map: &HashMap<String, String>) -> StorageResult<()> {
        let bytes = serde_json::to_vec_pretty(map).map_err(|e| StorageError::Corrupt {
            key: SESSION_FILE.to_string(),
            message: e.to_string(),
        })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let map = self.inner.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> StorageResult<()> {
        let mut map = self.inner.lock().map_err(|_| StorageError::Poisoned)?;
        map.insert(key.to_string(), value);
        self.flush(&map)
    }

    fn remove(&self, key: &str) -> StorageResult<Option<String>> {
        let mut map = self.inner.lock().map_err(|_| StorageError::Poisoned)?;
        let previous = map.remove(key);
        if previous.is_some() {
            self.flush(&map)?;
        }
        Ok(previous)
    }

    fn remove_if(&self, key: &str, expected: &str) -> StorageResult<bool> {
        let mut map = self.inner.lock().map_err(|_| StorageError::Poisoned)?;
        if map.get(key).is_none_or(|v| v != expected) {
            return Ok(false);
        }
        map.remove(key);
        self.flush(&map)?;
        Ok(true)
    }
}

/// Typed view over the three session keys.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(InMemoryStore::new())
    }

    pub fn token(&self) -> StorageResult<Option<String>> {
        self.inner.get(TOKEN_KEY)
    }

    pub fn save_token(&self, token: &str) -> StorageResult<()> {
        self.inner.set(TOKEN_KEY, token.to_string())
    }

    pub fn profile(&self) -> StorageResult<Option<UserProfile>> {
        self.read_json(USER_KEY)
    }

    pub fn save_profile(&self, profile: &UserProfile) -> StorageResult<()> {
        self.write_json(USER_KEY, profile)
    }

    pub fn permissions(&self) -> StorageResult<Option<EmployeePermissions>> {
        self.read_json(PERMISSIONS_KEY)
    }

    pub fn save_permissions(&self, permissions: &EmployeePermissions) -> StorageResult<()> {
        self.write_json(PERMISSIONS_KEY, permissions)
    }

    /// Remove token, profile and permissions together.
    ///
    /// Returns `true` only for the caller that actually removed the token, so
    /// concurrent clears report success exactly once.
    pub fn clear(&self) -> StorageResult<bool> {
        let removed = self.inner.remove(TOKEN_KEY)?.is_some();
        self.clear_identity()?;
        Ok(removed)
    }

    /// Like [`clear`](Self::clear), but only while `token` is still the stored
    /// one. A newer session is left untouched.
    pub fn clear_if_token(&self, token: &str) -> StorageResult<bool> {
        let removed = self.inner.remove_if(TOKEN_KEY, token)?;
        if removed {
            self.clear_identity()?;
        }
        Ok(removed)
    }

    fn clear_identity(&self) -> StorageResult<()> {
        self.inner.remove(USER_KEY)?;
        self.inner.remove(PERMISSIONS_KEY)?;
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        match self.inner.get(key)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| StorageError::Corrupt {
                    key: key.to_string(),
                    message: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    fn write_json<T: Serialize>(&self, key: &str, value: &T) -> StorageResult<()> {
        let raw = serde_json::to_string(value).map_err(|e| StorageError::Corrupt {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        self.inner.set(key, raw)
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vendorportal_auth::AccountRole;
    use vendorportal_core::UserId;

    fn profile() -> UserProfile {
        UserProfile {
            user_id: UserId::new(7),
            username: "acme_admin".into(),
            email: Some("admin@acme.test".into()),
            first_name: None,
            last_name: None,
            role: AccountRole::Vendor,
            vendor_id: None,
            disabled: None,
        }
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("vendorportal-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn clear_reports_removal_once() {
        let store = SessionStore::in_memory();
        store.save_token("abc").unwrap();
        store.save_profile(&profile()).unwrap();

        assert!(store.clear().unwrap());
        assert!(!store.clear().unwrap());
        assert_eq!(store.token().unwrap(), None);
        assert_eq!(store.profile().unwrap(), None);
    }

    #[test]
    fn stale_token_does_not_clear_newer_session() {
        let store = SessionStore::in_memory();
        store.save_token("new").unwrap();
        store.save_profile(&profile()).unwrap();

        assert!(!store.clear_if_token("old").unwrap());
        assert_eq!(store.token().unwrap().as_deref(), Some("new"));
        assert_eq!(store.profile().unwrap(), Some(profile()));

        assert!(store.clear_if_token("new").unwrap());
        assert!(!store.clear_if_token("new").unwrap());
        assert_eq!(store.profile().unwrap(), None);
    }

    #[test]
    fn file_store_compare_and_remove() {
        let dir = temp_dir("remove-if");
        let store = FileStore::open(&dir).unwrap();
        store.set(TOKEN_KEY, "tok".into()).unwrap();

        assert!(!store.remove_if(TOKEN_KEY, "other").unwrap());
        assert!(store.remove_if(TOKEN_KEY, "tok").unwrap());
        assert_eq!(FileStore::open(&dir).unwrap().get(TOKEN_KEY).unwrap(), None);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_json_is_reported() {
        let raw = Arc::new(InMemoryStore::new());
        raw.set(USER_KEY, "{not json".into()).unwrap();
        let store = SessionStore::new(raw);

        assert!(matches!(store.profile(), Err(StorageError::Corrupt { .. })));
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = temp_dir("reopen");
        {
            let store = SessionStore::new(FileStore::open(&dir).unwrap());
            store.save_token("tok").unwrap();
            store.save_profile(&profile()).unwrap();
        }

        let reopened = SessionStore::new(FileStore::open(&dir).unwrap());
        assert_eq!(reopened.token().unwrap().as_deref(), Some("tok"));
        assert_eq!(reopened.profile().unwrap(), Some(profile()));

        assert!(reopened.clear().unwrap());
        let after_clear = SessionStore::new(FileStore::open(&dir).unwrap());
        assert_eq!(after_clear.token().unwrap(), None);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn unreadable_session_file_starts_empty() {
        let dir = temp_dir("garbage");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(SESSION_FILE), b"\x00garbage").unwrap();

        let store = FileStore::open(&dir).unwrap();
        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);

        let _ = fs::remove_dir_all(&dir);
    }
}
