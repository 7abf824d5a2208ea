//! Client-side identity blobs.
//!
//! The logged-in user is remembered as a handful of string keys, some of
//! them JSON blobs carrying an `expiresAt` timestamp in epoch milliseconds.
//! Expired blobs are cleared the first time they are read.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::models::lenient;

pub const USER_ID_KEY: &str = "userId";
pub const AUTH_DATA_KEY: &str = "authData";
pub const DONOR_ID_KEY: &str = "donorId";
pub const NGO_ID_KEY: &str = "ngoId";
pub const TOKEN_KEY: &str = "token";

/// A string key/value store with the semantics of browser local storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

/// Keys persisted as a pretty-printed JSON object in a single file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let text = fs::read_to_string(&self.path)?;
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(entries)?)?;
        Ok(())
    }

    /// Like `load`, but logs the failure. Callers must not save over a file
    /// they could not read.
    fn load_for_write(&self) -> Result<BTreeMap<String, String>> {
        self.load().map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "refusing to overwrite unreadable identity storage");
            e
        })
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        match self.load() {
            Ok(entries) => entries.get(key).cloned(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "unreadable identity storage");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.load_for_write()?;
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.load_for_write()?;
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}

/// Who the user is, according to the blobs in a [`KeyValueStore`].
#[derive(Clone)]
pub struct IdentityStorage {
    store: Arc<dyn KeyValueStore>,
}

/// What `remember_login` writes.
#[derive(Debug, Clone)]
pub struct Login {
    pub user_id: String,
    pub user_type: String,
    pub donor_id: Option<i64>,
    pub ngo_id: Option<i64>,
    pub token: Option<String>,
    pub ttl: Duration,
}

impl IdentityStorage {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileStore::new(path)))
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    pub fn user_id(&self) -> Option<String> {
        self.user_id_at(Utc::now().timestamp_millis())
    }

    /// The stored user id as of `now_ms`. An expired blob clears the user,
    /// auth and donor keys. A value that is not JSON is used as-is unless
    /// it looks like a broken object.
    pub fn user_id_at(&self, now_ms: i64) -> Option<String> {
        let Some(raw) = self.store.get(USER_ID_KEY) else {
            debug!("no userId in storage");
            return None;
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(blob)) => {
                if is_expired(&blob, now_ms) {
                    info!("stored userId has expired, clearing identity");
                    self.remove_keys(&[USER_ID_KEY, AUTH_DATA_KEY, DONOR_ID_KEY]);
                    return None;
                }
                blob.get("userId").and_then(scalar_to_string)
            }
            Ok(other) => scalar_to_string(&other),
            Err(_) => raw_fallback(raw),
        }
    }

    pub fn donor_id(&self) -> Option<i64> {
        self.donor_id_at(Utc::now().timestamp_millis())
    }

    /// Like [`user_id_at`](Self::user_id_at) for `donorId`; expiry only
    /// clears the donor key.
    pub fn donor_id_at(&self, now_ms: i64) -> Option<i64> {
        let raw = self.store.get(DONOR_ID_KEY)?;
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(blob)) => {
                if is_expired(&blob, now_ms) {
                    info!("stored donorId has expired, clearing it");
                    self.remove_keys(&[DONOR_ID_KEY]);
                    return None;
                }
                blob.get("donorId").and_then(lenient::value_as_i64)
            }
            Ok(other) => lenient::value_as_i64(&other),
            Err(_) => raw_fallback(raw).and_then(|s| s.trim().parse().ok()),
        }
    }

    pub fn ngo_id(&self) -> Option<i64> {
        let raw = self.store.get(NGO_ID_KEY)?;
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(blob)) => blob.get("ngoId").and_then(lenient::value_as_i64),
            Ok(other) => lenient::value_as_i64(&other),
            Err(_) => raw.trim().parse().ok(),
        }
    }

    /// `authData.user.userId`.
    pub fn auth_user_id(&self) -> Option<String> {
        let raw = self.store.get(AUTH_DATA_KEY)?;
        let parsed: Value = match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "authData is not valid JSON");
                return None;
            }
        };
        scalar_to_string(&parsed["user"]["userId"])
    }

    pub fn token(&self) -> Option<String> {
        self.store.get(TOKEN_KEY)
    }

    pub fn remember_login(&self, login: &Login) -> Result<()> {
        let expires_at = (Utc::now() + login.ttl).timestamp_millis();
        self.store.set(
            USER_ID_KEY,
            &json!({ "userId": login.user_id, "expiresAt": expires_at }).to_string(),
        )?;
        self.store.set(
            AUTH_DATA_KEY,
            &json!({
                "user": { "userId": login.user_id, "userType": login.user_type },
                "token": login.token,
            })
            .to_string(),
        )?;
        if let Some(donor_id) = login.donor_id {
            self.store.set(
                DONOR_ID_KEY,
                &json!({ "donorId": donor_id, "expiresAt": expires_at }).to_string(),
            )?;
        }
        if let Some(ngo_id) = login.ngo_id {
            self.store
                .set(NGO_ID_KEY, &json!({ "ngoId": ngo_id }).to_string())?;
        }
        if let Some(token) = &login.token {
            self.store.set(TOKEN_KEY, token)?;
        }
        info!(user_id = %login.user_id, user_type = %login.user_type, "identity stored");
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        for key in [USER_ID_KEY, AUTH_DATA_KEY, DONOR_ID_KEY, NGO_ID_KEY, TOKEN_KEY] {
            self.store.remove(key)?;
        }
        Ok(())
    }

    fn remove_keys(&self, keys: &[&str]) {
        for key in keys {
            if let Err(e) = self.store.remove(key) {
                warn!(key, error = %e, "failed to clear identity key");
            }
        }
    }
}

fn is_expired(blob: &serde_json::Map<String, Value>, now_ms: i64) -> bool {
    blob.get("expiresAt")
        .and_then(lenient::value_as_i64)
        .is_some_and(|expires_at| now_ms > expires_at)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn raw_fallback(raw: String) -> Option<String> {
    (!raw.is_empty() && !raw.starts_with('{')).then_some(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage_with(entries: &[(&str, &str)]) -> IdentityStorage {
        let storage = IdentityStorage::in_memory();
        for (k, v) in entries {
            storage.store().set(k, v).unwrap();
        }
        storage
    }

    #[test]
    fn missing_user_id_is_none() {
        assert_eq!(IdentityStorage::in_memory().user_id(), None);
    }

    #[test]
    fn live_blob_yields_user_id() {
        let storage = storage_with(&[(USER_ID_KEY, r#"{"userId":42,"expiresAt":2000}"#)]);
        assert_eq!(storage.user_id_at(1000).as_deref(), Some("42"));
    }

    #[test]
    fn expired_blob_clears_identity() {
        let storage = storage_with(&[
            (USER_ID_KEY, r#"{"userId":"42","expiresAt":1000}"#),
            (AUTH_DATA_KEY, r#"{"user":{"userId":42}}"#),
            (DONOR_ID_KEY, r#"{"donorId":7}"#),
            (NGO_ID_KEY, "3"),
        ]);
        assert_eq!(storage.user_id_at(1001), None);
        assert_eq!(storage.store().get(USER_ID_KEY), None);
        assert_eq!(storage.store().get(AUTH_DATA_KEY), None);
        assert_eq!(storage.store().get(DONOR_ID_KEY), None);
        // Only the three user keys are cleared.
        assert_eq!(storage.ngo_id(), Some(3));
    }

    #[test]
    fn legacy_plain_value_is_used_directly() {
        let storage = storage_with(&[(USER_ID_KEY, "user-abc")]);
        assert_eq!(storage.user_id().as_deref(), Some("user-abc"));

        let broken = storage_with(&[(USER_ID_KEY, "{not json")]);
        assert_eq!(broken.user_id(), None);
    }

    #[test]
    fn donor_id_expiry_only_clears_donor_key() {
        let storage = storage_with(&[
            (USER_ID_KEY, r#"{"userId":"1"}"#),
            (DONOR_ID_KEY, r#"{"donorId":"8","expiresAt":10}"#),
        ]);
        assert_eq!(storage.donor_id_at(5), Some(8));
        assert_eq!(storage.donor_id_at(11), None);
        assert_eq!(storage.store().get(DONOR_ID_KEY), None);
        assert_eq!(storage.user_id().as_deref(), Some("1"));
    }

    #[test]
    fn auth_user_id_reads_nested_user() {
        let storage = storage_with(&[(AUTH_DATA_KEY, r#"{"user":{"userId":17,"userType":"NGO"}}"#)]);
        assert_eq!(storage.auth_user_id().as_deref(), Some("17"));
    }

    #[test]
    fn remember_login_then_clear() {
        let storage = IdentityStorage::in_memory();
        storage
            .remember_login(&Login {
                user_id: "5".into(),
                user_type: "DONOR".into(),
                donor_id: Some(11),
                ngo_id: None,
                token: Some("t0k".into()),
                ttl: Duration::hours(1),
            })
            .unwrap();
        assert_eq!(storage.user_id().as_deref(), Some("5"));
        assert_eq!(storage.donor_id(), Some(11));
        assert_eq!(storage.auth_user_id().as_deref(), Some("5"));
        assert_eq!(storage.token().as_deref(), Some("t0k"));

        storage.clear().unwrap();
        assert_eq!(storage.user_id(), None);
        assert_eq!(storage.token(), None);
    }

    #[test]
    fn corrupt_file_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.json");
        fs::write(&path, "{ not json").unwrap();

        let store = FileStore::new(&path);
        assert_eq!(store.get(USER_ID_KEY), None);
        assert!(store.set(USER_ID_KEY, "u1").is_err());
        assert!(store.remove(USER_ID_KEY).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
    }
}
