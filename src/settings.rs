//! Per-user key-value settings in a JSON file
//!
//! Reads never fail: a missing or corrupt file is an empty map. Write
//! failures are logged and dropped.

use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Setting holding the preferred model name
pub const MODEL_KEY: &str = "model";
/// Setting holding the last selected project directory
pub const PROJECT_DIR_KEY: &str = "projectDir";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Settings I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Settings file is not a JSON object: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct SettingsStore {
    path: PathBuf,
    // Serializes read-modify-write cycles
    write_lock: Arc<Mutex<()>>,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.load_all().remove(key).filter(|v| !v.is_null())
    }

    /// String-valued setting, ignoring values of other types
    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    pub fn set(&self, key: &str, value: Value) {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut all = self.load_all();
        all.insert(key.to_string(), value);
        if let Err(e) = self.save_all(&all) {
            tracing::warn!(path = %self.path.display(), key, error = %e, "Failed to write settings");
        }
    }

    fn load_all(&self) -> Map<String, Value> {
        match self.try_load_all() {
            Ok(map) => map,
            Err(SettingsError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Ignoring unreadable settings");
                Map::new()
            }
        }
    }

    fn try_load_all(&self) -> Result<Map<String, Value>, SettingsError> {
        let raw = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn save_all(&self, all: &Map<String, Value>) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(all)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));
        assert_eq!(store.get(MODEL_KEY), None);
    }

    #[test]
    fn test_set_then_get_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        SettingsStore::new(&path).set(PROJECT_DIR_KEY, json!("/repo"));
        SettingsStore::new(&path).set(MODEL_KEY, json!("opus"));

        let reopened = SettingsStore::new(&path);
        assert_eq!(reopened.get_string(PROJECT_DIR_KEY).as_deref(), Some("/repo"));
        assert_eq!(reopened.get(MODEL_KEY), Some(json!("opus")));
    }

    #[test]
    fn test_corrupt_file_reads_empty_and_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = SettingsStore::new(&path);
        assert_eq!(store.get(MODEL_KEY), None);

        store.set(MODEL_KEY, json!("haiku"));
        assert_eq!(store.get_string(MODEL_KEY).as_deref(), Some("haiku"));
    }

    #[test]
    fn test_null_and_non_string_values() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));
        store.set(MODEL_KEY, Value::Null);
        assert_eq!(store.get(MODEL_KEY), None);

        store.set(MODEL_KEY, json!(3));
        assert_eq!(store.get(MODEL_KEY), Some(json!(3)));
        assert_eq!(store.get_string(MODEL_KEY), None);
    }
}
