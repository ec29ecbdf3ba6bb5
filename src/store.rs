//! Persistent key-value settings storage.
//!
//! Settings are string-keyed and JSON-valued. [`Configuration`] reads every
//! key once at startup and writes keys one at a time on an explicit save, so
//! the store only needs `get` and `set`.
//!
//! [`Configuration`]: crate::config::Configuration

use crate::error::Page2AnkiError;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// String-keyed, JSON-valued settings storage.
pub trait ConfigStore {
    /// Return the stored value for `key`, if any.
    fn get(&self, key: &str) -> Option<Value>;

    /// Persist `value` under `key`.
    fn set(&mut self, key: &str, value: Value) -> Result<(), Page2AnkiError>;
}

/// In-memory store. Nothing survives the process.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys written so far.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ConfigStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), Page2AnkiError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

/// Settings kept as a single JSON object on disk.
///
/// Every `set` rewrites the file through a temp file in the same directory
/// followed by a rename, so a crash never leaves a half-written file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: Map<String, Value>,
}

impl JsonFileStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Page2AnkiError> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => Map::new(),
            Ok(text) => match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    return Err(Page2AnkiError::ConfigStore {
                        path,
                        reason: "top-level value is not a JSON object".into(),
                    })
                }
                Err(e) => {
                    return Err(Page2AnkiError::ConfigStore {
                        path,
                        reason: e.to_string(),
                    })
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => {
                return Err(Page2AnkiError::ConfigStore {
                    path,
                    reason: e.to_string(),
                })
            }
        };
        debug!("Opened settings store {} ({} keys)", path.display(), values.len());
        Ok(Self { path, values })
    }

    /// `<config_dir>/page2anki/settings.json`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("page2anki").join("settings.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &Map<String, Value>) -> Result<(), Page2AnkiError> {
        let fail = |reason: String| Page2AnkiError::ConfigStore {
            path: self.path.clone(),
            reason,
        };

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| fail(e.to_string()))?;

        let body = serde_json::to_vec_pretty(values).map_err(|e| fail(e.to_string()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| fail(e.to_string()))?;
        tmp.write_all(&body).map_err(|e| fail(e.to_string()))?;
        tmp.persist(&self.path)
            .map_err(|e| fail(e.error.to_string()))?;
        Ok(())
    }
}

impl ConfigStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), Page2AnkiError> {
        // Only a write that reached disk changes what `get` returns.
        let mut next = self.values.clone();
        next.insert(key.to_string(), value);
        self.persist(&next)?;
        self.values = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn memory_store_get_set() {
        let mut store = MemoryStore::new();
        assert!(store.get("serviceHost").is_none());
        store.set("serviceHost", json!("127.0.0.1")).unwrap();
        assert_eq!(store.get("serviceHost"), Some(json!("127.0.0.1")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("settings.json")).unwrap();
        assert!(store.get("servicePort").is_none());
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut store = JsonFileStore::open(&path).unwrap();
        store.set("servicePort", json!(8766)).unwrap();
        store.set("allowDuplicates", json!(false)).unwrap();

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get("servicePort"), Some(json!(8766)));
        assert_eq!(reopened.get("allowDuplicates"), Some(json!(false)));
    }

    #[test]
    fn failed_write_leaves_store_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("settings.json");
        let mut store = JsonFileStore::open(&path).unwrap();
        store.set("deckName", json!("Geo")).unwrap();

        // Replace the settings directory with a plain file so the next write fails.
        std::fs::remove_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub"), "").unwrap();

        let err = store.set("deckName", json!("History")).unwrap_err();
        assert!(matches!(err, Page2AnkiError::ConfigStore { .. }));
        assert_eq!(store.get("deckName"), Some(json!("Geo")));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = JsonFileStore::open(&path).unwrap_err();
        assert!(matches!(err, Page2AnkiError::ConfigStore { .. }));
    }

    #[test]
    fn non_object_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(JsonFileStore::open(&path).is_err());
    }
}
