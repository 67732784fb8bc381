//! Read-only access to user settings.
//!
//! Persistence belongs to the host application. The core only ever reads
//! [`SettingsKeys::COMPUTE_BACKEND`](crate::config::SettingsKeys), so the
//! collaborator interface is a single lookup.

use crate::error::{LeaxerError, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, warn};

/// Key-value settings lookup.
pub trait SettingsStore: Send + Sync {
    /// Return the value stored under `key`, or `None` when unset.
    fn get(&self, key: &str) -> Option<String>;
}

/// In-memory settings, for embedders that already hold the values.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<HashMap<String, String>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create settings holding a single entry.
    pub fn with(key: impl Into<String>, value: impl Into<String>) -> Self {
        let settings = Self::new();
        settings.set(key, value);
        settings
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        if let Ok(mut values) = self.values.write() {
            values.insert(key.into(), value.into());
        }
    }

    pub fn remove(&self, key: &str) {
        if let Ok(mut values) = self.values.write() {
            values.remove(key);
        }
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().ok()?.get(key).cloned()
    }
}

/// Settings loaded once from a flat JSON object file.
///
/// String values are taken verbatim; numbers and booleans are rendered with
/// their JSON text. Nested values are ignored.
#[derive(Debug)]
pub struct JsonSettingsFile {
    path: PathBuf,
    values: HashMap<String, String>,
}

impl JsonSettingsFile {
    /// Load settings from `path`. A missing file yields empty settings.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            debug!("Settings file {} not found, using defaults", path.display());
            return Ok(Self {
                path,
                values: HashMap::new(),
            });
        }

        let content =
            fs::read_to_string(&path).map_err(|e| LeaxerError::io_with_path(e, &path))?;
        let parsed: serde_json::Value = serde_json::from_str(&content)?;
        let object = parsed.as_object().ok_or_else(|| LeaxerError::Settings {
            message: format!("{} does not contain a JSON object", path.display()),
        })?;

        let mut values = HashMap::new();
        for (key, value) in object {
            match value {
                serde_json::Value::String(s) => {
                    values.insert(key.clone(), s.clone());
                }
                serde_json::Value::Number(_) | serde_json::Value::Bool(_) => {
                    values.insert(key.clone(), value.to_string());
                }
                serde_json::Value::Null => {}
                _ => warn!("Ignoring non-scalar setting {} in {}", key, path.display()),
            }
        }

        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonSettingsFile {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}
