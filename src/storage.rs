use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Context, Result};
use serde_json::Value;

/// Key/value persistence offered by the host for the lifetime of a model.
pub trait ModelStorage {
    fn json_set(&self, key: &str, value: &Value) -> Result<()>;
    fn json_get(&self, key: &str) -> Result<Option<Value>>;
}

impl<T: ModelStorage + ?Sized> ModelStorage for &T {
    fn json_set(&self, key: &str, value: &Value) -> Result<()> {
        (**self).json_set(key, value)
    }

    fn json_get(&self, key: &str) -> Result<Option<Value>> {
        (**self).json_get(key)
    }
}

impl<T: ModelStorage + ?Sized> ModelStorage for Arc<T> {
    fn json_set(&self, key: &str, value: &Value) -> Result<()> {
        (**self).json_set(key, value)
    }

    fn json_get(&self, key: &str) -> Result<Option<Value>> {
        (**self).json_get(key)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: RwLock<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModelStorage for MemoryStorage {
    fn json_set(&self, key: &str, value: &Value) -> Result<()> {
        self.values
            .write()
            .map_err(|_| anyhow!("Storage lock poisoned"))?
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    fn json_get(&self, key: &str) -> Result<Option<Value>> {
        let values = self
            .values
            .read()
            .map_err(|_| anyhow!("Storage lock poisoned"))?;
        Ok(values.get(key).cloned())
    }
}

/// Stores every key as `<key>.json` inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            anyhow::bail!("Invalid storage key: {key:?}");
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

impl ModelStorage for FileStorage {
    #[tracing::instrument(level = "debug", skip(self, value))]
    fn json_set(&self, key: &str, value: &Value) -> Result<()> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("Failed to create storage directory {}", self.root.display()))?;
        let content = serde_json::to_string_pretty(value)?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    fn json_get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let value = serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?;
        Ok(Some(value))
    }
}
