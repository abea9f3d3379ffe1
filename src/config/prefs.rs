//! Small persistent key-value store backed by a JSON file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::runtime::Runtime;

pub struct PreferenceStore<R: Runtime> {
    runtime: Arc<R>,
    path: PathBuf,
}

impl<R: Runtime> PreferenceStore<R> {
    pub fn new(runtime: Arc<R>, path: PathBuf) -> Self {
        Self { runtime, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every stored preference. A missing file is an empty store.
    pub fn load(&self) -> Result<BTreeMap<String, String>> {
        if !self.runtime.exists(&self.path) {
            return Ok(BTreeMap::new());
        }
        let content = self
            .runtime
            .read_to_string(&self.path)
            .with_context(|| format!("Failed to read preferences from {:?}", self.path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse preferences at {:?}", self.path))
    }

    pub fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load()?.remove(key))
    }

    /// Store `value` under `key`, keeping every other entry.
    ///
    /// An unreadable file is replaced rather than blocking the write.
    pub fn put_string(&self, key: &str, value: &str) -> Result<()> {
        let mut prefs = self.load().unwrap_or_default();
        prefs.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent()
            && !self.runtime.exists(parent)
        {
            self.runtime.create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(&prefs)?;
        self.runtime
            .write(&self.path, content.as_bytes())
            .with_context(|| format!("Failed to save preferences to {:?}", self.path))
    }
}
