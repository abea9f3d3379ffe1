use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One platform build as published by `/api/version`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RemoteVersionInfo {
    /// Display version (e.g., "0.2.3")
    pub version: String,
    /// Build ordinal, the only key used to order releases
    pub version_code: i64,
    /// Path of the artifact, appended to the API base URL
    pub download_url: String,
    #[serde(default)]
    pub changelog: String,
    /// Artifact size in bytes
    #[serde(default)]
    pub file_size: u64,
    /// Oldest version code the server still supports. Carried, never consulted.
    #[serde(default)]
    pub min_version: i64,
}

impl RemoteVersionInfo {
    /// Whether this build is strictly newer than the given installed version code.
    pub fn is_newer_than(&self, installed_code: i64) -> bool {
        self.version_code > installed_code
    }
}

/// The `/api/version` envelope: one entry per platform.
///
/// Entries are kept as raw JSON so that a malformed entry for another
/// platform never breaks the lookup of ours.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(transparent)]
pub struct VersionManifest {
    entries: BTreeMap<String, serde_json::Value>,
}

impl VersionManifest {
    /// Parse a manifest from a response body.
    pub fn from_json(body: &str) -> Result<Self> {
        serde_json::from_str(body).context("Failed to parse version manifest")
    }

    /// Look up the build published for `platform`.
    ///
    /// Returns `Ok(None)` when the platform has no entry (or an explicit `null`).
    pub fn platform(&self, platform: &str) -> Result<Option<RemoteVersionInfo>> {
        match self.entries.get(platform) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .with_context(|| format!("Invalid '{}' entry in version manifest", platform)),
        }
    }
}

/// Version identity of the running application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledVersion {
    pub name: String,
    pub code: i64,
}

impl InstalledVersion {
    pub const UNKNOWN_NAME: &'static str = "Unknown";
}

impl Default for InstalledVersion {
    fn default() -> Self {
        Self {
            name: Self::UNKNOWN_NAME.to_string(),
            code: 0,
        }
    }
}
