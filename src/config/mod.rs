//! Update engine configuration.
//!
//! The API base URL is the only mutable setting: it is loaded from the
//! preference store at start-up and persisted again whenever it changes.
//! Everything else is fixed for the lifetime of the process.

mod prefs;

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::{Context, Result};
use log::{debug, warn};

use crate::runtime::Runtime;

pub use prefs::PreferenceStore;

/// API used when nothing was saved yet.
pub const DEFAULT_API_URL: &str = "https://api.secuops.secuaas.dev";

/// Preference file, kept apart from any other application preferences.
pub const PREFS_FILE: &str = "update_manager_prefs.json";

pub const PREF_API_URL: &str = "api_url";

/// Manifest key of the builds this client installs.
pub const DEFAULT_PLATFORM: &str = "android";

pub const DEFAULT_APPLICATION_ID: &str = "com.secuaas.secuops";

/// Downloaded artifacts are named `<prefix><version>.<extension>`.
pub const DEFAULT_ARTIFACT_PREFIX: &str = "secuops-android-v";
pub const ARTIFACT_EXTENSION: &str = "apk";

const APP_DIR_NAME: &str = "secuops";

/// Overrides applied on top of the defaults when loading a configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    pub config_dir: Option<PathBuf>,
    pub download_dir: Option<PathBuf>,
    /// Session-only API URL; not written to the preference store
    pub api_url: Option<String>,
    pub platform: Option<String>,
}

pub struct UpdateConfig<R: Runtime> {
    prefs: PreferenceStore<R>,
    api_url: RwLock<String>,
    platform: String,
    application_id: String,
    artifact_prefix: String,
    download_dir: PathBuf,
}

impl<R: Runtime> UpdateConfig<R> {
    /// Load the configuration, reading the saved API URL from the preference store.
    ///
    /// An unreadable preference file is not fatal: the default URL is used instead.
    #[tracing::instrument(skip(runtime, options))]
    pub fn load(runtime: Arc<R>, options: ConfigOptions) -> Result<Self> {
        let config_dir = match options.config_dir {
            Some(dir) => dir,
            None => default_config_dir(runtime.as_ref())?,
        };
        let download_dir = match options.download_dir {
            Some(dir) => dir,
            None => default_download_dir(runtime.as_ref())?,
        };

        let prefs = PreferenceStore::new(runtime, config_dir.join(PREFS_FILE));

        let api_url = match options.api_url {
            Some(url) => normalize_api_url(&url),
            None => match prefs.get_string(PREF_API_URL) {
                Ok(saved) => saved.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
                Err(e) => {
                    warn!("Ignoring unreadable preferences: {:#}", e);
                    DEFAULT_API_URL.to_string()
                }
            },
        };
        if !api_url.is_empty() {
            debug!("Loaded API URL: {}", api_url);
        }

        Ok(Self {
            prefs,
            api_url: RwLock::new(api_url),
            platform: options
                .platform
                .unwrap_or_else(|| DEFAULT_PLATFORM.to_string()),
            application_id: DEFAULT_APPLICATION_ID.to_string(),
            artifact_prefix: DEFAULT_ARTIFACT_PREFIX.to_string(),
            download_dir,
        })
    }

    /// Current API base URL, without trailing slash. May be empty.
    pub fn api_url(&self) -> String {
        self.api_url
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Change the API base URL and persist it for future sessions.
    ///
    /// The in-memory value is updated even if persisting fails.
    #[tracing::instrument(skip(self))]
    pub fn set_api_url(&self, url: &str) -> Result<()> {
        let url = normalize_api_url(url);
        *self.api_url.write().unwrap_or_else(PoisonError::into_inner) = url.clone();
        self.prefs
            .put_string(PREF_API_URL, &url)
            .context("Failed to save API URL")?;
        debug!("Saved API URL: {}", url);
        Ok(())
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn application_id(&self) -> &str {
        &self.application_id
    }

    pub fn artifact_prefix(&self) -> &str {
        &self.artifact_prefix
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    pub fn prefs_path(&self) -> &Path {
        self.prefs.path()
    }
}

/// Trim trailing slashes (e.g., "https://api.example.com/" -> "https://api.example.com").
pub fn normalize_api_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Get the default configuration directory (e.g., ~/.config/secuops)
pub fn default_config_dir<R: Runtime + ?Sized>(runtime: &R) -> Result<PathBuf> {
    let dir = runtime
        .config_dir()
        .context("Could not find config directory")?;
    Ok(dir.join(APP_DIR_NAME))
}

/// Get the default download directory (e.g., ~/.local/share/secuops/downloads)
pub fn default_download_dir<R: Runtime + ?Sized>(runtime: &R) -> Result<PathBuf> {
    let dir = runtime
        .data_local_dir()
        .context("Could not find local data directory")?;
    Ok(dir.join(APP_DIR_NAME).join("downloads"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RealRuntime};
    use tempfile::tempdir;

    fn options_in(dir: &Path) -> ConfigOptions {
        ConfigOptions {
            config_dir: Some(dir.join("config")),
            download_dir: Some(dir.join("downloads")),
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_api_url() {
        assert_eq!(
            normalize_api_url("https://api.example.com/"),
            "https://api.example.com"
        );
        assert_eq!(
            normalize_api_url(" https://api.example.com// "),
            "https://api.example.com"
        );
        assert_eq!(normalize_api_url(""), "");
    }

    #[test]
    fn test_load_defaults_when_nothing_saved() {
        let dir = tempdir().unwrap();
        let config = UpdateConfig::load(Arc::new(RealRuntime), options_in(dir.path())).unwrap();

        assert_eq!(config.api_url(), DEFAULT_API_URL);
        assert_eq!(config.platform(), DEFAULT_PLATFORM);
        assert_eq!(config.application_id(), DEFAULT_APPLICATION_ID);
        assert_eq!(config.download_dir(), dir.path().join("downloads"));
    }

    #[test]
    fn test_set_api_url_survives_restart() {
        let dir = tempdir().unwrap();
        let config = UpdateConfig::load(Arc::new(RealRuntime), options_in(dir.path())).unwrap();

        config.set_api_url("https://staging.example.com/").unwrap();
        assert_eq!(config.api_url(), "https://staging.example.com");

        let reloaded =
            UpdateConfig::load(Arc::new(RealRuntime), options_in(dir.path())).unwrap();
        assert_eq!(reloaded.api_url(), "https://staging.example.com");
    }

    #[test]
    fn test_saved_empty_url_stays_empty() {
        let dir = tempdir().unwrap();
        let config = UpdateConfig::load(Arc::new(RealRuntime), options_in(dir.path())).unwrap();
        config.set_api_url("").unwrap();

        let reloaded =
            UpdateConfig::load(Arc::new(RealRuntime), options_in(dir.path())).unwrap();
        assert_eq!(reloaded.api_url(), "");
    }

    #[test]
    fn test_session_override_is_not_persisted() {
        let dir = tempdir().unwrap();
        let mut options = options_in(dir.path());
        options.api_url = Some("http://localhost:8080/".to_string());

        let config = UpdateConfig::load(Arc::new(RealRuntime), options).unwrap();
        assert_eq!(config.api_url(), "http://localhost:8080");
        assert!(!config.prefs_path().exists());
    }

    #[test]
    fn test_corrupt_preferences_fall_back_to_default() {
        let dir = tempdir().unwrap();
        let options = options_in(dir.path());
        let config_dir = options.config_dir.clone().unwrap();
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(config_dir.join(PREFS_FILE), "{not json").unwrap();

        let config = UpdateConfig::load(Arc::new(RealRuntime), options).unwrap();
        assert_eq!(config.api_url(), DEFAULT_API_URL);
    }

    #[test]
    fn test_default_dirs() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_config_dir()
            .returning(|| Some(PathBuf::from("/home/user/.config")));
        runtime
            .expect_data_local_dir()
            .returning(|| Some(PathBuf::from("/home/user/.local/share")));

        assert_eq!(
            default_config_dir(&runtime).unwrap(),
            PathBuf::from("/home/user/.config/secuops")
        );
        assert_eq!(
            default_download_dir(&runtime).unwrap(),
            PathBuf::from("/home/user/.local/share/secuops/downloads")
        );
    }

    #[test]
    fn test_default_dirs_missing() {
        let mut runtime = MockRuntime::new();
        runtime.expect_config_dir().returning(|| None);
        runtime.expect_data_local_dir().returning(|| None);

        assert!(default_config_dir(&runtime).is_err());
        assert!(default_download_dir(&runtime).is_err());
    }
}
