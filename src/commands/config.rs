use std::sync::Arc;

use anyhow::Result;
use log::debug;

use crate::config::{ConfigOptions, UpdateConfig};
use crate::domain::model::InstalledVersion;
use crate::platform::{BuildPackageInfo, installed_version};
use crate::runtime::{RealRuntime, Runtime};

fn load_config(options: ConfigOptions) -> Result<UpdateConfig<RealRuntime>> {
    UpdateConfig::load(Arc::new(RealRuntime), options)
}

fn render<R: Runtime>(config: &UpdateConfig<R>, installed: &InstalledVersion) -> String {
    let api_url = config.api_url();
    let api_url = if api_url.is_empty() {
        "(not configured)"
    } else {
        api_url.as_str()
    };
    [
        format!("API URL: {}", api_url),
        format!("Preferences: {}", config.prefs_path().display()),
        format!("Download directory: {}", config.download_dir().display()),
        format!("Platform: {}", config.platform()),
        format!("Application: {}", config.application_id()),
        format!("Installed: {} (build {})", installed.name, installed.code),
    ]
    .join("\n")
}

/// Print the effective configuration
#[tracing::instrument(skip(options))]
pub fn show_config(options: ConfigOptions) -> Result<()> {
    let config = load_config(options)?;
    println!("{}", render(&config, &installed_version(&BuildPackageInfo)));
    Ok(())
}

/// Persist a new API base URL
#[tracing::instrument(skip(options))]
pub fn set_api_url(options: ConfigOptions, url: &str) -> Result<()> {
    let config = load_config(options)?;
    config.set_api_url(url)?;
    debug!("Preferences written to {:?}", config.prefs_path());

    println!("API URL set to {}", config.api_url());
    Ok(())
}
