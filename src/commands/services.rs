//! Service factory for the desktop update manager.
//!
//! Wires the update engine to the desktop implementations of the platform
//! services: `reqwest` transfers, the OS opener as installer and the
//! version baked in at build time.

use std::sync::Arc;

use anyhow::Result;
use log::debug;

use crate::config::{ConfigOptions, UpdateConfig};
use crate::http::HttpClient;
use crate::platform::{BuildPackageInfo, CommandInstaller, HttpDownloadService};
use crate::runtime::RealRuntime;
use crate::update::UpdateManager;

pub const USER_AGENT: &str = "secuops-update";

pub type DesktopManager =
    UpdateManager<RealRuntime, HttpDownloadService<RealRuntime>, CommandInstaller, BuildPackageInfo>;

/// Everything the commands need besides the configuration.
#[derive(Debug, Clone, Default)]
pub struct Services {
    pub options: ConfigOptions,
    /// Program used to open downloaded artifacts (defaults to the OS opener)
    pub installer: Option<String>,
}

/// Build the HTTP client shared by the checker and the download service
pub fn build_http_client() -> Result<HttpClient> {
    HttpClient::with_default_timeouts(USER_AGENT)
}

fn build_installer(program: Option<&str>) -> CommandInstaller {
    match program {
        Some(program) => {
            debug!("Using installer program '{}'", program);
            CommandInstaller::new(program, vec![])
        }
        None => CommandInstaller::default(),
    }
}

pub fn build_manager(services: Services) -> Result<DesktopManager> {
    let runtime = Arc::new(RealRuntime);
    let config = UpdateConfig::load(Arc::clone(&runtime), services.options)?;
    let http = build_http_client()?;
    let downloads = Arc::new(HttpDownloadService::new(http.clone(), Arc::clone(&runtime)));

    Ok(UpdateManager::new(
        runtime,
        config,
        http,
        downloads,
        build_installer(services.installer.as_deref()),
        BuildPackageInfo,
    ))
}
