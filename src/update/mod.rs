//! The self-update engine.
//!
//! [`UpdateManager`] combines the version checker and the download
//! coordinator behind one observable [`UpdateState`]:
//!
//! ```text
//! Idle -> Checking -> UpToDate | Available | Error
//! Available -> Downloading(0..=100) -> ReadyToInstall | Error
//! any -> reset / cancel -> Idle
//! ```

mod checker;
mod coordinator;
mod error;
mod format;
mod state;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;

use crate::config::UpdateConfig;
use crate::domain::model::{RemoteVersionInfo, UpdateState};
use crate::http::HttpClient;
use crate::platform::{DownloadService, FileProvider, Installer, PackageInfoProvider};
use crate::runtime::Runtime;

pub use checker::{VERSION_PATH, VersionChecker};
pub use coordinator::{DownloadCoordinator, POLL_INTERVAL};
pub use error::UpdateError;
pub use format::format_file_size;
pub use state::StateMachine;

/// Long-lived owner of the update state.
///
/// Construct once at start-up and pass it to whoever needs it. All
/// operations report through the state; none of them fail.
pub struct UpdateManager<R, D, I, P>
where
    R: Runtime,
    D: DownloadService,
    I: Installer,
    P: PackageInfoProvider,
{
    config: UpdateConfig<R>,
    state: StateMachine,
    checker: VersionChecker<P>,
    coordinator: DownloadCoordinator<R, D, I>,
}

impl<R, D, I, P> UpdateManager<R, D, I, P>
where
    R: Runtime + 'static,
    D: DownloadService + 'static,
    I: Installer,
    P: PackageInfoProvider,
{
    pub fn new(
        runtime: Arc<R>,
        config: UpdateConfig<R>,
        http: HttpClient,
        downloads: Arc<D>,
        installer: I,
        package_info: P,
    ) -> Self {
        let file_provider = FileProvider::for_application(
            config.application_id(),
            config.download_dir().to_path_buf(),
        );
        let checker = VersionChecker::new(http, package_info, config.platform());
        let coordinator = DownloadCoordinator::new(
            runtime,
            downloads,
            installer,
            file_provider,
            config.download_dir().to_path_buf(),
            config.artifact_prefix(),
        );

        Self {
            config,
            state: StateMachine::new(),
            checker,
            coordinator,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.coordinator = self.coordinator.with_poll_interval(interval);
        self
    }

    /// Observe the update state.
    pub fn subscribe(&self) -> watch::Receiver<UpdateState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> UpdateState {
        self.state.current()
    }

    pub fn config(&self) -> &UpdateConfig<R> {
        &self.config
    }

    pub fn api_url(&self) -> String {
        self.config.api_url()
    }

    /// Change and persist the API base URL.
    pub fn set_api_url(&self, url: &str) -> Result<()> {
        self.config.set_api_url(url)
    }

    pub fn current_version_name(&self) -> String {
        self.checker.installed().name
    }

    pub fn current_version_code(&self) -> i64 {
        self.checker.installed().code
    }

    /// Check the server for a newer build. Returns the resulting state.
    pub async fn check_for_update(&self) -> UpdateState {
        let api_url = self.config.api_url();
        self.checker.check(&api_url, &self.state).await
    }

    /// Start downloading `info` in the background.
    pub fn download_update(&self, info: RemoteVersionInfo) {
        let api_url = self.config.api_url();
        self.coordinator.start(&api_url, info, &self.state);
    }

    /// Launch the installer for a downloaded artifact.
    pub fn install_update(&self, file_path: &Path) {
        self.coordinator.install(file_path, &self.state);
    }

    pub fn cancel_download(&self) {
        self.coordinator.cancel(&self.state);
    }

    pub fn reset_state(&self) {
        self.state.publish(UpdateState::Idle);
    }
}
