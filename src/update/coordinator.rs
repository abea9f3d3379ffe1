//! Download coordination: artifact transfer, progress tracking and install launch.
//!
//! One coordinator task per download owns every state write past
//! `Downloading(0)`. It waits for the completion notification of the tracked
//! transfer while a separate poller queries the download facility and sends
//! progress to it over a channel. The poller only observes: it stops as soon
//! as the live state is no longer `Downloading` and never publishes itself.
//! A completion is honored whenever it belongs to the tracked transfer,
//! whatever the state has become in the meantime.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::config::ARTIFACT_EXTENSION;
use crate::domain::model::{DownloadId, RemoteVersionInfo, UpdateState};
use crate::platform::{
    DownloadRequest, DownloadService, DownloadStatus, FileProvider, InstallRequest, Installer,
    local_uri_to_path,
};
use crate::runtime::Runtime;

use super::error::UpdateError;
use super::state::StateMachine;

/// Interval between two progress queries.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

const DOWNLOAD_TITLE: &str = "SecuOps Update";

/// Handle of the transfer currently followed, shared with the coordinator task.
type Tracked = Arc<Mutex<Option<DownloadId>>>;

/// Aborts the wrapped task when dropped.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub struct DownloadCoordinator<R: Runtime, D: DownloadService, I: Installer> {
    runtime: Arc<R>,
    downloads: Arc<D>,
    installer: I,
    file_provider: FileProvider,
    download_dir: PathBuf,
    artifact_prefix: String,
    poll_interval: Duration,
    tracked: Tracked,
    listener: Mutex<Option<AbortOnDrop>>,
}

impl<R, D, I> DownloadCoordinator<R, D, I>
where
    R: Runtime + 'static,
    D: DownloadService + 'static,
    I: Installer,
{
    pub fn new(
        runtime: Arc<R>,
        downloads: Arc<D>,
        installer: I,
        file_provider: FileProvider,
        download_dir: PathBuf,
        artifact_prefix: impl Into<String>,
    ) -> Self {
        Self {
            runtime,
            downloads,
            installer,
            file_provider,
            download_dir,
            artifact_prefix: artifact_prefix.into(),
            poll_interval: POLL_INTERVAL,
            tracked: Arc::new(Mutex::new(None)),
            listener: Mutex::new(None),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// The transfer currently tracked, if any.
    pub fn tracked(&self) -> Option<DownloadId> {
        *lock(&self.tracked)
    }

    /// Local file name for a version. Repeated downloads of one version
    /// overwrite each other.
    pub fn artifact_name(&self, version: &str) -> String {
        let version: String = version
            .chars()
            .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
            .collect();
        format!("{}{}.{}", self.artifact_prefix, version, ARTIFACT_EXTENSION)
    }

    /// Start downloading `info` and return immediately.
    ///
    /// Must be called from within a tokio runtime.
    #[tracing::instrument(skip(self, info, state), fields(version = %info.version))]
    pub fn start(&self, api_url: &str, info: RemoteVersionInfo, state: &StateMachine) {
        if api_url.is_empty() {
            state.publish(
                UpdateError::ApiUrlNotConfigured {
                    settings_hint: false,
                }
                .into(),
            );
            return;
        }

        // Forget any previous transfer before it can publish again
        self.unregister();

        state.publish(UpdateState::Downloading {
            version_info: info.clone(),
            progress: 0,
        });

        self.cleanup_old_artifacts();

        let url = format!("{}{}", api_url, info.download_url);
        let destination = self.download_dir.join(self.artifact_name(&info.version));
        info!("Downloading {} to {:?}", url, destination);

        if let Err(e) = self.runtime.create_dir_all(&self.download_dir) {
            state.publish(UpdateError::Enqueue(format!("{:#}", e)).into());
            return;
        }

        // Subscribe before enqueueing so an instant completion is not missed
        let completions = self.downloads.subscribe();
        let request = DownloadRequest {
            url,
            destination,
            title: DOWNLOAD_TITLE.to_string(),
            description: format!("Downloading version {}", info.version),
        };
        let id = match self.downloads.enqueue(request) {
            Ok(id) => id,
            Err(e) => {
                warn!("Failed to enqueue download: {:#}", e);
                state.publish(UpdateError::Enqueue(format!("{:#}", e)).into());
                return;
            }
        };
        *lock(&self.tracked) = Some(id);

        let (progress_tx, progress_rx) = mpsc::channel(8);
        let poller = tokio::spawn(poll_progress(
            Arc::clone(&self.downloads),
            id,
            state.clone(),
            progress_tx,
            self.poll_interval,
        ));

        let listener = tokio::spawn(coordinate(
            Arc::clone(&self.downloads),
            Arc::clone(&self.tracked),
            id,
            info,
            state.clone(),
            completions,
            progress_rx,
            AbortOnDrop(poller),
        ));
        *lock(&self.listener) = Some(AbortOnDrop(listener));
    }

    /// Cancel the tracked transfer, if any, and return to `Idle`.
    ///
    /// Safe to call in any state, any number of times.
    #[tracing::instrument(skip(self, state))]
    pub fn cancel(&self, state: &StateMachine) {
        {
            let mut tracked = lock(&self.tracked);
            if let Some(id) = tracked.take() {
                debug!("Removing download {}", id);
                self.downloads.remove(id);
            }
        }
        self.unregister();
        state.publish(UpdateState::Idle);
    }

    /// Launch the installer for a downloaded artifact.
    ///
    /// Fire-and-forget: on success the state is left untouched.
    #[tracing::instrument(skip(self, state))]
    pub fn install(&self, file_path: &Path, state: &StateMachine) {
        if !self.runtime.is_file(file_path) {
            state.publish(UpdateError::ArtifactNotFound.into());
            return;
        }

        let result = self.file_provider.uri_for_file(file_path).and_then(|uri| {
            let request = InstallRequest::package_archive(uri, file_path.to_path_buf());
            self.installer.launch(&request)
        });

        if let Err(e) = result {
            warn!("Failed to launch installer: {:#}", e);
            state.publish(UpdateError::Install(format!("{:#}", e)).into());
        }
    }

    /// Drop the completion listener (and with it the poller).
    fn unregister(&self) {
        if lock(&self.listener).take().is_some() {
            debug!("Completion listener unregistered");
        }
    }

    /// Delete artifacts left by earlier downloads. Failures are ignored.
    fn cleanup_old_artifacts(&self) {
        if !self.runtime.exists(&self.download_dir) {
            return;
        }
        let entries = match self.runtime.read_dir(&self.download_dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Skipping artifact cleanup: {:#}", e);
                return;
            }
        };
        for path in entries
            .iter()
            .filter(|p| p.extension().is_some_and(|ext| ext == ARTIFACT_EXTENSION))
        {
            match self.runtime.remove_file(path) {
                Ok(()) => debug!("Removed old artifact {:?}", path),
                Err(e) => debug!("Failed to remove old artifact {:?}: {:#}", path, e),
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run `f` only while `id` is still the tracked transfer.
///
/// Holding the lock while publishing orders the write before or after a
/// concurrent cancellation, never in between.
fn while_tracked<F: FnOnce()>(tracked: &Tracked, id: DownloadId, f: F) -> bool {
    let guard = lock(tracked);
    if *guard != Some(id) {
        return false;
    }
    f();
    true
}

#[allow(clippy::too_many_arguments)]
async fn coordinate<D: DownloadService>(
    downloads: Arc<D>,
    tracked: Tracked,
    id: DownloadId,
    info: RemoteVersionInfo,
    state: StateMachine,
    mut completions: broadcast::Receiver<DownloadId>,
    mut progress: mpsc::Receiver<u8>,
    _poller: AbortOnDrop,
) {
    let mut progress_open = true;
    loop {
        tokio::select! {
            tick = progress.recv(), if progress_open => match tick {
                Some(percent) => {
                    while_tracked(&tracked, id, || {
                        state.advance_progress(percent);
                    });
                }
                None => progress_open = false,
            },
            event = completions.recv() => match event {
                Ok(done) if done == id => {
                    let current = *lock(&tracked);
                    if current != Some(id) {
                        debug!("Ignoring completion of untracked download {}", done);
                        return;
                    }
                    finish(downloads.as_ref(), &tracked, id, info, &state);
                    return;
                }
                Ok(other) => debug!("Ignoring completion of download {}", other),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("Missed {} completion notifications", missed);
                    let terminal = downloads
                        .query(id)
                        .is_none_or(|record| record.status.is_terminal());
                    if terminal {
                        finish(downloads.as_ref(), &tracked, id, info, &state);
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => {
                    warn!("Download facility stopped sending notifications");
                    return;
                }
            },
        }
    }
}

/// Publish the terminal state of transfer `id`.
fn finish<D: DownloadService + ?Sized>(
    downloads: &D,
    tracked: &Tracked,
    id: DownloadId,
    info: RemoteVersionInfo,
    state: &StateMachine,
) {
    let outcome = match downloads.query(id) {
        None => UpdateError::DownloadNotFound.into(),
        Some(record) if record.status == DownloadStatus::Successful => {
            match record.local_uri.as_deref().and_then(local_uri_to_path) {
                Some(file_path) => UpdateState::ReadyToInstall {
                    version_info: info,
                    download_id: id,
                    file_path,
                },
                None => UpdateError::DownloadFailed.into(),
            }
        }
        Some(record) => {
            if let Some(reason) = &record.reason {
                warn!("Download {} failed: {}", id, reason);
            }
            UpdateError::DownloadFailed.into()
        }
    };

    let published = while_tracked(tracked, id, || {
        state.publish(outcome);
    });
    if !published {
        debug!("Download {} finished after cancellation", id);
    }
}

/// Query progress until the live state leaves `Downloading` or the
/// coordinator goes away.
async fn poll_progress<D: DownloadService>(
    downloads: Arc<D>,
    id: DownloadId,
    state: StateMachine,
    progress: mpsc::Sender<u8>,
    interval: Duration,
) {
    while state.is_downloading() {
        if let Some(percent) = downloads.query(id).and_then(|record| record.percent())
            && progress.send(percent).await.is_err()
        {
            break;
        }
        tokio::time::sleep(interval).await;
    }
    debug!("Progress polling for {} stopped", id);
}
