use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::RemoteVersionInfo;

/// Opaque identifier handed out by the download facility for one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DownloadId(pub i64);

impl fmt::Display for DownloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The single observable value of the update engine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UpdateState {
    /// No check in progress
    #[default]
    Idle,
    /// Version request in flight
    Checking,
    /// The server publishes a newer build
    Available {
        version_info: RemoteVersionInfo,
        current_version: String,
        current_version_code: i64,
    },
    UpToDate {
        current_version: String,
    },
    /// Artifact transfer in progress, `progress` in 0..=100
    Downloading {
        version_info: RemoteVersionInfo,
        progress: u8,
    },
    /// Artifact on disk, installer can be launched
    ReadyToInstall {
        version_info: RemoteVersionInfo,
        download_id: DownloadId,
        file_path: PathBuf,
    },
    Error {
        message: String,
    },
}

impl UpdateState {
    pub fn error(message: impl Into<String>) -> Self {
        UpdateState::Error {
            message: message.into(),
        }
    }

    pub fn is_downloading(&self) -> bool {
        matches!(self, UpdateState::Downloading { .. })
    }

    /// Download progress, if a download is running.
    pub fn progress(&self) -> Option<u8> {
        match self {
            UpdateState::Downloading { progress, .. } => Some(*progress),
            _ => None,
        }
    }

    /// States from which no operation is currently running.
    pub fn is_settled(&self) -> bool {
        !matches!(
            self,
            UpdateState::Checking | UpdateState::Downloading { .. }
        )
    }
}

impl fmt::Display for UpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateState::Idle => write!(f, "idle"),
            UpdateState::Checking => write!(f, "checking for updates"),
            UpdateState::Available {
                version_info,
                current_version,
                ..
            } => write!(
                f,
                "update available: {} (installed {})",
                version_info.version, current_version
            ),
            UpdateState::UpToDate { current_version } => {
                write!(f, "up to date ({})", current_version)
            }
            UpdateState::Downloading {
                version_info,
                progress,
            } => write!(f, "downloading {} {}%", version_info.version, progress),
            UpdateState::ReadyToInstall {
                version_info,
                file_path,
                ..
            } => write!(
                f,
                "ready to install {} from {}",
                version_info.version,
                file_path.display()
            ),
            UpdateState::Error { message } => write!(f, "error: {}", message),
        }
    }
}
