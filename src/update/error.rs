//! Failure taxonomy of the update engine.
//!
//! Every variant ends up as `UpdateState::Error`; nothing is propagated to
//! the observer.

use crate::domain::model::UpdateState;
use crate::http::HttpStatusError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateError {
    /// The API base URL is empty
    ApiUrlNotConfigured { settings_hint: bool },
    /// Connection failure, timeout or malformed body
    Transport(String),
    /// Non-2xx answer from the version endpoint
    Server(u16),
    EmptyResponse,
    /// The download facility refused the transfer
    Enqueue(String),
    DownloadFailed,
    /// The tracked transfer is unknown to the download facility
    DownloadNotFound,
    ArtifactNotFound,
    Install(String),
}

impl UpdateError {
    /// Classify an error returned by the HTTP layer.
    pub fn from_http(error: anyhow::Error) -> Self {
        match error.downcast_ref::<HttpStatusError>() {
            Some(status) => UpdateError::Server(status.status),
            None => UpdateError::Transport(format!("{:#}", error)),
        }
    }
}

impl std::fmt::Display for UpdateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateError::ApiUrlNotConfigured {
                settings_hint: true,
            } => write!(f, "API URL not configured. Please configure in Settings."),
            UpdateError::ApiUrlNotConfigured {
                settings_hint: false,
            } => write!(f, "API URL not configured"),
            UpdateError::Transport(msg) => write!(f, "{}", msg),
            UpdateError::Server(status) => write!(f, "Server error: {}", status),
            UpdateError::EmptyResponse => write!(f, "Empty response from server"),
            UpdateError::Enqueue(msg) => write!(f, "Download failed: {}", msg),
            UpdateError::DownloadFailed => write!(f, "Download failed"),
            UpdateError::DownloadNotFound => write!(f, "Download not found"),
            UpdateError::ArtifactNotFound => write!(f, "APK file not found"),
            UpdateError::Install(msg) => write!(f, "Failed to install: {}", msg),
        }
    }
}

impl std::error::Error for UpdateError {}

impl From<UpdateError> for UpdateState {
    fn from(error: UpdateError) -> Self {
        UpdateState::error(error.to_string())
    }
}
