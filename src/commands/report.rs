//! Console rendering of update states.

use anyhow::{Result, bail};

use crate::domain::model::UpdateState;
use crate::update::format_file_size;

/// Human readable summary of a state, one fact per line.
pub fn describe(state: &UpdateState) -> String {
    match state {
        UpdateState::Available {
            version_info,
            current_version,
            current_version_code,
        } => {
            let mut lines = vec![
                format!(
                    "Update available: {} (build {})",
                    version_info.version, version_info.version_code
                ),
                format!(
                    "Installed: {} (build {})",
                    current_version, current_version_code
                ),
            ];
            if version_info.file_size > 0 {
                lines.push(format!("Size: {}", format_file_size(version_info.file_size)));
            }
            if !version_info.changelog.is_empty() {
                lines.push(format!("Changelog:\n{}", version_info.changelog));
            }
            lines.join("\n")
        }
        UpdateState::UpToDate { current_version } => {
            format!("Already up to date ({})", current_version)
        }
        UpdateState::Downloading {
            version_info,
            progress,
        } => format!("Downloading {}: {}%", version_info.version, progress),
        UpdateState::ReadyToInstall {
            version_info,
            file_path,
            ..
        } => format!(
            "Version {} downloaded to {}",
            version_info.version,
            file_path.display()
        ),
        other => other.to_string(),
    }
}

/// Turn an `Error` state into an error, pass every other state through.
pub fn ensure_ok(state: UpdateState) -> Result<UpdateState> {
    if let UpdateState::Error { message } = &state {
        bail!("{}", message);
    }
    Ok(state)
}
