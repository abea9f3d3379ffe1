use anyhow::{Result, bail};
use log::{debug, info};

use crate::domain::model::UpdateState;

use super::report::{describe, ensure_ok};
use super::services::{Services, build_manager};

/// Check for a newer build, download it and optionally launch the installer
#[tracing::instrument(skip(services))]
pub async fn download(services: Services, install: bool) -> Result<()> {
    let manager = build_manager(services)?;

    let info = match ensure_ok(manager.check_for_update().await)? {
        UpdateState::Available { version_info, .. } => version_info,
        other => {
            println!("{}", describe(&other));
            return Ok(());
        }
    };

    let mut rx = manager.subscribe();
    manager.download_update(info);

    let mut last_progress = None;
    let outcome = loop {
        let state = rx.borrow_and_update().clone();
        let Some(progress) = state.progress() else {
            break state;
        };
        if last_progress != Some(progress) {
            last_progress = Some(progress);
            eprintln!("{}", describe(&state));
        }
        if rx.changed().await.is_err() {
            bail!("Update state closed while downloading");
        }
    };

    let outcome = ensure_ok(outcome)?;
    let UpdateState::ReadyToInstall { file_path, .. } = &outcome else {
        bail!("Download ended unexpectedly: {}", outcome);
    };
    println!("{}", describe(&outcome));

    if install {
        info!("Launching installer for {:?}", file_path);
        manager.install_update(file_path);
        ensure_ok(manager.state())?;
    } else {
        debug!("Install skipped");
    }
    Ok(())
}
