use std::path::{Path, PathBuf};

use anyhow::Result;
use log::debug;

use super::report::ensure_ok;
use super::services::{Services, build_manager};

/// Resolve a bare file name against the download directory
fn resolve_artifact(download_dir: &Path, path: &Path) -> PathBuf {
    if path.components().count() == 1 {
        download_dir.join(path)
    } else {
        path.to_path_buf()
    }
}

/// Launch the installer on a downloaded artifact
#[tracing::instrument(skip(services))]
pub fn install(services: Services, path: &Path) -> Result<()> {
    let manager = build_manager(services)?;
    let path = resolve_artifact(manager.config().download_dir(), path);
    debug!("Installing {:?}", path);

    manager.install_update(&path);
    ensure_ok(manager.state())?;

    println!("Installer launched for {}", path.display());
    Ok(())
}
