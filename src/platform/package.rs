//! Version metadata of the installed application.

use anyhow::{Context, Result};
use log::debug;

use crate::domain::model::InstalledVersion;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    /// Human readable version, absent when the package does not declare one
    pub version_name: Option<String>,
    pub version_code: i64,
}

#[cfg_attr(test, mockall::automock)]
pub trait PackageInfoProvider: Send + Sync {
    fn package_info(&self) -> Result<PackageInfo>;
}

/// Version identity baked in at compile time by `build.rs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildPackageInfo;

impl PackageInfoProvider for BuildPackageInfo {
    fn package_info(&self) -> Result<PackageInfo> {
        let version_code = env!("SECUOPS_VERSION_CODE")
            .parse::<i64>()
            .context("Invalid version code in build metadata")?;
        Ok(PackageInfo {
            version_name: Some(env!("SECUOPS_VERSION_NAME").to_string()),
            version_code,
        })
    }
}

/// Resolve the installed version, tolerating lookup failures.
///
/// A failed lookup yields "Unknown" / 0 instead of an error.
pub fn installed_version<P: PackageInfoProvider + ?Sized>(provider: &P) -> InstalledVersion {
    match provider.package_info() {
        Ok(info) => InstalledVersion {
            name: info
                .version_name
                .unwrap_or_else(|| InstalledVersion::UNKNOWN_NAME.to_string()),
            code: info.version_code,
        },
        Err(e) => {
            debug!("Package info lookup failed: {:#}", e);
            InstalledVersion::default()
        }
    }
}
