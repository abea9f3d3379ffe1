//! Platform services consumed by the update engine.
//!
//! Each service is a trait so the engine can be driven by the desktop
//! implementations shipped here or by test doubles:
//!
//! - `download` - background download facility with completion notifications
//! - `installer` - package installer launch and content URIs
//! - `package` - version metadata of the installed application

mod download;
mod installer;
mod package;

pub use download::{
    DownloadRecord, DownloadRequest, DownloadService, DownloadStatus, HttpDownloadService,
    local_uri_to_path,
};
pub use installer::{APK_MIME_TYPE, CommandInstaller, ContentUri, FileProvider, InstallRequest, Installer};
pub use package::{BuildPackageInfo, PackageInfo, PackageInfoProvider, installed_version};

#[cfg(test)]
pub use installer::MockInstaller;
#[cfg(test)]
pub use package::MockPackageInfoProvider;
