//! Package installer launch.
//!
//! Downloaded artifacts are never handed out by raw path: a [`FileProvider`]
//! issues a `content://` URI scoped to the application's authority, and the
//! installer is asked to open that URI.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;

use anyhow::{Context, Result, bail};
use log::{debug, info, warn};
use reqwest::Url;

pub const APK_MIME_TYPE: &str = "application/vnd.android.package-archive";

/// A `content://` URI issued by a [`FileProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentUri(Url);

impl ContentUri {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn authority(&self) -> &str {
        self.0.host_str().unwrap_or_default()
    }
}

impl fmt::Display for ContentUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maps files under one shared root directory to content URIs.
#[derive(Debug, Clone)]
pub struct FileProvider {
    authority: String,
    root_name: String,
    root_dir: PathBuf,
}

impl FileProvider {
    pub fn new(authority: impl Into<String>, root_name: impl Into<String>, root_dir: PathBuf) -> Self {
        Self {
            authority: authority.into(),
            root_name: root_name.into(),
            root_dir,
        }
    }

    /// Provider for an application: authority `<application_id>.provider`,
    /// sharing the download directory under the `downloads` root.
    pub fn for_application(application_id: &str, download_dir: PathBuf) -> Self {
        Self::new(format!("{}.provider", application_id), "downloads", download_dir)
    }

    /// Issue a URI for `path`, which must live under the shared root.
    pub fn uri_for_file(&self, path: &Path) -> Result<ContentUri> {
        let relative = match path.strip_prefix(&self.root_dir) {
            Ok(relative) if relative.components().next().is_some() => relative,
            _ => bail!(
                "Failed to find configured root that contains {}",
                path.display()
            ),
        };

        let mut url = Url::parse(&format!("content://{}/", self.authority))
            .with_context(|| format!("Invalid provider authority '{}'", self.authority))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| anyhow::anyhow!("Content URI cannot hold a path"))?;
            segments.pop_if_empty().push(&self.root_name);
            for component in relative.components() {
                segments.push(&component.as_os_str().to_string_lossy());
            }
        }
        Ok(ContentUri(url))
    }
}

/// Everything the installer needs to open one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    pub uri: ContentUri,
    pub file_path: PathBuf,
    pub mime_type: String,
    /// Grant the installer read access to `uri`
    pub grant_read: bool,
    /// Run the installer detached from the caller
    pub new_task: bool,
}

impl InstallRequest {
    pub fn package_archive(uri: ContentUri, file_path: PathBuf) -> Self {
        Self {
            uri,
            file_path,
            mime_type: APK_MIME_TYPE.to_string(),
            grant_read: true,
            new_task: true,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait Installer: Send + Sync {
    /// Open the installer UI. Returns once the installer was launched; the
    /// installation outcome is not reported.
    fn launch(&self, request: &InstallRequest) -> Result<()>;
}

/// Launches the desktop's file opener on the artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInstaller {
    program: String,
    args: Vec<String>,
}

impl CommandInstaller {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl Default for CommandInstaller {
    #[cfg(target_os = "macos")]
    fn default() -> Self {
        Self::new("open", vec![])
    }

    #[cfg(target_os = "windows")]
    fn default() -> Self {
        Self::new("explorer", vec![])
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    fn default() -> Self {
        Self::new("xdg-open", vec![])
    }
}

impl Installer for CommandInstaller {
    #[tracing::instrument(skip(self))]
    fn launch(&self, request: &InstallRequest) -> Result<()> {
        debug!(
            "Launching {} for {} ({})",
            self.program, request.uri, request.mime_type
        );

        let mut command = Command::new(&self.program);
        command.args(&self.args).arg(&request.file_path);
        if request.new_task {
            command
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null());
        }

        let child = command
            .spawn()
            .with_context(|| format!("Failed to run '{}'", self.program))?;
        info!("Installer started (pid {})", child.id());
        reap(child);
        Ok(())
    }
}

/// Wait for `child` on a detached thread so it does not linger as a zombie.
fn reap(mut child: Child) -> thread::JoinHandle<Option<ExitStatus>> {
    thread::spawn(move || match child.wait() {
        Ok(status) => {
            debug!("Installer {} exited with {}", child.id(), status);
            Some(status)
        }
        Err(e) => {
            warn!("Failed to wait for installer {}: {}", child.id(), e);
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> FileProvider {
        FileProvider::for_application("com.secuaas.secuops", PathBuf::from("/data/downloads"))
    }

    #[test]
    fn test_uri_for_file() {
        let uri = provider()
            .uri_for_file(Path::new("/data/downloads/secuops-android-v0.3.0.apk"))
            .unwrap();

        assert_eq!(
            uri.as_str(),
            "content://com.secuaas.secuops.provider/downloads/secuops-android-v0.3.0.apk"
        );
        assert_eq!(uri.authority(), "com.secuaas.secuops.provider");
    }

    #[test]
    fn test_uri_for_file_escapes_segments() {
        let uri = provider()
            .uri_for_file(Path::new("/data/downloads/sub dir/app#1.apk"))
            .unwrap();

        assert_eq!(
            uri.as_str(),
            "content://com.secuaas.secuops.provider/downloads/sub%20dir/app%231.apk"
        );
    }

    #[test]
    fn test_uri_for_file_outside_root() {
        assert!(provider().uri_for_file(Path::new("/etc/passwd")).is_err());
        assert!(provider().uri_for_file(Path::new("/data/downloads")).is_err());
    }

    #[test]
    fn test_package_archive_request() {
        let uri = provider()
            .uri_for_file(Path::new("/data/downloads/a.apk"))
            .unwrap();
        let request = InstallRequest::package_archive(uri, PathBuf::from("/data/downloads/a.apk"));

        assert_eq!(request.mime_type, APK_MIME_TYPE);
        assert!(request.grant_read);
        assert!(request.new_task);
    }

    #[test]
    fn test_command_installer_missing_program() {
        let installer = CommandInstaller::new("secuops-no-such-installer-binary", vec![]);
        let uri = provider()
            .uri_for_file(Path::new("/data/downloads/a.apk"))
            .unwrap();
        let request = InstallRequest::package_archive(uri, PathBuf::from("/data/downloads/a.apk"));

        let err = installer.launch(&request).unwrap_err();
        assert!(err.to_string().contains("secuops-no-such-installer-binary"));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_installer_launches() {
        let installer = CommandInstaller::new("true", vec![]);
        let uri = provider()
            .uri_for_file(Path::new("/data/downloads/a.apk"))
            .unwrap();
        let request = InstallRequest::package_archive(uri, PathBuf::from("/data/downloads/a.apk"));

        assert!(installer.launch(&request).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_reap_waits_for_installer() {
        let child = Command::new("true").spawn().unwrap();
        let status = reap(child).join().unwrap();
        assert!(status.is_some_and(|status| status.success()));
    }
}
