//! Version check against `/api/version`.

use log::{debug, info, warn};

use crate::domain::model::{InstalledVersion, RemoteVersionInfo, UpdateState, VersionManifest};
use crate::http::HttpClient;
use crate::platform::{PackageInfoProvider, installed_version};

use super::error::UpdateError;
use super::state::StateMachine;

/// Endpoint path appended to the API base URL.
pub const VERSION_PATH: &str = "/api/version";

pub struct VersionChecker<P: PackageInfoProvider> {
    http: HttpClient,
    package_info: P,
    platform: String,
}

impl<P: PackageInfoProvider> VersionChecker<P> {
    pub fn new(http: HttpClient, package_info: P, platform: impl Into<String>) -> Self {
        Self {
            http,
            package_info,
            platform: platform.into(),
        }
    }

    pub fn installed(&self) -> InstalledVersion {
        installed_version(&self.package_info)
    }

    /// Run one check, publishing `Checking` and then the outcome.
    ///
    /// With an empty `api_url` no request is made.
    #[tracing::instrument(skip(self, state))]
    pub async fn check(&self, api_url: &str, state: &StateMachine) -> UpdateState {
        if api_url.is_empty() {
            return state.publish(
                UpdateError::ApiUrlNotConfigured {
                    settings_hint: true,
                }
                .into(),
            );
        }

        state.publish(UpdateState::Checking);

        let outcome = match self.fetch(api_url).await {
            Ok(entry) => self.evaluate(entry),
            Err(e) => {
                warn!("Error checking for updates: {}", e);
                e.into()
            }
        };
        state.publish(outcome)
    }

    /// Compare the published build with the installed one.
    pub fn evaluate(&self, entry: Option<RemoteVersionInfo>) -> UpdateState {
        let installed = self.installed();

        let Some(remote) = entry else {
            debug!("No '{}' build published", self.platform);
            return UpdateState::UpToDate {
                current_version: installed.name,
            };
        };

        if remote.is_newer_than(installed.code) {
            info!(
                "Update available: {} ({}) > {} ({})",
                remote.version, remote.version_code, installed.name, installed.code
            );
            UpdateState::Available {
                version_info: remote,
                current_version: installed.name,
                current_version_code: installed.code,
            }
        } else {
            UpdateState::UpToDate {
                current_version: installed.name,
            }
        }
    }

    async fn fetch(&self, api_url: &str) -> Result<Option<RemoteVersionInfo>, UpdateError> {
        let url = format!("{}{}", api_url, VERSION_PATH);
        debug!("Checking for updates at: {}", url);

        let body = self
            .http
            .get_text(&url)
            .await
            .map_err(UpdateError::from_http)?;
        if body.trim().is_empty() {
            return Err(UpdateError::EmptyResponse);
        }

        VersionManifest::from_json(&body)
            .and_then(|manifest| manifest.platform(&self.platform))
            .map_err(|e| UpdateError::Transport(format!("{:#}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{MockPackageInfoProvider, PackageInfo};

    fn package_info(code: i64) -> MockPackageInfoProvider {
        let mut provider = MockPackageInfoProvider::new();
        provider.expect_package_info().returning(move || {
            Ok(PackageInfo {
                version_name: Some("0.2.3".to_string()),
                version_code: code,
            })
        });
        provider
    }

    fn checker(code: i64) -> VersionChecker<MockPackageInfoProvider> {
        VersionChecker::new(
            HttpClient::with_default_timeouts("test").unwrap(),
            package_info(code),
            "android",
        )
    }

    fn manifest(version_code: i64) -> String {
        format!(
            r#"{{"android": {{
                "version": "0.3.0",
                "version_code": {},
                "download_url": "/binaries/secuops-android-v0.3.0.apk",
                "changelog": "Fixes",
                "file_size": 1024,
                "min_version": 1
            }}}}"#,
            version_code
        )
    }

    async fn serve(status: usize, body: &str) -> (mockito::ServerGuard, mockito::Mock) {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/version")
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;
        (server, mock)
    }

    #[tokio::test]
    async fn test_newer_build_is_available() {
        let (server, mock) = serve(200, &manifest(5)).await;
        let state = StateMachine::new();

        let result = checker(3).check(&server.url(), &state).await;

        mock.assert_async().await;
        match &result {
            UpdateState::Available {
                version_info,
                current_version,
                current_version_code,
            } => {
                assert_eq!(version_info.version_code, 5);
                assert_eq!(version_info.min_version, 1);
                assert_eq!(current_version, "0.2.3");
                assert_eq!(*current_version_code, 3);
            }
            other => panic!("Expected Available, got {:?}", other),
        }
        assert_eq!(state.current(), result);
    }

    #[tokio::test]
    async fn test_same_or_older_build_is_up_to_date() {
        for remote in [3, 1] {
            let (server, _mock) = serve(200, &manifest(remote)).await;
            let state = StateMachine::new();

            let result = checker(3).check(&server.url(), &state).await;
            assert_eq!(
                result,
                UpdateState::UpToDate {
                    current_version: "0.2.3".to_string()
                }
            );
        }
    }

    #[tokio::test]
    async fn test_missing_platform_is_up_to_date() {
        let (server, _mock) = serve(200, r#"{"ios": {"version": "9.9"}}"#).await;
        let state = StateMachine::new();

        let result = checker(3).check(&server.url(), &state).await;
        assert_eq!(
            result,
            UpdateState::UpToDate {
                current_version: "0.2.3".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_server_error_status() {
        let (server, _mock) = serve(500, "").await;
        let state = StateMachine::new();

        let result = checker(3).check(&server.url(), &state).await;
        assert_eq!(result, UpdateState::error("Server error: 500"));
        assert_eq!(state.current(), result);
    }

    #[tokio::test]
    async fn test_empty_body() {
        let (server, _mock) = serve(200, "").await;
        let result = checker(3).check(&server.url(), &StateMachine::new()).await;
        assert_eq!(result, UpdateState::error("Empty response from server"));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let (server, _mock) = serve(200, "<html>").await;
        let result = checker(3).check(&server.url(), &StateMachine::new()).await;

        match result {
            UpdateState::Error { message } => {
                assert!(message.contains("Failed to parse version manifest"))
            }
            other => panic!("Expected Error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let result = checker(3)
            .check("http://127.0.0.1:9", &StateMachine::new())
            .await;
        assert!(matches!(result, UpdateState::Error { .. }));
    }

    #[tokio::test]
    async fn test_empty_api_url_makes_no_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let state = StateMachine::new();
        let mut rx = state.subscribe();

        let result = checker(3).check("", &state).await;

        assert_eq!(
            result,
            UpdateState::error("API URL not configured. Please configure in Settings.")
        );
        // Straight to Error, no Checking in between
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), result);
        mock.assert_async().await;
    }

    #[test]
    fn test_evaluate_with_unknown_installed_version() {
        let mut provider = MockPackageInfoProvider::new();
        provider
            .expect_package_info()
            .returning(|| Err(anyhow::anyhow!("lookup failed")));
        let checker = VersionChecker::new(
            HttpClient::new(reqwest::Client::new()),
            provider,
            "android",
        );

        let remote = RemoteVersionInfo {
            version: "0.0.1".to_string(),
            version_code: 1,
            ..Default::default()
        };
        match checker.evaluate(Some(remote)) {
            UpdateState::Available {
                current_version,
                current_version_code,
                ..
            } => {
                assert_eq!(current_version, "Unknown");
                assert_eq!(current_version_code, 0);
            }
            other => panic!("Expected Available, got {:?}", other),
        }
    }
}
