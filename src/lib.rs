pub mod commands;
pub mod config;
pub mod domain;
pub mod http;
pub mod platform;
pub mod runtime;
pub mod update;

/// Test doubles shared by the unit tests.
#[cfg(test)]
pub mod test_utils {
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use anyhow::Result;
    use reqwest::Url;
    use tokio::sync::{broadcast, watch};

    use crate::domain::model::{DownloadId, RemoteVersionInfo, UpdateState};
    use crate::platform::{DownloadRecord, DownloadRequest, DownloadService, DownloadStatus};

    /// A published build with version code 5.
    pub fn remote_version() -> RemoteVersionInfo {
        RemoteVersionInfo {
            version: "0.3.0".to_string(),
            version_code: 5,
            download_url: "/binaries/secuops-android-v0.3.0.apk".to_string(),
            changelog: "Bug fixes".to_string(),
            file_size: 5_242_880,
            min_version: 1,
        }
    }

    /// Wait (at most five seconds) until the state satisfies `pred`.
    pub async fn wait_for_state<F>(rx: &mut watch::Receiver<UpdateState>, pred: F) -> UpdateState
    where
        F: FnMut(&UpdateState) -> bool,
    {
        let state = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
            .await
            .expect("timed out waiting for update state")
            .expect("update state channel closed");
        state.clone()
    }

    /// Download facility driven by hand: transfers never progress on their own.
    pub struct FakeDownloadService {
        records: Mutex<HashMap<DownloadId, DownloadRecord>>,
        requests: Mutex<Vec<DownloadRequest>>,
        removed: Mutex<Vec<DownloadId>>,
        next_id: AtomicI64,
        completed: broadcast::Sender<DownloadId>,
        refuse: bool,
    }

    impl FakeDownloadService {
        pub fn new() -> Self {
            Self::with_capacity(16)
        }

        /// A facility whose completion channel holds only `capacity` notifications.
        pub fn with_capacity(capacity: usize) -> Self {
            let (completed, _) = broadcast::channel(capacity);
            Self {
                records: Mutex::new(HashMap::new()),
                requests: Mutex::new(Vec::new()),
                removed: Mutex::new(Vec::new()),
                next_id: AtomicI64::new(100),
                completed,
                refuse: false,
            }
        }

        /// A facility that rejects every transfer.
        pub fn refusing() -> Self {
            Self {
                refuse: true,
                ..Self::new()
            }
        }

        pub fn requests(&self) -> Vec<DownloadRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn removed(&self) -> Vec<DownloadId> {
            self.removed.lock().unwrap().clone()
        }

        pub fn set_progress(&self, id: DownloadId, downloaded: u64, total: u64) {
            if let Some(record) = self.records.lock().unwrap().get_mut(&id) {
                record.status = DownloadStatus::Running;
                record.bytes_downloaded = downloaded;
                record.bytes_total = total;
            }
        }

        pub fn succeed(&self, id: DownloadId, path: &Path) {
            if let Some(record) = self.records.lock().unwrap().get_mut(&id) {
                record.status = DownloadStatus::Successful;
                record.local_uri = Url::from_file_path(path).ok().map(|u| u.to_string());
            }
        }

        pub fn fail(&self, id: DownloadId) {
            if let Some(record) = self.records.lock().unwrap().get_mut(&id) {
                record.status = DownloadStatus::Failed;
                record.reason = Some("connection reset".to_string());
            }
        }

        /// Drop the record as if the facility lost track of it.
        pub fn forget(&self, id: DownloadId) {
            self.records.lock().unwrap().remove(&id);
        }

        pub fn notify(&self, id: DownloadId) {
            let _ = self.completed.send(id);
        }
    }

    impl DownloadService for FakeDownloadService {
        fn enqueue(&self, request: DownloadRequest) -> Result<DownloadId> {
            if self.refuse {
                anyhow::bail!("download facility unavailable");
            }
            let id = DownloadId(self.next_id.fetch_add(1, Ordering::SeqCst));
            self.requests.lock().unwrap().push(request);
            self.records
                .lock()
                .unwrap()
                .insert(id, DownloadRecord::pending(id));
            Ok(id)
        }

        fn query(&self, id: DownloadId) -> Option<DownloadRecord> {
            self.records.lock().unwrap().get(&id).cloned()
        }

        fn remove(&self, id: DownloadId) -> bool {
            self.removed.lock().unwrap().push(id);
            self.records.lock().unwrap().remove(&id).is_some()
        }

        fn subscribe(&self) -> broadcast::Receiver<DownloadId> {
            self.completed.subscribe()
        }
    }
}
