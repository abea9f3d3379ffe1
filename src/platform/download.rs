//! Background download facility.
//!
//! Transfers are enqueued and run in the background; callers observe them
//! by querying a [`DownloadRecord`] and by listening for completion
//! notifications, which carry only the [`DownloadId`] of the finished
//! transfer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use log::{debug, info, warn};
use reqwest::Url;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::domain::model::DownloadId;
use crate::http::HttpClient;
use crate::runtime::Runtime;

/// Capacity of the completion notification channel.
const COMPLETION_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    Pending,
    Running,
    Successful,
    Failed,
}

impl DownloadStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, DownloadStatus::Successful | DownloadStatus::Failed)
    }
}

/// Snapshot of one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRecord {
    pub id: DownloadId,
    pub status: DownloadStatus,
    pub bytes_downloaded: u64,
    /// Total size, 0 while unknown
    pub bytes_total: u64,
    /// `file://` URI of the finished file
    pub local_uri: Option<String>,
    /// Failure reason, set together with `DownloadStatus::Failed`
    pub reason: Option<String>,
}

impl DownloadRecord {
    pub fn pending(id: DownloadId) -> Self {
        Self {
            id,
            status: DownloadStatus::Pending,
            bytes_downloaded: 0,
            bytes_total: 0,
            local_uri: None,
            reason: None,
        }
    }

    /// Completed percentage, `None` while the total size is unknown.
    pub fn percent(&self) -> Option<u8> {
        if self.bytes_total == 0 {
            return None;
        }
        let percent = u128::from(self.bytes_downloaded) * 100 / u128::from(self.bytes_total);
        Some(percent.min(100) as u8)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub destination: PathBuf,
    pub title: String,
    pub description: String,
}

pub trait DownloadService: Send + Sync {
    /// Start a transfer in the background.
    fn enqueue(&self, request: DownloadRequest) -> Result<DownloadId>;

    /// Current snapshot of a transfer, `None` if unknown or removed.
    fn query(&self, id: DownloadId) -> Option<DownloadRecord>;

    /// Cancel a transfer and delete its file. Returns whether it was known.
    fn remove(&self, id: DownloadId) -> bool;

    /// Completion notifications for every transfer that reaches a terminal status.
    fn subscribe(&self) -> broadcast::Receiver<DownloadId>;
}

/// Extract the file system path from a `file://` URI.
pub fn local_uri_to_path(uri: &str) -> Option<PathBuf> {
    Url::parse(uri).ok()?.to_file_path().ok()
}

struct Entry {
    record: DownloadRecord,
    destination: PathBuf,
    task: Option<JoinHandle<()>>,
}

struct Shared<R: Runtime> {
    http: HttpClient,
    runtime: Arc<R>,
    entries: Mutex<HashMap<DownloadId, Entry>>,
    completed: broadcast::Sender<DownloadId>,
}

impl<R: Runtime> Shared<R> {
    /// Apply `f` to the record of `id`. Returns false once the transfer was removed.
    fn update<F: FnOnce(&mut DownloadRecord)>(&self, id: DownloadId, f: F) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get_mut(&id) {
            Some(entry) => {
                f(&mut entry.record);
                true
            }
            None => false,
        }
    }
}

/// Download facility backed by `reqwest`, one tokio task per transfer.
///
/// Records of finished transfers stay queryable until the next enqueue.
pub struct HttpDownloadService<R: Runtime> {
    shared: Arc<Shared<R>>,
    next_id: AtomicI64,
}

impl<R: Runtime + 'static> HttpDownloadService<R> {
    pub fn new(http: HttpClient, runtime: Arc<R>) -> Self {
        let (completed, _) = broadcast::channel(COMPLETION_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                http,
                runtime,
                entries: Mutex::new(HashMap::new()),
                completed,
            }),
            next_id: AtomicI64::new(1),
        }
    }

    async fn run(shared: Arc<Shared<R>>, id: DownloadId, url: String, destination: PathBuf) {
        shared.update(id, |record| record.status = DownloadStatus::Running);

        let runtime = Arc::clone(&shared.runtime);
        let progress = Arc::clone(&shared);
        let result = shared
            .http
            .download_file(
                &url,
                || runtime.create_file(&destination),
                |downloaded, total| {
                    progress.update(id, |record| {
                        record.bytes_downloaded = downloaded;
                        if let Some(total) = total {
                            record.bytes_total = total;
                        }
                    });
                },
            )
            .await;

        let known = shared.update(id, |record| match &result {
            Ok(bytes) => {
                record.status = DownloadStatus::Successful;
                record.bytes_downloaded = *bytes;
                record.bytes_total = record.bytes_total.max(*bytes);
                record.local_uri = Url::from_file_path(&destination)
                    .ok()
                    .map(|uri| uri.to_string());
            }
            Err(e) => {
                record.status = DownloadStatus::Failed;
                record.reason = Some(format!("{:#}", e));
            }
        });

        match (&result, known) {
            (_, false) => debug!("Download {} finished after removal", id),
            (Ok(bytes), true) => info!("Download {} complete ({} bytes)", id, bytes),
            (Err(e), true) => warn!("Download {} failed: {:#}", id, e),
        }

        if known {
            // No subscriber is not an error
            let _ = shared.completed.send(id);
        }
    }
}

impl<R: Runtime + 'static> DownloadService for HttpDownloadService<R> {
    #[tracing::instrument(skip(self, request), fields(url = %request.url))]
    fn enqueue(&self, request: DownloadRequest) -> Result<DownloadId> {
        let id = DownloadId(self.next_id.fetch_add(1, Ordering::SeqCst));
        debug!(
            "Enqueuing {} '{}' ({}) -> {:?}",
            id, request.title, request.description, request.destination
        );

        {
            let mut entries = self
                .shared
                .entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            // Finished transfers are kept only until the next one is enqueued
            entries.retain(|_, entry| !entry.record.status.is_terminal());
            entries.insert(
                id,
                Entry {
                    record: DownloadRecord::pending(id),
                    destination: request.destination.clone(),
                    task: None,
                },
            );
        }

        let task = tokio::spawn(Self::run(
            Arc::clone(&self.shared),
            id,
            request.url,
            request.destination,
        ));

        let mut entries = self
            .shared
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = entries.get_mut(&id) {
            entry.task = Some(task);
        }
        Ok(id)
    }

    fn query(&self, id: DownloadId) -> Option<DownloadRecord> {
        let entries = self
            .shared
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        entries.get(&id).map(|entry| entry.record.clone())
    }

    #[tracing::instrument(skip(self))]
    fn remove(&self, id: DownloadId) -> bool {
        let entry = {
            let mut entries = self
                .shared
                .entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            entries.remove(&id)
        };
        let Some(entry) = entry else {
            return false;
        };

        if let Some(task) = entry.task {
            task.abort();
        }
        remove_quietly(self.shared.runtime.as_ref(), &entry.destination);
        debug!("Removed download {}", id);
        true
    }

    fn subscribe(&self) -> broadcast::Receiver<DownloadId> {
        self.shared.completed.subscribe()
    }
}

fn remove_quietly<R: Runtime + ?Sized>(runtime: &R, path: &Path) {
    if runtime.exists(path)
        && let Err(e) = runtime.remove_file(path)
    {
        debug!("Failed to remove {:?}: {:#}", path, e);
    }
}
