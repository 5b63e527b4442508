//! Artifact storage with retention.
//!
//! Rendered documents are written into one flat output directory under
//! generated names. Every artifact expires `retention` after it was written;
//! a background sweeper owned by the store deletes expired files on a fixed
//! interval, independent of request traffic.
//!
//! The index is in memory only. On open, files already in the directory are
//! re-indexed from their modification time so they still expire.

mod naming;

pub use naming::{artifact_name, download_ref, is_safe_name};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

use crate::error::{Result, WatermarkError};

/// Suffix of files being written.
const TEMP_SUFFIX: &str = ".tmp";

/// Attempts at finding an unused generated name.
const MAX_NAME_ATTEMPTS: usize = 8;

/// A stored output document.
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    pub name: String,
    #[serde(skip)]
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub content_type: String,
    pub size: u64,
}

impl Artifact {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Bytes of a downloaded artifact.
#[derive(Debug, Clone)]
pub struct Downloaded {
    pub name: String,
    pub bytes: Bytes,
    pub content_type: String,
}

/// Outcome of one retention sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: usize,
    /// Deletions that failed and will be retried next cycle
    pub failed: usize,
}

struct StoreInner {
    dir: PathBuf,
    download_prefix: String,
    retention: chrono::Duration,
    index: RwLock<HashMap<String, Artifact>>,
}

/// Artifact store over a local output directory.
pub struct ArtifactStore {
    inner: Arc<StoreInner>,
    /// Sweeper shutdown sender (Some when the task is running)
    sweeper_shutdown: Mutex<Option<oneshot::Sender<()>>>,
}

impl ArtifactStore {
    /// Open (and create if needed) the output directory.
    ///
    /// Leftover temp files are removed, other files are re-indexed.
    pub async fn open(
        dir: impl Into<PathBuf>,
        download_prefix: impl Into<String>,
        retention: Duration,
    ) -> Result<Self> {
        let dir = dir.into();
        let retention = chrono::Duration::from_std(retention).map_err(|e| {
            WatermarkError::InvalidConfig(format!("retention out of range: {}", e))
        })?;
        tokio::fs::create_dir_all(&dir).await?;

        let mut index = HashMap::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                continue;
            };
            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                _ => continue,
            };

            if name.ends_with(TEMP_SUFFIX) {
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    tracing::warn!(file = %name, error = %e, "Failed to remove stale temp file");
                }
                continue;
            }

            let created_at: DateTime<Utc> = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            let content_type = mime_guess::from_path(&path)
                .first_or_octet_stream()
                .to_string();
            index.insert(
                name.clone(),
                Artifact {
                    name,
                    path,
                    created_at,
                    expires_at: created_at + retention,
                    content_type,
                    size: metadata.len(),
                },
            );
        }

        if !index.is_empty() {
            tracing::info!(
                dir = %dir.display(),
                artifacts = index.len(),
                "Re-indexed existing artifacts"
            );
        }

        Ok(Self {
            inner: Arc::new(StoreInner {
                dir,
                download_prefix: download_prefix.into(),
                retention,
                index: RwLock::new(index),
            }),
            sweeper_shutdown: Mutex::new(None),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    pub fn retention(&self) -> Duration {
        self.inner.retention.to_std().unwrap_or_default()
    }

    /// Number of indexed artifacts, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.inner.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Caller-facing reference for an artifact name.
    pub fn download_ref(&self, name: &str) -> String {
        download_ref(&self.inner.download_prefix, name)
    }

    /// Store `data` under a fresh name derived from the input file name.
    pub async fn put(
        &self,
        source_name: &str,
        extension: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<Artifact> {
        let name = self.fresh_name(source_name, extension)?;
        let path = self.inner.dir.join(&name);
        let temp_path = self.inner.dir.join(format!("{}{}", name, TEMP_SUFFIX));

        if let Err(e) = write_atomic(&temp_path, &path, data).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        let created_at = Utc::now();
        let artifact = Artifact {
            name: name.clone(),
            path,
            created_at,
            expires_at: created_at + self.inner.retention,
            content_type: content_type.to_string(),
            size: data.len() as u64,
        };
        self.inner.index.write().insert(name, artifact.clone());

        tracing::info!(
            artifact = %artifact.name,
            size = artifact.size,
            expires_at = %artifact.expires_at,
            "Stored artifact"
        );
        Ok(artifact)
    }

    /// Metadata of a live artifact.
    pub fn get(&self, name: &str) -> Option<Artifact> {
        self.inner
            .index
            .read()
            .get(name)
            .filter(|a| !a.is_expired_at(Utc::now()))
            .cloned()
    }

    /// Whether a download of `name` would currently be served.
    pub fn is_available(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Read a live artifact in full.
    ///
    /// Unknown, expired, unsafe or vanished names are all
    /// `ArtifactExpiredOrMissing`.
    pub async fn download(&self, name: &str) -> Result<Downloaded> {
        let missing = || WatermarkError::ArtifactExpiredOrMissing(name.to_string());
        if !is_safe_name(name) {
            return Err(missing());
        }
        let artifact = self.get(name).ok_or_else(missing)?;

        match tokio::fs::read(&artifact.path).await {
            Ok(data) => Ok(Downloaded {
                name: artifact.name,
                bytes: Bytes::from(data),
                content_type: artifact.content_type,
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(artifact = %name, "Artifact vanished during download");
                Err(missing())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete every expired artifact now.
    pub async fn sweep_expired(&self) -> SweepReport {
        self.inner.sweep(Utc::now()).await
    }

    /// Start the periodic retention sweep.
    ///
    /// Calling this while a sweeper is running is a no-op.
    pub fn start_sweeper(&self, interval: Duration) {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        {
            let mut guard = self.sweeper_shutdown.lock();
            if guard.is_some() {
                tracing::debug!("Artifact sweeper already running, skipping duplicate start");
                return;
            }
            *guard = Some(shutdown_tx);
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        inner.sweep(Utc::now()).await;
                    }
                    _ = &mut shutdown_rx => {
                        tracing::debug!("Artifact sweeper shutting down");
                        break;
                    }
                }
            }
        });

        tracing::info!(
            interval_secs = interval.as_secs(),
            retention_secs = self.inner.retention.num_seconds(),
            "Started artifact sweeper"
        );
    }

    /// Stop the periodic sweep. Safe to call when it is not running.
    pub fn stop_sweeper(&self) {
        if let Some(shutdown_tx) = self.sweeper_shutdown.lock().take() {
            let _ = shutdown_tx.send(());
        }
    }

    pub fn is_sweeper_running(&self) -> bool {
        self.sweeper_shutdown.lock().is_some()
    }

    fn fresh_name(&self, source_name: &str, extension: &str) -> Result<String> {
        let index = self.inner.index.read();
        for _ in 0..MAX_NAME_ATTEMPTS {
            let name = artifact_name(source_name, extension);
            if !index.contains_key(&name) && !self.inner.dir.join(&name).exists() {
                return Ok(name);
            }
        }
        Err(WatermarkError::StorageFailed(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "could not generate an unused artifact name",
        )))
    }
}

impl Drop for ArtifactStore {
    fn drop(&mut self) {
        self.stop_sweeper();
    }
}

impl StoreInner {
    async fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        // Collect under the read lock, delete without holding it
        let expired: Vec<(String, PathBuf)> = self
            .index
            .read()
            .values()
            .filter(|a| a.is_expired_at(now))
            .map(|a| (a.name.clone(), a.path.clone()))
            .collect();

        let mut report = SweepReport::default();
        for (name, path) in expired {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(artifact = %name, error = %e, "Failed to delete expired artifact");
                    report.failed += 1;
                    continue;
                }
            }
            self.index.write().remove(&name);
            report.removed += 1;
        }

        if report.removed > 0 || report.failed > 0 {
            tracing::info!(
                removed = report.removed,
                failed = report.failed,
                remaining = self.index.read().len(),
                "Retention sweep finished"
            );
        }
        report
    }
}

async fn write_atomic(temp_path: &Path, path: &Path, data: &[u8]) -> io::Result<()> {
    tokio::fs::write(temp_path, data).await?;
    tokio::fs::rename(temp_path, path).await
}
