//! Durable storage for the license inventory.
//!
//! Backends only move whole snapshots; they know nothing about binding
//! rules. [`JsonFileBackend`] is the production store, [`MemoryBackend`]
//! serves tests and ephemeral servers.

use crate::error::{LicenseError, LicenseResult};
use crate::record::LicenseRecord;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Whole-inventory load/save.
#[async_trait]
pub trait LicenseBackend: Send + Sync {
    /// Reads every persisted record. An absent store is an empty inventory.
    async fn load(&self) -> LicenseResult<Vec<LicenseRecord>>;

    /// Replaces the persisted inventory with `records`.
    async fn save(&self, records: &[LicenseRecord]) -> LicenseResult<()>;
}

/// JSON array on disk, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    /// Creates a backend for the given file. Nothing is touched until
    /// the first load or save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the store path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling file the next snapshot is staged in before the rename.
    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    async fn write_staged(&self, tmp: &Path, content: &[u8]) -> LicenseResult<()> {
        let mut file = fs::File::create(tmp)
            .await
            .map_err(|e| LicenseError::Persistence(format!("failed to create temp file: {e}")))?;
        file.write_all(content)
            .await
            .map_err(|e| LicenseError::Persistence(format!("failed to write temp file: {e}")))?;
        file.sync_all()
            .await
            .map_err(|e| LicenseError::Persistence(format!("failed to sync temp file: {e}")))?;
        fs::rename(tmp, &self.path)
            .await
            .map_err(|e| LicenseError::Persistence(format!("failed to rename temp file: {e}")))
    }
}

#[async_trait]
impl LicenseBackend for JsonFileBackend {
    async fn load(&self) -> LicenseResult<Vec<LicenseRecord>> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No license store at {}", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(LicenseError::Persistence(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                )));
            }
        };

        serde_json::from_slice(&bytes)
            .map_err(|e| LicenseError::CorruptStore(format!("{}: {e}", self.path.display())))
    }

    async fn save(&self, records: &[LicenseRecord]) -> LicenseResult<()> {
        let json = serde_json::to_vec_pretty(records)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| {
                LicenseError::Persistence(format!("failed to create {}: {e}", parent.display()))
            })?;
        }

        let tmp = self.temp_path();
        if let Err(e) = self.write_staged(&tmp, &json).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e);
        }

        debug!("Saved {} keys to {}", records.len(), self.path.display());
        Ok(())
    }
}

/// In-process backend; keeps the last saved snapshot.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: Mutex<Vec<LicenseRecord>>,
    saves: AtomicUsize,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend that loads the given records.
    pub fn with_records(records: Vec<LicenseRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            saves: AtomicUsize::new(0),
        }
    }

    /// Returns the last saved snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Vec<LicenseRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of saves performed so far.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LicenseBackend for MemoryBackend {
    async fn load(&self) -> LicenseResult<Vec<LicenseRecord>> {
        Ok(self.snapshot())
    }

    async fn save(&self, records: &[LicenseRecord]) -> LicenseResult<()> {
        *self.records.lock().unwrap_or_else(PoisonError::into_inner) = records.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
