use std::collections::HashMap;
use std::fs;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::SystemTime;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::KiraError;
use crate::loader::{self, LoadOptions, LoadedDataset};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    modified: Option<SystemTime>,
    len: u64,
}

impl Fingerprint {
    fn of(path: &Utf8Path) -> Result<Self, KiraError> {
        let meta = fs::metadata(path.as_std_path()).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => KiraError::DatasetNotFound(path.as_std_path().to_path_buf()),
            _ => KiraError::Filesystem(format!("stat {path}: {err}")),
        })?;
        Ok(Self {
            modified: meta.modified().ok(),
            len: meta.len(),
        })
    }
}

struct CacheEntry {
    fingerprint: Fingerprint,
    options: LoadOptions,
    loaded: Arc<LoadedDataset>,
}

/// Loaded base tables keyed on path. An entry is reused only while the file's
/// modification time and length, and the load options, are unchanged.
#[derive(Default)]
pub struct DatasetCache {
    entries: Mutex<HashMap<Utf8PathBuf, CacheEntry>>,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache shared by every session.
    pub fn global() -> &'static DatasetCache {
        static CACHE: OnceLock<DatasetCache> = OnceLock::new();
        CACHE.get_or_init(DatasetCache::new)
    }

    pub fn get_or_load(
        &self,
        path: &Utf8Path,
        options: &LoadOptions,
    ) -> Result<Arc<LoadedDataset>, KiraError> {
        let fingerprint = Fingerprint::of(path)?;
        let mut entries = self.lock();

        if let Some(entry) = entries.get(path) {
            if entry.fingerprint == fingerprint && entry.options == *options {
                tracing::debug!(path = %path, "dataset cache hit");
                return Ok(entry.loaded.clone());
            }
            tracing::debug!(path = %path, "dataset changed on disk, reloading");
        } else {
            tracing::debug!(path = %path, "dataset cache miss");
        }

        let loaded = Arc::new(loader::load(path, options)?);
        entries.insert(
            path.to_path_buf(),
            CacheEntry {
                fingerprint,
                options: options.clone(),
                loaded: loaded.clone(),
            },
        );
        Ok(loaded)
    }

    /// Drops the entry for `path`; returns whether one existed.
    pub fn invalidate(&self, path: &Utf8Path) -> bool {
        self.lock().remove(path).is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // Entries are replaced whole, so a panic mid-load leaves the map valid.
    fn lock(&self) -> MutexGuard<'_, HashMap<Utf8PathBuf, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
