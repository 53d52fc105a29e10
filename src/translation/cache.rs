/*!
 * Translation caching functionality.
 *
 * Every pipeline stage output is cached under a content-addressed key, so
 * identical work is never sent to a provider twice:
 * - `MemoryCache`: in-process map, used by tests and short-lived runs
 * - `FileCache`: flat directory of one file per key, shared across runs
 *
 * Cache failures never fail a translation; callers log them and carry on
 * as if the entry was missing.
 */

use async_trait::async_trait;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt::Debug;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use crate::errors::CacheError;
use crate::file_utils::FileManager;

/// Extension of cache entry files
const ENTRY_EXTENSION: &str = "cache";

/// Hex SHA-256 of everything a stage output depends on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Compute the key of one stage.
    ///
    /// Fields are length-prefixed so no two field tuples hash the same input.
    pub fn compute(
        content: &str,
        source_language: &str,
        target_language: &str,
        stage_signature: &str,
        stage_index: usize,
    ) -> Self {
        let mut hasher = Sha256::new();
        for field in [content, source_language, target_language, stage_signature] {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        hasher.update((stage_index as u64).to_le_bytes());

        let hex = hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<String>();
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage for stage outputs
#[async_trait]
pub trait TranslationCache: Send + Sync + Debug {
    /// Look up a stage output
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError>;

    /// Store a stage output; visible to `get` all at once
    async fn set(&self, key: &CacheKey, value: &str) -> Result<(), CacheError>;

    /// Drop every entry
    async fn clear(&self) -> Result<(), CacheError>;
}

/// In-memory cache
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<CacheKey, String>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get cache statistics: hits, misses and hit rate
    pub fn stats(&self) -> (usize, usize, f64) {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };
        (hits, misses, hit_rate)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl TranslationCache for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError> {
        let value = self.entries.read().get(key).cloned();
        match value {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        Ok(value)
    }

    async fn set(&self, key: &CacheKey, value: &str) -> Result<(), CacheError> {
        self.entries.write().insert(key.clone(), value.to_string());
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.entries.write().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        Ok(())
    }
}

/// Size of a cache directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: u64,
}

/// Persistent cache: one `<key>.cache` file per entry in a flat directory.
///
/// Writes go through a temp file and a rename, so a concurrent reader of
/// the same key sees the old entry or the new one. Distinct keys never
/// share a lock.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Open (and create) a cache directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        FileManager::ensure_dir(&dir).map_err(|source| CacheError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.{}", key.as_str(), ENTRY_EXTENSION))
    }

    fn entries(&self) -> Result<Vec<PathBuf>, CacheError> {
        FileManager::list_files(&self.dir, ENTRY_EXTENSION).map_err(|source| CacheError::Io {
            path: self.dir.clone(),
            source,
        })
    }

    /// Number of entries and their total size
    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        let mut stats = CacheStats::default();
        for path in self.entries()? {
            let metadata = std::fs::metadata(&path).map_err(|source| CacheError::Io {
                path: path.clone(),
                source,
            })?;
            stats.entries += 1;
            stats.total_bytes += metadata.len();
        }
        Ok(stats)
    }

    /// Delete entries not modified within `max_age`; returns how many were removed
    pub fn prune_older_than(&self, max_age: Duration) -> Result<usize, CacheError> {
        let cutoff = SystemTime::now()
            .checked_sub(max_age)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let stale = FileManager::files_modified_before(&self.dir, ENTRY_EXTENSION, cutoff)
            .map_err(|source| CacheError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let mut removed = 0;
        for path in stale {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(source) => return Err(CacheError::Io { path, source }),
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl TranslationCache for FileCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError> {
        let path = self.entry_path(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }

    async fn set(&self, key: &CacheKey, value: &str) -> Result<(), CacheError> {
        let path = self.entry_path(key);
        let contents = value.as_bytes().to_vec();
        let target = path.clone();

        tokio::task::spawn_blocking(move || FileManager::write_atomic(&target, &contents))
            .await
            .map_err(|e| CacheError::Task(e.to_string()))?
            .map_err(|source| CacheError::Io { path, source })
    }

    async fn clear(&self) -> Result<(), CacheError> {
        for path in self.entries()? {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(source) => return Err(CacheError::Io { path, source }),
            }
        }
        Ok(())
    }
}
