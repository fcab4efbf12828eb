//! File-backed policy store with OS-level locking and atomic replacement
//!
//! The store is an explicit, injected resource: every engine component
//! receives it by handle, nothing reads a global path. Reads take a shared
//! lock, writes take an exclusive lock spanning the whole
//! read-modify-write, and every save goes through a temp file in the same
//! directory followed by a rename so a crash mid-write never corrupts the
//! live document.
//!
//! Locks are taken on a sidecar `<file>.lock` rather than the data file:
//! the data file is replaced by rename on every save, and a lock held on a
//! renamed-away inode protects nothing.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use chrono::Utc;
use fs2::FileExt;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::types::PolicyDocument;

/// Default bound on lock acquisition waits
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Staleness marker for cached reads.
///
/// `generation` advances on every save through this handle; `mtime` is the
/// data file's modification time, which advances when any other process
/// writes. A cache entry is valid only while both still match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStamp {
    generation: u64,
    mtime: Option<SystemTime>,
}

enum LockKind {
    Shared,
    Exclusive,
}

/// Held file lock, released on drop
struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Durable, concurrency-safe JSON document holding all groups
pub struct PolicyStore {
    path: PathBuf,
    lock_timeout: Duration,
    generation: AtomicU64,
}

impl PolicyStore {
    /// Create a store handle for the given document path.
    ///
    /// Nothing is touched on disk until the first read or write; a missing
    /// file reads as the seeded default hierarchy.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            generation: AtomicU64::new(0),
        }
    }

    /// Override the bound on lock acquisition waits
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Path of the live document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the current document under a shared lock.
    ///
    /// A missing file yields [`PolicyDocument::seeded`]; a file that exists
    /// but does not parse is surfaced as [`StoreError::Corrupt`], never
    /// silently defaulted.
    pub fn load(&self) -> Result<PolicyDocument> {
        let _guard = self.acquire(LockKind::Shared)?;
        let doc = self.read_unlocked()?;
        debug!(
            "Loaded policy document from {}: {} groups",
            self.path.display(),
            doc.groups.len()
        );
        Ok(doc)
    }

    /// Persist a document under an exclusive lock.
    ///
    /// Refreshes `meta.updatedAt`, then writes via temp file + fsync +
    /// rename. Prefer [`PolicyStore::update`] for read-modify-write.
    pub fn save(&self, doc: &mut PolicyDocument) -> Result<()> {
        let _guard = self.acquire(LockKind::Exclusive)?;
        self.write_unlocked(doc)
    }

    /// Run a read-modify-write transaction under the exclusive lock.
    ///
    /// The closure mutates the loaded document and reports whether it
    /// changed anything; an unchanged document is not rewritten, so no-op
    /// mutations do not bump the staleness stamp. A closure error aborts
    /// the transaction with nothing persisted.
    pub fn update(&self, f: impl FnOnce(&mut PolicyDocument) -> Result<bool>) -> Result<()> {
        let _guard = self.acquire(LockKind::Exclusive)?;
        let mut doc = self.read_unlocked()?;
        if f(&mut doc)? {
            self.write_unlocked(&mut doc)?;
        }
        Ok(())
    }

    /// Current staleness marker; see [`StoreStamp`]
    pub fn stamp(&self) -> StoreStamp {
        StoreStamp {
            generation: self.generation.load(Ordering::Acquire),
            mtime: fs::metadata(&self.path).and_then(|m| m.modified()).ok(),
        }
    }

    fn read_unlocked(&self) -> Result<PolicyDocument> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(
                    "No policy document at {}, seeding default hierarchy",
                    self.path.display()
                );
                return Ok(PolicyDocument::seeded());
            }
            Err(e) => return Err(StoreError::Io(e).into()),
        };

        let doc = serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        Ok(doc)
    }

    fn write_unlocked(&self, doc: &mut PolicyDocument) -> Result<()> {
        doc.meta.updated_at = Utc::now();

        let mut json = serde_json::to_vec_pretty(doc).map_err(StoreError::Encode)?;
        json.push(b'\n');

        let dir = self.path.parent().filter(|p| !p.as_os_str().is_empty());
        let mut tmp = match dir {
            Some(dir) => NamedTempFile::new_in(dir),
            None => NamedTempFile::new_in("."),
        }
        .map_err(StoreError::Io)?;

        tmp.write_all(&json).map_err(StoreError::Io)?;
        tmp.as_file().sync_all().map_err(StoreError::Io)?;
        tmp.persist(&self.path)
            .map_err(|e| StoreError::Io(e.error))?;

        self.generation.fetch_add(1, Ordering::Release);
        debug!(
            "Wrote policy document to {}: {} groups",
            self.path.display(),
            doc.groups.len()
        );
        Ok(())
    }

    /// Acquire the sidecar lock, retrying until the configured timeout.
    fn acquire(&self, kind: LockKind) -> Result<LockGuard> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(StoreError::Io)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.lock_path())
            .map_err(StoreError::Io)?;

        let start = Instant::now();
        loop {
            // UFCS: newer std has inherent `File::try_lock_*` methods that
            // would otherwise shadow the fs2 trait with a different return
            // type.
            let attempt = match kind {
                LockKind::Shared => FileExt::try_lock_shared(&file),
                LockKind::Exclusive => FileExt::try_lock_exclusive(&file),
            };
            match attempt {
                Ok(()) => return Ok(LockGuard { file }),
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if start.elapsed() >= self.lock_timeout {
                        return Err(StoreError::LockTimeout {
                            path: self.path.clone(),
                            waited: start.elapsed(),
                        }
                        .into());
                    }
                    thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err(e) => return Err(StoreError::Io(e).into()),
            }
        }
    }

    fn lock_path(&self) -> PathBuf {
        let mut path = self.path.clone();
        let name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("policy");
        path.set_file_name(format!("{name}.lock"));
        path
    }
}
