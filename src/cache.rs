// src/cache.rs

//! Local package cache
//!
//! A package is present in the cache iff `<pkgs_dir>/<canonical>.tar.bz2`
//! exists. Archives only ever appear under that name through an atomic
//! rename of a fully written temporary file, so an interrupted transfer
//! can never be mistaken for a cached package.
//!
//! Check-fetch-mark for one canonical name runs under an exclusive
//! advisory lock on `<canonical>.lock`, which serialises concurrent
//! envpkg processes fetching the same package.
//!
//! Lock files are left in place after use, one per package ever stored.
//! Unlinking one while another process blocks on it would let a third
//! process lock a fresh file at the same path and fetch concurrently.

use crate::error::{Error, Result};
use crate::packages::PackageRecord;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const PARTIAL_PREFIX: &str = ".partial-";
const LOCK_SUFFIX: &str = ".lock";

/// Outcome of storing one package
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// The archive was transferred and is now present
    Fetched,
    /// The archive was already present (possibly fetched by another process)
    AlreadyPresent,
}

/// Tracks which package archives are present locally
#[derive(Debug, Clone)]
pub struct CacheStore {
    pkgs_dir: PathBuf,
}

impl CacheStore {
    /// Open the cache rooted at `pkgs_dir`, creating the directory if needed
    pub fn open(pkgs_dir: impl Into<PathBuf>) -> Result<Self> {
        let pkgs_dir = pkgs_dir.into();
        fs::create_dir_all(&pkgs_dir).map_err(|e| {
            Error::IoError(format!(
                "Failed to create package cache {}: {}",
                pkgs_dir.display(),
                e
            ))
        })?;
        Ok(Self { pkgs_dir })
    }

    pub fn pkgs_dir(&self) -> &Path {
        &self.pkgs_dir
    }

    /// Final location of a record's archive
    pub fn archive_path(&self, record: &PackageRecord) -> PathBuf {
        self.pkgs_dir.join(record.archive_name())
    }

    /// Lock file guarding a record's cache entry, never removed
    fn lock_path(&self, record: &PackageRecord) -> PathBuf {
        self.pkgs_dir
            .join(format!("{}{}", record.canonical_name(), LOCK_SUFFIX))
    }

    /// Whether the archive for `record` is present
    pub fn is_present(&self, record: &PackageRecord) -> bool {
        self.archive_path(record).is_file()
    }

    /// Make `record` present, running `fetch` unless it already is
    ///
    /// With `replace` set, `fetch` runs even when the archive is present and
    /// the new archive takes the old one's place.
    ///
    /// `fetch` receives a temporary path inside the cache directory to write
    /// the archive to. The archive is renamed into place only if `fetch`
    /// returns `Ok`; on error the temporary file is removed and the cache is
    /// unchanged, including any archive that was already present.
    pub fn store_with<F>(&self, record: &PackageRecord, replace: bool, fetch: F) -> Result<StoreOutcome>
    where
        F: FnOnce(&Path) -> Result<()>,
    {
        let _lock = EntryLock::acquire(&self.lock_path(record))?;

        if self.is_present(record) {
            if !replace {
                debug!("{} already cached", record);
                return Ok(StoreOutcome::AlreadyPresent);
            }
            debug!("Replacing cached {}", record);
        }

        let partial = tempfile::Builder::new()
            .prefix(&format!("{}{}-", PARTIAL_PREFIX, record.canonical_name()))
            .tempfile_in(&self.pkgs_dir)
            .map_err(|e| {
                Error::IoError(format!(
                    "Failed to create temporary file in {}: {}",
                    self.pkgs_dir.display(),
                    e
                ))
            })?;

        fetch(partial.path())?;

        let dest = self.archive_path(record);
        partial.persist(&dest).map_err(|e| {
            Error::IoError(format!("Failed to move archive to {}: {}", dest.display(), e))
        })?;

        debug!("Cached {} at {}", record, dest.display());
        Ok(StoreOutcome::Fetched)
    }

    /// Remove temporary files left behind by interrupted transfers
    ///
    /// Files belonging to a transfer still holding its lock are kept.
    /// Returns the number of files removed.
    pub fn clean_partial(&self) -> Result<usize> {
        let mut removed = 0;

        for entry in fs::read_dir(&self.pkgs_dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some(rest) = name.strip_prefix(PARTIAL_PREFIX) else {
                continue;
            };
            // `<canonical>-<random>`
            let Some((canonical, _)) = rest.rsplit_once('-') else {
                continue;
            };

            let lock_path = self.pkgs_dir.join(format!("{}{}", canonical, LOCK_SUFFIX));
            match EntryLock::try_acquire(&lock_path)? {
                Some(_lock) => match fs::remove_file(entry.path()) {
                    Ok(()) => {
                        debug!("Removed stale partial download {}", name);
                        removed += 1;
                    }
                    Err(e) => warn!("Failed to remove {}: {}", name, e),
                },
                None => debug!("{} is still being written", name),
            }
        }

        Ok(removed)
    }
}

/// Exclusive advisory lock on one cache entry, released on drop
struct EntryLock {
    file: File,
}

impl EntryLock {
    fn open(path: &Path) -> Result<File> {
        OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(|e| Error::IoError(format!("Failed to open lock {}: {}", path.display(), e)))
    }

    /// Block until the lock is held
    fn acquire(path: &Path) -> Result<Self> {
        let file = Self::open(path)?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.kind() != std::io::ErrorKind::WouldBlock {
                return Err(Error::IoError(format!(
                    "Failed to lock {}: {}",
                    path.display(),
                    e
                )));
            }
            debug!("Waiting for lock {}", path.display());
            file.lock_exclusive().map_err(|e| {
                Error::IoError(format!("Failed to lock {}: {}", path.display(), e))
            })?;
        }

        Ok(Self { file })
    }

    /// Take the lock if nobody else holds it
    fn try_acquire(path: &Path) -> Result<Option<Self>> {
        let file = Self::open(path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { file })),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(Error::IoError(format!(
                "Failed to try-lock {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

impl Drop for EntryLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
