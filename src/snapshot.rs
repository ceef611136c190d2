//! Serialized access to one watch root's record.
//!
//! The record is a single piece of mutable shared state: one mutation or
//! rebuild may be in flight at a time. [`Snapshot`] enforces that by
//! routing every scan, rebuild and read through one mutex, held for the
//! duration of a single call; a scan or rebuild keeps it across all of
//! its filesystem I/O, so concurrent callers queue behind it. Callers
//! that own their record exclusively can use [`DirectoryScanner`]
//! directly; the snapshot exists for watch backends that share it across
//! threads.

use crate::fs::FilesystemAccess;
use crate::invalidation::{InvalidationSink, ScanOptions};
use crate::record::{Entries, FileMetadata, Record};
use crate::scanner::DirectoryScanner;
use anyhow::{Result, anyhow};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Shared, serialized handle to a [`Record`] and its filesystem.
pub struct Snapshot {
    /// The record, behind the single-writer lock.
    record: Mutex<Record>,
    /// Filesystem the record describes.
    fs: Arc<dyn FilesystemAccess>,
}

impl Snapshot {
    /// Creates a snapshot for the given absolute watch root.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, fs: Arc<dyn FilesystemAccess>) -> Self {
        Self {
            record: Mutex::new(Record::new(root)),
            fs,
        }
    }

    /// Scans `rel_path` against the record, emitting invalidations to
    /// `sink`. Holds the record lock for the whole scan.
    ///
    /// # Errors
    ///
    /// Returns an error on an unexpected filesystem failure (the scan's
    /// fatal path) or when the record lock was poisoned by a panicking
    /// scan on another thread.
    pub fn scan(
        &self,
        sink: &mut dyn InvalidationSink,
        rel_path: &Path,
        options: &ScanOptions,
        force_recursive: bool,
    ) -> Result<()> {
        let mut record = self.lock()?;
        DirectoryScanner::new(self.fs.as_ref()).scan(
            sink,
            &mut record,
            rel_path,
            options,
            force_recursive,
        )
    }

    /// Rebuilds the whole record from a fresh full-depth traversal,
    /// serialized against in-flight scans by the same lock.
    ///
    /// # Errors
    ///
    /// Returns an error only when the record lock was poisoned.
    pub fn rebuild(&self) -> Result<()> {
        let mut record = self.lock()?;
        record.build(self.fs.as_ref());
        Ok(())
    }

    /// Returns whether `rel_path` is a known directory and a copy of its
    /// entries, for bootstrap callers seeding initial state.
    ///
    /// # Errors
    ///
    /// Returns an error only when the record lock was poisoned.
    pub fn dir_entries(&self, rel_path: &Path) -> Result<(bool, Entries)> {
        Ok(self.lock()?.dir_entries(rel_path))
    }

    /// Returns a copy of the recorded file attributes for `rel_path`.
    ///
    /// # Errors
    ///
    /// Returns an error only when the record lock was poisoned.
    pub fn file_data(&self, rel_path: &Path) -> Result<FileMetadata> {
        Ok(self.lock()?.file_data(rel_path))
    }

    /// Acquires the single-writer lock on the record.
    fn lock(&self) -> Result<MutexGuard<'_, Record>> {
        self.record
            .lock()
            .map_err(|_| anyhow!("record lock poisoned by a panicked scan"))
    }
}
