//! The diff engine: compares live directory listings against the record.
//!
//! One [`scan`](DirectoryScanner::scan) call walks a directory, classifies
//! every live child against what the record previously believed, mutates
//! the record to match, and emits one invalidation per changed path.
//! Recursion depth follows a three-state policy: the top-level call always
//! looks one level into subdirectories, automatic recursion stops at
//! already-known directories, and the `recursive` option (or the
//! `force_recursive` argument) overrides both.

use crate::fs::{FilesystemAccess, FsError};
use crate::invalidation::{InvalidationKind, InvalidationSink, ScanOptions};
use crate::record::{Entries, Entry, FileMetadata, Record};
use crate::utils::paths;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, warn};

/// Recursion state carried through nested scan calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanDepth {
    /// The caller's own scan target; children get one automatic level.
    TopLevel,
    /// One level into automatic recursion: an already-known directory is
    /// assumed unchanged and skipped, a new one keeps recursing.
    AutoRecursedOnce,
    /// Recursion forced at every level.
    Forced,
}

/// What the live filesystem reports for one listed child.
enum LiveKind {
    /// A non-directory entry and its metadata.
    File(FileMetadata),
    /// A directory, or a stat failure scanned optimistically as one.
    Dir,
    /// Named by the parent's listing but already gone when statted.
    Vanished,
}

/// Scans directories against a [`Record`] and emits invalidations.
pub struct DirectoryScanner<'a> {
    /// Filesystem the live tree is read from.
    fs: &'a dyn FilesystemAccess,
}

impl<'a> DirectoryScanner<'a> {
    /// Creates a scanner reading from the given filesystem.
    #[must_use]
    pub const fn new(fs: &'a dyn FilesystemAccess) -> Self {
        Self { fs }
    }

    /// Scans `rel_path`, updating `record` and emitting invalidations to
    /// `sink`. `force_recursive` (like `options.recursive`) makes
    /// recursion unconditional at every level.
    ///
    /// Transient races — the directory vanishing, turning into a file, or
    /// its host becoming unreachable — are handled by unsetting the path
    /// and invalidating what the record previously knew there.
    ///
    /// # Errors
    ///
    /// Any other filesystem error aborts this scan; the record stays
    /// consistent and the next scan cycle re-attempts from it.
    pub fn scan(
        &self,
        sink: &mut dyn InvalidationSink,
        record: &mut Record,
        rel_path: &Path,
        options: &ScanOptions,
        force_recursive: bool,
    ) -> Result<()> {
        let depth = if force_recursive || options.recursive {
            ScanDepth::Forced
        } else {
            ScanDepth::TopLevel
        };
        let root = record.root().to_path_buf();
        self.scan_at(sink, record, &root, rel_path, options, depth)
    }

    /// One directory pass at a given recursion depth: diff the live
    /// listing against the record, mutate the record, emit events and
    /// recurse into subdirectories per policy.
    #[allow(clippy::too_many_lines)]
    fn scan_at(
        &self,
        sink: &mut dyn InvalidationSink,
        record: &mut Record,
        root: &Path,
        rel_path: &Path,
        options: &ScanOptions,
        depth: ScanDepth,
    ) -> Result<()> {
        let (existed, mut previous) = record.dir_entries(rel_path);

        let child_depth = match depth {
            ScanDepth::Forced => ScanDepth::Forced,
            ScanDepth::TopLevel => ScanDepth::AutoRecursedOnce,
            ScanDepth::AutoRecursedOnce if existed => {
                debug!(path = %rel_path.display(), "Directory already known, not rescanning");
                return Ok(());
            }
            // A genuinely new subdirectory: keep recursing through it.
            ScanDepth::AutoRecursedOnce => ScanDepth::AutoRecursedOnce,
        };

        // Known before its children, so nested reads observe it.
        record.update_dir(rel_path);

        let sys_path = paths::resolve(root, rel_path);
        let current = match self.fs.list_children(&sys_path) {
            Ok(names) => names,
            Err(FsError::NotFound | FsError::HostUnreachable) => {
                // Vanished (or network host gone): everything previously
                // known here is now removed.
                record.unset_path(rel_path);
                self.remove_entries(sink, record, rel_path, previous, options);
                return Ok(());
            }
            Err(FsError::NotADirectory) => {
                // The directory itself is a file now. Sweep out the old
                // children, then report the file that took its place.
                record.unset_path(rel_path);
                self.remove_entries(sink, record, rel_path, previous, options);
                sink.invalidate(InvalidationKind::File, rel_path, options);
                return Ok(());
            }
            Err(err) => {
                warn!(path = %rel_path.display(), error = %err, "Scan failed");
                return Err(err)
                    .with_context(|| format!("failed to list directory {}", sys_path.display()));
            }
        };

        if !options.silence {
            debug!(
                path = %rel_path.display(),
                previous = previous.len(),
                current = current.len(),
                "Scanning directory"
            );
        }

        for name in &current {
            let child_rel = paths::join_rel(rel_path, name);
            let child_sys = paths::resolve(root, &child_rel);

            // A child can vanish between the listing and its stat; any
            // other stat failure is scanned as a directory so the nested
            // scan classifies the failure itself.
            let live = match self.fs.stat(&child_sys) {
                Ok(stat) if !stat.is_directory => LiveKind::File(FileMetadata::from(&stat)),
                Err(FsError::NotFound) => LiveKind::Vanished,
                Ok(_) | Err(_) => LiveKind::Dir,
            };

            match (live, previous.remove(name)) {
                (LiveKind::File(live), Some(Entry::File(recorded))) => {
                    record.update_file(&child_rel, &live);
                    if recorded != live {
                        sink.invalidate(InvalidationKind::File, &child_rel, options);
                    }
                }
                (LiveKind::File(live), Some(entry @ Entry::Dir)) => {
                    // Directory became a file: new type first, then the
                    // removal of everything recorded under the old one.
                    sink.invalidate(InvalidationKind::File, &child_rel, options);
                    self.remove_entry(sink, record, &child_rel, &entry, options);
                    record.update_file(&child_rel, &live);
                }
                (LiveKind::File(live), None) => {
                    record.update_file(&child_rel, &live);
                    sink.invalidate(InvalidationKind::File, &child_rel, options);
                }
                (LiveKind::Dir, Some(Entry::Dir)) => {
                    self.scan_at(sink, record, root, &child_rel, options, child_depth)?;
                }
                (LiveKind::Dir, Some(entry @ Entry::File(_))) => {
                    // File became a directory: new type first, old second.
                    sink.invalidate(InvalidationKind::Tree, &child_rel, options);
                    self.remove_entry(sink, record, &child_rel, &entry, options);
                    self.scan_at(sink, record, root, &child_rel, options, child_depth)?;
                }
                (LiveKind::Dir, None) => {
                    sink.invalidate(InvalidationKind::Tree, &child_rel, options);
                    self.scan_at(sink, record, root, &child_rel, options, child_depth)?;
                }
                // Gone already: invalidate what the record still holds
                // here, descendants included, so the removal is not lost.
                (LiveKind::Vanished, Some(entry)) => {
                    self.remove_entry(sink, record, &child_rel, &entry, options);
                }
                (LiveKind::Vanished, None) => {}
            }
        }

        // Whatever the live listing did not consume is gone.
        self.remove_entries(sink, record, rel_path, previous, options);
        Ok(())
    }

    /// Emits removal invalidations for a whole entries map and excises it
    /// from the record.
    fn remove_entries(
        &self,
        sink: &mut dyn InvalidationSink,
        record: &mut Record,
        rel_path: &Path,
        entries: Entries,
        options: &ScanOptions,
    ) {
        for (name, entry) in &entries {
            let child_rel = paths::join_rel(rel_path, name);
            self.remove_entry(sink, record, &child_rel, entry, options);
        }
    }

    /// Emits the removal invalidation for one entry and recursively
    /// excises it — and, for directories, every recorded descendant —
    /// from the record.
    ///
    /// Removal is always tree-recursive regardless of the scan's own
    /// recursion depth: a removed subtree is invalidated exactly once.
    fn remove_entry(
        &self,
        sink: &mut dyn InvalidationSink,
        record: &mut Record,
        rel_path: &Path,
        entry: &Entry,
        options: &ScanOptions,
    ) {
        sink.invalidate(entry.kind(), rel_path, options);
        if entry.is_dir() {
            let (_, children) = record.dir_entries(rel_path);
            self.remove_entries(sink, record, rel_path, children, options);
        }
        record.unset_path(rel_path);
    }
}
