//! In-memory snapshot of a watched directory tree.
//!
//! The [`Record`] maps every known relative directory path to its entries
//! map; the watch root is the key `"."`. A directory's children live
//! under the directory's own top-level key, not nested inside the
//! parent's map, which keeps point updates O(1) in tree depth.

/// Symlink-cycle guard used by [`Record::build`].
pub mod symlink_detector;

use crate::fs::{FilesystemAccess, FsError, Stat};
use crate::invalidation::InvalidationKind;
use crate::utils::paths;
use rayon::prelude::*;
use std::collections::{HashMap, VecDeque};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use symlink_detector::SymlinkDetector;
use tracing::debug;

/// Metadata recorded for a file entry.
///
/// Attributes are individually optional; an update merges present
/// attributes over recorded ones and leaves absent ones untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileMetadata {
    /// Last modification time.
    pub mtime: Option<SystemTime>,
    /// Permission bits.
    pub mode: Option<u32>,
}

impl FileMetadata {
    /// Whether no attribute has been recorded.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.mtime.is_none() && self.mode.is_none()
    }

    /// Merges `newer` into `self`: present attributes override, absent
    /// attributes keep their recorded value.
    pub const fn merge(&mut self, newer: &Self) {
        if newer.mtime.is_some() {
            self.mtime = newer.mtime;
        }
        if newer.mode.is_some() {
            self.mode = newer.mode;
        }
    }
}

impl From<&Stat> for FileMetadata {
    fn from(stat: &Stat) -> Self {
        Self {
            mtime: stat.mtime,
            mode: stat.mode,
        }
    }
}

/// A named child of a recorded directory.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    /// A file and its recorded metadata.
    File(FileMetadata),
    /// A subdirectory placeholder; its children live under the
    /// subdirectory's own top-level key.
    Dir,
}

impl Entry {
    /// Whether this entry is a directory placeholder.
    #[must_use]
    pub const fn is_dir(&self) -> bool {
        matches!(self, Self::Dir)
    }

    /// The invalidation kind reported when this entry disappears.
    #[must_use]
    pub const fn kind(&self) -> InvalidationKind {
        match self {
            Self::File(_) => InvalidationKind::File,
            Self::Dir => InvalidationKind::Tree,
        }
    }
}

/// Entries map of one recorded directory: child name -> entry.
pub type Entries = HashMap<OsString, Entry>;

/// Outcome of classifying one rebuild queue candidate.
#[derive(Debug)]
enum Classified {
    /// Listing succeeded: a directory with these children.
    Dir {
        /// Canonical path, for the cycle guard.
        canonical: PathBuf,
        /// Direct child names.
        children: Vec<OsString>,
    },
    /// Listing said not-a-directory and the stat succeeded.
    File(FileMetadata),
    /// Unreadable or vanished; left out of the tree entirely.
    Excluded,
}

/// The persistent snapshot for one watched root.
///
/// Mutated only through [`update_file`](Record::update_file),
/// [`update_dir`](Record::update_dir), [`unset_path`](Record::unset_path)
/// and [`build`](Record::build); the `&mut` receivers give the
/// single-writer discipline the scanner relies on.
#[derive(Debug)]
pub struct Record {
    /// Absolute path of the watched root.
    root: PathBuf,
    /// Relative directory path -> entries map. `"."` is always present.
    tree: HashMap<PathBuf, Entries>,
}

impl Record {
    /// Creates an empty record bound to one absolute watch root.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let mut tree = HashMap::new();
        tree.insert(PathBuf::from("."), Entries::new());
        Self {
            root: root.into(),
            tree,
        }
    }

    /// The absolute watch root this record describes.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Merges `data` into the file entry at `rel_path`, creating it (and
    /// its parent's entries map) as needed. An entry previously recorded
    /// as a directory is replaced outright.
    ///
    /// Returns whether any entry already existed under that name.
    pub fn update_file(&mut self, rel_path: &Path, data: &FileMetadata) -> bool {
        let (dirname, basename) = paths::split_rel(rel_path);
        let entries = self.tree.entry(dirname).or_default();
        match entries.get_mut(&basename) {
            Some(Entry::File(existing)) => {
                existing.merge(data);
                true
            }
            Some(existing @ Entry::Dir) => {
                *existing = Entry::File(data.clone());
                true
            }
            None => {
                entries.insert(basename, Entry::File(data.clone()));
                false
            }
        }
    }

    /// Records `rel_path` as a known directory: a placeholder in its
    /// parent's entries map plus its own (possibly empty) top-level key.
    /// A file entry under the same name is replaced.
    ///
    /// Returns whether the placeholder already existed.
    pub fn update_dir(&mut self, rel_path: &Path) -> bool {
        let (dirname, basename) = paths::split_rel(rel_path);
        self.tree.entry(rel_path.to_path_buf()).or_default();
        if basename.to_str() == Some(".") {
            // The root never appears as a child of itself.
            return true;
        }
        let entries = self.tree.entry(dirname).or_default();
        matches!(entries.insert(basename, Entry::Dir), Some(Entry::Dir))
    }

    /// Removes `rel_path` from its parent's entries map and drops the
    /// path's own top-level key.
    ///
    /// Descendant keys are left alone; the scanner unsets them
    /// individually when it invalidates a removed subtree. A parent the
    /// record never knew makes this a no-op.
    pub fn unset_path(&mut self, rel_path: &Path) {
        let (dirname, basename) = paths::split_rel(rel_path);
        let Some(entries) = self.tree.get_mut(&dirname) else {
            return;
        };
        entries.remove(&basename);
        self.tree.remove(rel_path);
    }

    /// Returns a copy of the recorded file attributes for `rel_path`, or
    /// empty metadata if nothing (or a directory) is recorded there.
    ///
    /// Lazily materializes the parent directory's entries map, the same
    /// auto-created-on-read contract as [`dir_entries`](Record::dir_entries).
    pub fn file_data(&mut self, rel_path: &Path) -> FileMetadata {
        let (dirname, basename) = paths::split_rel(rel_path);
        let entries = self.tree.entry(dirname).or_default();
        match entries.get(&basename) {
            Some(Entry::File(meta)) => meta.clone(),
            _ => FileMetadata::default(),
        }
    }

    /// Returns whether `rel_path` was already known as a directory, plus
    /// a copy of its current entries map (materialized empty when new).
    pub fn dir_entries(&mut self, rel_path: &Path) -> (bool, Entries) {
        let key = rel_path.to_path_buf();
        let existed = self.tree.contains_key(&key);
        let entries = self.tree.entry(key).or_default().clone();
        (existed, entries)
    }

    /// Replaces the whole tree with a fresh full-depth traversal of the
    /// watch root.
    ///
    /// Breadth-first: every listed child becomes a queue candidate and is
    /// classified when dequeued — a successful listing makes it a
    /// directory, a not-a-directory failure makes it a file (covering
    /// the listing race where a recorded directory is already a file
    /// again). Candidates that hit a symlink cycle or any other error
    /// are excluded from the tree. Listing and stat I/O for one queue
    /// level runs on the rayon pool; tree mutation stays on the caller's
    /// thread.
    pub fn build(&mut self, fs: &dyn FilesystemAccess) {
        self.tree.clear();
        self.tree.insert(PathBuf::from("."), Entries::new());

        let mut detector = SymlinkDetector::new();
        let mut remaining = VecDeque::new();
        remaining.push_back(PathBuf::from("."));

        while !remaining.is_empty() {
            let batch: Vec<PathBuf> = remaining.drain(..).collect();
            let classified: Vec<(PathBuf, Classified)> = batch
                .into_par_iter()
                .map(|rel| {
                    let sys_path = paths::resolve(&self.root, &rel);
                    let outcome = Self::classify(fs, &sys_path);
                    (rel, outcome)
                })
                .collect();

            for (rel, outcome) in classified {
                match outcome {
                    Classified::Dir {
                        canonical,
                        children,
                    } => {
                        if let Err(cycle) = detector.verify_unwatched(&rel, canonical) {
                            debug!(error = %cycle, "Excluding symlink cycle from rebuild");
                            continue;
                        }
                        if rel.as_os_str() != "." {
                            self.update_dir(&rel);
                        }
                        for name in children {
                            remaining.push_back(paths::join_rel(&rel, &name));
                        }
                    }
                    Classified::File(meta) => {
                        if rel.as_os_str() != "." {
                            self.update_file(&rel, &meta);
                        }
                    }
                    Classified::Excluded => {
                        debug!(path = %rel.display(), "Excluding unreadable entry from rebuild");
                    }
                }
            }
        }
    }

    /// Classifies one rebuild candidate by attempting to list it.
    fn classify(fs: &dyn FilesystemAccess, sys_path: &Path) -> Classified {
        match fs.list_children(sys_path) {
            Ok(children) => match fs.canonicalize(sys_path) {
                Ok(canonical) => Classified::Dir {
                    canonical,
                    children,
                },
                Err(_) => Classified::Excluded,
            },
            Err(FsError::NotADirectory) => match fs.stat(sys_path) {
                Ok(stat) => Classified::File(FileMetadata::from(&stat)),
                Err(_) => Classified::Excluded,
            },
            Err(_) => Classified::Excluded,
        }
    }
}
