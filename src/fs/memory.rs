//! Programmable in-memory [`FilesystemAccess`] implementation.
//!
//! Lets tests and bootstrap tooling script directory layouts, mtimes and
//! injected failures without touching the disk. Interior mutability makes
//! it usable through the shared references the scanner takes, so a test
//! can mutate the fake tree between two scans of the same record.

use super::{FilesystemAccess, FsError, Stat};
use std::collections::{BTreeSet, HashMap};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime};

/// Failure to report for a path instead of its real lookup result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedError {
    /// Report the path as missing.
    NotFound,
    /// Report the path as a non-directory.
    NotADirectory,
    /// Report the path's host as unreachable.
    HostUnreachable,
    /// Report access as denied.
    PermissionDenied,
    /// Report an unclassified I/O failure.
    Io,
}

impl InjectedError {
    /// Builds the [`FsError`] this injection stands for.
    fn materialize(self) -> FsError {
        match self {
            Self::NotFound => FsError::NotFound,
            Self::NotADirectory => FsError::NotADirectory,
            Self::HostUnreachable => FsError::HostUnreachable,
            Self::PermissionDenied => FsError::PermissionDenied,
            Self::Io => FsError::Other(io::Error::other("injected failure")),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    /// Directory path -> child names, sorted for deterministic listings.
    dirs: HashMap<PathBuf, BTreeSet<OsString>>,
    /// File path -> its stat result.
    files: HashMap<PathBuf, Stat>,
    /// Canonical-path overrides, used to model symlinked directories.
    canonical: HashMap<PathBuf, PathBuf>,
    /// Paths whose operations fail with the injected error.
    errors: HashMap<PathBuf, InjectedError>,
}

/// In-memory filesystem double.
#[derive(Debug, Default)]
pub struct MemoryFilesystem {
    inner: Mutex<Inner>,
}

impl MemoryFilesystem {
    /// Creates an empty fake filesystem.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a directory, creating every missing ancestor.
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut inner = self.lock();
        let path = path.as_ref();
        for ancestor in path.ancestors().collect::<Vec<_>>().into_iter().rev() {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            inner.dirs.entry(ancestor.to_path_buf()).or_default();
            Self::link_to_parent(&mut inner, ancestor);
        }
    }

    /// Registers a file with the given mtime and mode `0o644`.
    ///
    /// The parent directory must have been registered first.
    pub fn add_file(&self, path: impl AsRef<Path>, mtime: SystemTime) {
        self.add_file_stat(
            path,
            Stat {
                is_directory: false,
                mtime: Some(mtime),
                mode: Some(0o644),
            },
        );
    }

    /// Registers a file with explicit stat metadata.
    pub fn add_file_stat(&self, path: impl AsRef<Path>, stat: Stat) {
        let mut inner = self.lock();
        let path = path.as_ref();
        inner.files.insert(path.to_path_buf(), stat);
        Self::link_to_parent(&mut inner, path);
    }

    /// Removes a path (and, for directories, its registered subtree).
    pub fn remove(&self, path: impl AsRef<Path>) {
        let mut inner = self.lock();
        let path = path.as_ref();
        if let Some((parent, name)) = path.parent().zip(path.file_name())
            && let Some(children) = inner.dirs.get_mut(parent)
        {
            children.remove(name);
        }
        inner.files.retain(|p, _| !p.starts_with(path));
        inner.dirs.retain(|p, _| !p.starts_with(path));
    }

    /// Overrides the canonical path reported for `path`, modelling a
    /// symlink that resolves to `target`.
    pub fn set_canonical(&self, path: impl AsRef<Path>, target: impl AsRef<Path>) {
        self.lock().canonical.insert(
            path.as_ref().to_path_buf(),
            target.as_ref().to_path_buf(),
        );
    }

    /// Makes every operation on `path` fail with the given error.
    pub fn inject_error(&self, path: impl AsRef<Path>, error: InjectedError) {
        self.lock()
            .errors
            .insert(path.as_ref().to_path_buf(), error);
    }

    /// Clears a previously injected error.
    pub fn clear_error(&self, path: impl AsRef<Path>) {
        self.lock().errors.remove(path.as_ref());
    }

    /// Adds `path`'s base name to its parent's child listing, if the
    /// parent is a registered directory.
    fn link_to_parent(inner: &mut Inner, path: &Path) {
        if let Some((parent, name)) = path.parent().zip(path.file_name())
            && let Some(children) = inner.dirs.get_mut(parent)
        {
            children.insert(name.to_os_string());
        }
    }

    /// Locks the fake tree, recovering from poisoning (a test that
    /// panicked mid-mutation should not cascade).
    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Convenience for building deterministic mtimes in tests.
#[must_use]
pub fn mtime_secs(secs: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
}

impl FilesystemAccess for MemoryFilesystem {
    fn list_children(&self, path: &Path) -> Result<Vec<OsString>, FsError> {
        let inner = self.lock();
        if let Some(error) = inner.errors.get(path) {
            return Err(error.materialize());
        }
        if let Some(children) = inner.dirs.get(path) {
            return Ok(children.iter().cloned().collect());
        }
        if inner.files.contains_key(path) {
            return Err(FsError::NotADirectory);
        }
        Err(FsError::NotFound)
    }

    fn stat(&self, path: &Path) -> Result<Stat, FsError> {
        let inner = self.lock();
        if let Some(error) = inner.errors.get(path) {
            return Err(error.materialize());
        }
        if let Some(stat) = inner.files.get(path) {
            return Ok(*stat);
        }
        if inner.dirs.contains_key(path) {
            return Ok(Stat {
                is_directory: true,
                mtime: None,
                mode: None,
            });
        }
        Err(FsError::NotFound)
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf, FsError> {
        let inner = self.lock();
        if let Some(error) = inner.errors.get(path) {
            return Err(error.materialize());
        }
        if let Some(target) = inner.canonical.get(path) {
            return Ok(target.clone());
        }
        if inner.dirs.contains_key(path) || inner.files.contains_key(path) {
            return Ok(path.to_path_buf());
        }
        Err(FsError::NotFound)
    }
}
