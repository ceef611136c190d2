//! Filesystem access capability consumed by the record and scanner.
//!
//! All directory listings and stats go through the [`FilesystemAccess`]
//! trait so that scan and rebuild logic can be exercised against the
//! in-memory [`memory::MemoryFilesystem`] as well as the real disk.
//! Errors are classified into the small [`FsError`] taxonomy the scanner
//! matches on structurally; everything it does not recognize stays an
//! opaque [`FsError::Other`].

/// In-memory filesystem double with error injection.
pub mod memory;

use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Metadata reported by [`FilesystemAccess::stat`].
///
/// Stats never follow symlinks: a symlink is reported with
/// `is_directory == false` regardless of its target, so symlinked
/// directories are recorded as plain file entries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stat {
    /// Whether the path is a directory.
    pub is_directory: bool,
    /// Last modification time, when the filesystem reports one.
    pub mtime: Option<SystemTime>,
    /// Permission bits, when the filesystem reports them.
    pub mode: Option<u32>,
}

/// Classified filesystem errors.
///
/// The first three variants are the transient races the scanner recovers
/// from locally; `PermissionDenied` and `Other` are fatal for the scan
/// that hits them.
#[derive(Debug)]
pub enum FsError {
    /// The path does not exist.
    NotFound,
    /// The path exists but is not a directory.
    NotADirectory,
    /// A network-mounted path whose host is down or unreachable.
    HostUnreachable,
    /// Access to the path was denied.
    PermissionDenied,
    /// Any other system error.
    Other(io::Error),
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "path not found"),
            Self::NotADirectory => write!(f, "not a directory"),
            Self::HostUnreachable => write!(f, "host unreachable"),
            Self::PermissionDenied => write!(f, "permission denied"),
            Self::Other(err) => write!(f, "filesystem error: {err}"),
        }
    }
}

impl std::error::Error for FsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Other(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for FsError {
    fn from(err: io::Error) -> Self {
        // Raw codes first: ErrorKind has no stable mapping for ENOTDIR
        // and the EHOST* family on all supported toolchains.
        match err.raw_os_error() {
            Some(libc::ENOENT) => Self::NotFound,
            Some(libc::ENOTDIR) => Self::NotADirectory,
            Some(libc::EHOSTDOWN | libc::EHOSTUNREACH) => Self::HostUnreachable,
            Some(libc::EACCES | libc::EPERM) => Self::PermissionDenied,
            _ => match err.kind() {
                io::ErrorKind::NotFound => Self::NotFound,
                io::ErrorKind::PermissionDenied => Self::PermissionDenied,
                _ => Self::Other(err),
            },
        }
    }
}

/// Capability for reading directory listings and entry metadata.
///
/// `Send + Sync` so rebuild work can fan stat calls out to a thread pool
/// while record mutation stays serialized.
pub trait FilesystemAccess: Send + Sync {
    /// Returns the names of the direct children of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::NotADirectory`] when `path` is a file, which is
    /// how rebuild classifies queue candidates.
    fn list_children(&self, path: &Path) -> Result<Vec<OsString>, FsError>;

    /// Returns metadata for `path` without following symlinks.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::NotFound`] when the entry vanished since it was
    /// listed.
    fn stat(&self, path: &Path) -> Result<Stat, FsError>;

    /// Resolves `path` to its canonical, symlink-free form.
    ///
    /// # Errors
    ///
    /// Returns an error when any component cannot be resolved.
    fn canonicalize(&self, path: &Path) -> Result<PathBuf, FsError>;
}

/// Production [`FilesystemAccess`] backed by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFilesystem;

impl FilesystemAccess for LocalFilesystem {
    fn list_children(&self, path: &Path) -> Result<Vec<OsString>, FsError> {
        let mut names = Vec::new();
        for dent in std::fs::read_dir(path)? {
            names.push(dent?.file_name());
        }
        Ok(names)
    }

    fn stat(&self, path: &Path) -> Result<Stat, FsError> {
        let meta = std::fs::symlink_metadata(path)?;
        #[cfg(unix)]
        let mode = {
            use std::os::unix::fs::PermissionsExt;
            Some(meta.permissions().mode() & 0o7777)
        };
        #[cfg(not(unix))]
        let mode = None;
        Ok(Stat {
            is_directory: meta.is_dir(),
            mtime: meta.modified().ok(),
            mode,
        })
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf, FsError> {
        Ok(std::fs::canonicalize(path)?)
    }
}
