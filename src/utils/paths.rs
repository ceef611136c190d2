//! Helpers for the root-relative paths used as record keys.
//!
//! The watch root itself is always addressed as `"."`; every other path is
//! relative to it and never starts with `"./"`.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Splits a root-relative path into its parent-directory key and base name.
///
/// The parent of a top-level name is `"."` (the watch root key), and the
/// root path `"."` splits into `(".", ".")`.
#[must_use]
pub fn split_rel(rel_path: &Path) -> (PathBuf, OsString) {
    let basename = rel_path
        .file_name()
        .map_or_else(|| OsString::from("."), OsStr::to_os_string);
    let dirname = match rel_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    (dirname, basename)
}

/// Joins a child name onto a relative directory key.
///
/// Children of the root are addressed by bare name, not `"./name"`.
#[must_use]
pub fn join_rel(dir: &Path, name: &OsStr) -> PathBuf {
    if dir.as_os_str() == "." {
        PathBuf::from(name)
    } else {
        dir.join(name)
    }
}

/// Resolves a root-relative path against the absolute watch root.
#[must_use]
pub fn resolve(root: &Path, rel_path: &Path) -> PathBuf {
    if rel_path.as_os_str() == "." {
        root.to_path_buf()
    } else {
        root.join(rel_path)
    }
}
