//! Guard against circular symlinks during full-tree rebuilds.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// A directory's canonical path re-entered its own ancestry chain.
#[derive(Debug)]
pub struct CycleError {
    /// Relative path of the rejected directory.
    pub rel_path: PathBuf,
    /// Relative path of the ancestor resolving to the same canonical path.
    pub ancestor: PathBuf,
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "symlink cycle: {} resolves to the same directory as its ancestor {}",
            self.rel_path.display(),
            self.ancestor.display()
        )
    }
}

impl std::error::Error for CycleError {}

/// Tracks the canonical path of every directory admitted during one
/// rebuild and rejects any directory that resolves to the same canonical
/// path as one of its own ancestors.
///
/// Scoping the check to ancestors keeps sibling symlinks to a shared
/// directory watchable; only chains that would recurse forever are cut.
/// State lives for a single `build` call and is discarded afterwards.
#[derive(Debug, Default)]
pub struct SymlinkDetector {
    /// Relative directory path -> canonical filesystem path.
    canonical: HashMap<PathBuf, PathBuf>,
}

impl SymlinkDetector {
    /// Creates a detector with no admitted directories.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits `rel_path`, which resolved to `real`, unless an ancestor on
    /// its chain already resolved to the same canonical path.
    ///
    /// # Errors
    ///
    /// Returns a [`CycleError`] naming the offending ancestor; the caller
    /// excludes the subtree from the rebuild.
    pub fn verify_unwatched(&mut self, rel_path: &Path, real: PathBuf) -> Result<(), CycleError> {
        let mut current = rel_path;
        while let Some(parent) = current.parent() {
            let ancestor = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            if self.canonical.get(ancestor).is_some_and(|c| *c == real) {
                return Err(CycleError {
                    rel_path: rel_path.to_path_buf(),
                    ancestor: ancestor.to_path_buf(),
                });
            }
            if ancestor.as_os_str() == "." {
                break;
            }
            current = ancestor;
        }
        self.canonical.insert(rel_path.to_path_buf(), real);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_directories_are_admitted() {
        let mut detector = SymlinkDetector::new();
        detector
            .verify_unwatched(Path::new("."), PathBuf::from("/real/root"))
            .unwrap();
        detector
            .verify_unwatched(Path::new("sub"), PathBuf::from("/real/root/sub"))
            .unwrap();
        detector
            .verify_unwatched(Path::new("sub/inner"), PathBuf::from("/real/root/sub/inner"))
            .unwrap();
    }

    #[test]
    fn test_link_back_to_root_is_a_cycle() {
        let mut detector = SymlinkDetector::new();
        detector
            .verify_unwatched(Path::new("."), PathBuf::from("/real/root"))
            .unwrap();
        detector
            .verify_unwatched(Path::new("sub"), PathBuf::from("/real/root/sub"))
            .unwrap();

        let err = detector
            .verify_unwatched(Path::new("sub/loop"), PathBuf::from("/real/root"))
            .unwrap_err();
        assert_eq!(err.ancestor, PathBuf::from("."));
    }

    #[test]
    fn test_link_back_to_intermediate_ancestor_is_a_cycle() {
        let mut detector = SymlinkDetector::new();
        detector
            .verify_unwatched(Path::new("."), PathBuf::from("/r"))
            .unwrap();
        detector
            .verify_unwatched(Path::new("a"), PathBuf::from("/r/a"))
            .unwrap();
        detector
            .verify_unwatched(Path::new("a/b"), PathBuf::from("/r/a/b"))
            .unwrap();

        let err = detector
            .verify_unwatched(Path::new("a/b/c"), PathBuf::from("/r/a"))
            .unwrap_err();
        assert_eq!(err.ancestor, PathBuf::from("a"));
    }

    #[test]
    fn test_sibling_links_to_shared_directory_are_not_a_cycle() {
        let mut detector = SymlinkDetector::new();
        detector
            .verify_unwatched(Path::new("."), PathBuf::from("/r"))
            .unwrap();
        detector
            .verify_unwatched(Path::new("one"), PathBuf::from("/shared"))
            .unwrap();
        // Points at the same directory but not at an ancestor.
        detector
            .verify_unwatched(Path::new("two"), PathBuf::from("/shared"))
            .unwrap();
    }
}
