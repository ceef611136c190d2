//! Invalidation events emitted by the scanner.
//!
//! The scanner reports changes as ordered `invalidate` calls on a sink;
//! the debouncing/callback layer that turns invalidations into user
//! events lives outside this crate and only implements
//! [`InvalidationSink`].

use std::path::{Path, PathBuf};

/// What a single invalidation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationKind {
    /// A single file whose content or metadata must be re-examined.
    File,
    /// A directory whose contents must be re-examined recursively.
    Tree,
}

/// Caller-supplied options forwarded unchanged with every invalidation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOptions {
    /// Suppress the per-scan diagnostic trace. Set by bootstrap passes
    /// that record initial state without wanting scan noise.
    pub silence: bool,
    /// Force recursion into every subdirectory, known or not.
    pub recursive: bool,
}

/// Consumer of the scanner's invalidation stream.
///
/// Within one scan, the two events for a type-flipped path arrive in the
/// order guaranteed by the scanner; no cross-path ordering is promised.
pub trait InvalidationSink {
    /// Receives one invalidation for `rel_path`.
    fn invalidate(&mut self, kind: InvalidationKind, rel_path: &Path, options: &ScanOptions);
}

/// Sink that records every event in arrival order.
///
/// Used by tests and by bootstrap code that wants to inspect what a
/// recording pass touched.
#[derive(Debug, Default)]
pub struct CollectingSink {
    /// Events in the order they were emitted.
    pub events: Vec<(InvalidationKind, PathBuf)>,
}

impl CollectingSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events recorded for one path, in order.
    #[must_use]
    pub fn events_for(&self, rel_path: &Path) -> Vec<InvalidationKind> {
        self.events
            .iter()
            .filter(|(_, p)| p == rel_path)
            .map(|(k, _)| *k)
            .collect()
    }
}

impl InvalidationSink for CollectingSink {
    fn invalidate(&mut self, kind: InvalidationKind, rel_path: &Path, _options: &ScanOptions) {
        self.events.push((kind, rel_path.to_path_buf()));
    }
}
