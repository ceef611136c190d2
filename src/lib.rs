#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! # Vigil - Filesystem Change-Detection Core
//!
//! Vigil maintains an in-memory snapshot of a watched directory tree and,
//! on each poll, computes exactly which files and subdirectories were
//! added, removed or changed type, emitting one invalidation per changed
//! path. It is the correctness fallback and bootstrap mechanism behind
//! OS-native watch backends (inotify/FSEvents/kqueue), which remain
//! outside this crate.
//!
//! ## Architecture
//!
//! - [`record`]: the snapshot tree, mutated through point updates and a
//!   breadth-first full rebuild with a symlink-cycle guard
//! - [`scanner`]: the diff engine comparing live listings against the
//!   record, with the recursion-depth policy and race handling
//! - [`fs`]: the filesystem access capability, real and in-memory
//! - [`invalidation`]: the event types and the sink trait the
//!   debouncing/callback layer implements
//! - [`snapshot`]: serialized shared access for multi-threaded backends
//!
//! ## Example Usage
//!
//! ```no_run
//! use std::path::Path;
//! use vigil::fs::LocalFilesystem;
//! use vigil::invalidation::{CollectingSink, ScanOptions};
//! use vigil::record::Record;
//! use vigil::scanner::DirectoryScanner;
//!
//! # fn main() -> anyhow::Result<()> {
//! let fs = LocalFilesystem;
//! let mut record = Record::new("/home/user/project");
//! record.build(&fs);
//!
//! // Later, one poll cycle:
//! let mut sink = CollectingSink::new();
//! let scanner = DirectoryScanner::new(&fs);
//! scanner.scan(&mut sink, &mut record, Path::new("."), &ScanOptions::default(), false)?;
//!
//! for (kind, path) in &sink.events {
//!     println!("{kind:?} changed: {}", path.display());
//! }
//! # Ok(())
//! # }
//! ```

/// Filesystem access capability and error taxonomy.
pub mod fs;

/// Invalidation events, options and the sink trait.
pub mod invalidation;

/// The snapshot tree and its rebuild machinery.
pub mod record;

/// The directory diff engine.
pub mod scanner;

/// Serialized shared access to a record.
pub mod snapshot;

/// Relative-path utilities.
pub mod utils;

pub use fs::{FilesystemAccess, FsError, LocalFilesystem, Stat};
pub use invalidation::{InvalidationKind, InvalidationSink, ScanOptions};
pub use record::{Entry, FileMetadata, Record};
pub use scanner::DirectoryScanner;
pub use snapshot::Snapshot;
