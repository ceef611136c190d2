//! End-to-end scanner behavior against real directory trees.

use anyhow::Result;
use filetime::FileTime;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use vigil::fs::LocalFilesystem;
use vigil::invalidation::{CollectingSink, InvalidationKind, ScanOptions};
use vigil::record::Record;
use vigil::scanner::DirectoryScanner;

fn scan(record: &mut Record, rel_path: &str, recursive: bool) -> Result<CollectingSink> {
    let fs = LocalFilesystem;
    let mut sink = CollectingSink::new();
    let options = ScanOptions {
        silence: false,
        recursive,
    };
    DirectoryScanner::new(&fs).scan(&mut sink, record, Path::new(rel_path), &options, false)?;
    Ok(sink)
}

#[test]
fn test_initial_scan_reports_all_entries() -> Result<()> {
    let temp = TempDir::new()?;
    fs::create_dir(temp.path().join("sub"))?;
    fs::write(temp.path().join("sub/inner.rb"), "x")?;
    fs::write(temp.path().join("top.rb"), "y")?;

    let mut record = Record::new(temp.path());
    let sink = scan(&mut record, ".", false)?;

    assert!(sink
        .events
        .contains(&(InvalidationKind::Tree, PathBuf::from("sub"))));
    assert!(sink
        .events
        .contains(&(InvalidationKind::File, PathBuf::from("top.rb"))));
    assert!(sink
        .events
        .contains(&(InvalidationKind::File, PathBuf::from("sub/inner.rb"))));

    Ok(())
}

#[test]
fn test_second_scan_of_unchanged_tree_is_silent() -> Result<()> {
    let temp = TempDir::new()?;
    fs::create_dir(temp.path().join("sub"))?;
    fs::write(temp.path().join("sub/inner.rb"), "x")?;
    fs::write(temp.path().join("top.rb"), "y")?;

    let mut record = Record::new(temp.path());
    scan(&mut record, ".", false)?;

    let sink = scan(&mut record, ".", false)?;
    assert!(sink.events.is_empty(), "unexpected: {:?}", sink.events);

    Ok(())
}

#[test]
fn test_touched_file_is_invalidated() -> Result<()> {
    let temp = TempDir::new()?;
    let file = temp.path().join("watched.rb");
    fs::write(&file, "v1")?;

    let mut record = Record::new(temp.path());
    scan(&mut record, ".", false)?;

    filetime::set_file_mtime(&file, FileTime::from_unix_time(1_000_000, 0))?;

    let sink = scan(&mut record, ".", false)?;
    assert_eq!(
        sink.events,
        vec![(InvalidationKind::File, PathBuf::from("watched.rb"))]
    );

    Ok(())
}

#[test]
fn test_added_and_removed_entries_between_scans() -> Result<()> {
    let temp = TempDir::new()?;
    fs::create_dir(temp.path().join("dir1"))?;
    fs::create_dir(temp.path().join("dir2"))?;

    let mut record = Record::new(temp.path());
    scan(&mut record, ".", false)?;

    fs::remove_dir(temp.path().join("dir1"))?;
    fs::create_dir(temp.path().join("dir3"))?;

    let sink = scan(&mut record, ".", false)?;
    assert!(sink
        .events
        .contains(&(InvalidationKind::Tree, PathBuf::from("dir1"))));
    assert!(sink
        .events
        .contains(&(InvalidationKind::Tree, PathBuf::from("dir3"))));
    assert!(sink.events_for(Path::new("dir2")).is_empty());
    assert_eq!(sink.events.len(), 2);

    Ok(())
}

#[test]
fn test_removed_directory_invalidates_its_recorded_subtree() -> Result<()> {
    let temp = TempDir::new()?;
    fs::create_dir_all(temp.path().join("gone/deep"))?;
    fs::write(temp.path().join("gone/a.rb"), "a")?;
    fs::write(temp.path().join("gone/deep/b.rb"), "b")?;

    let mut record = Record::new(temp.path());
    scan(&mut record, ".", false)?;

    fs::remove_dir_all(temp.path().join("gone"))?;

    let sink = scan(&mut record, ".", false)?;
    assert!(sink
        .events
        .contains(&(InvalidationKind::Tree, PathBuf::from("gone"))));
    assert!(sink
        .events
        .contains(&(InvalidationKind::File, PathBuf::from("gone/a.rb"))));
    assert!(sink
        .events
        .contains(&(InvalidationKind::Tree, PathBuf::from("gone/deep"))));
    assert!(sink
        .events
        .contains(&(InvalidationKind::File, PathBuf::from("gone/deep/b.rb"))));

    // Nothing of the subtree survives in the record.
    let (existed, _) = record.dir_entries(Path::new("gone"));
    assert!(!existed);
    let (existed, _) = record.dir_entries(Path::new("gone/deep"));
    assert!(!existed);

    Ok(())
}

#[test]
fn test_directory_replaced_by_file_on_disk() -> Result<()> {
    let temp = TempDir::new()?;
    fs::create_dir(temp.path().join("ambiguous"))?;

    let mut record = Record::new(temp.path());
    scan(&mut record, ".", false)?;

    fs::remove_dir(temp.path().join("ambiguous"))?;
    fs::write(temp.path().join("ambiguous"), "now a file")?;

    let sink = scan(&mut record, ".", false)?;
    assert_eq!(
        sink.events_for(Path::new("ambiguous")),
        vec![InvalidationKind::File, InvalidationKind::Tree]
    );

    Ok(())
}

#[test]
fn test_file_replaced_by_directory_on_disk() -> Result<()> {
    let temp = TempDir::new()?;
    fs::write(temp.path().join("ambiguous"), "a file")?;

    let mut record = Record::new(temp.path());
    scan(&mut record, ".", false)?;

    fs::remove_file(temp.path().join("ambiguous"))?;
    fs::create_dir(temp.path().join("ambiguous"))?;
    fs::write(temp.path().join("ambiguous/inside.rb"), "z")?;

    let sink = scan(&mut record, ".", false)?;
    assert_eq!(
        sink.events_for(Path::new("ambiguous")),
        vec![InvalidationKind::Tree, InvalidationKind::File]
    );
    assert!(sink
        .events
        .contains(&(InvalidationKind::File, PathBuf::from("ambiguous/inside.rb"))));

    Ok(())
}

#[test]
fn test_change_in_known_subdirectory_needs_recursive_scan() -> Result<()> {
    let temp = TempDir::new()?;
    fs::create_dir(temp.path().join("known"))?;
    let deep_file = temp.path().join("known/deep.rb");
    fs::write(&deep_file, "v1")?;

    let mut record = Record::new(temp.path());
    scan(&mut record, ".", false)?;

    filetime::set_file_mtime(&deep_file, FileTime::from_unix_time(2_000_000, 0))?;

    let plain = scan(&mut record, ".", false)?;
    assert!(plain.events.is_empty());

    let forced = scan(&mut record, ".", true)?;
    assert_eq!(
        forced.events,
        vec![(InvalidationKind::File, PathBuf::from("known/deep.rb"))]
    );

    Ok(())
}

#[test]
fn test_brand_new_subtree_scanned_to_full_depth() -> Result<()> {
    let temp = TempDir::new()?;
    let mut record = Record::new(temp.path());
    scan(&mut record, ".", false)?;

    fs::create_dir_all(temp.path().join("fresh/deep/deeper"))?;
    fs::write(temp.path().join("fresh/deep/deeper/leaf.rb"), "leaf")?;

    let sink = scan(&mut record, ".", false)?;
    assert!(sink
        .events
        .contains(&(InvalidationKind::File, PathBuf::from("fresh/deep/deeper/leaf.rb"))));

    Ok(())
}

#[cfg(unix)]
#[test]
fn test_symlinked_directory_is_recorded_as_a_file() -> Result<()> {
    let temp = TempDir::new()?;
    fs::create_dir(temp.path().join("real"))?;
    std::os::unix::fs::symlink(temp.path().join("real"), temp.path().join("link"))?;

    let mut record = Record::new(temp.path());
    let sink = scan(&mut record, ".", false)?;

    // lstat semantics: the link itself, not its target.
    assert_eq!(
        sink.events_for(Path::new("link")),
        vec![InvalidationKind::File]
    );

    Ok(())
}

#[test]
fn test_scan_target_that_never_existed_is_quietly_unset() -> Result<()> {
    let temp = TempDir::new()?;
    let mut record = Record::new(temp.path());

    let sink = scan(&mut record, "missing", false)?;
    assert!(sink.events.is_empty());

    let (existed, _) = record.dir_entries(Path::new("missing"));
    assert!(!existed);

    Ok(())
}
