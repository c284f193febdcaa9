//! Monitor behaviour against the local disk

mod common;

use common::{fast_config, recording_monitor, settle};
use filetime::{set_file_mtime, FileTime};
use statwatch_watcher::{FileObject, LocalFile, MonitorConfig};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn id_of(path: &Path) -> String {
    LocalFile::new(path).unwrap().id().to_string()
}

/// Move a file's mtime well away from anything the clock could produce
fn bump_mtime(path: &Path, seconds: i64) {
    set_file_mtime(path, FileTime::from_unix_time(1_600_000_000 + seconds, 0)).unwrap();
}

#[test]
fn test_file_created() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("new.txt");

    let (monitor, recorder) = recording_monitor(fast_config());
    monitor.add_file(LocalFile::handle(&path).unwrap()).unwrap();
    monitor.start().unwrap();

    fs::write(&path, "hello").unwrap();
    settle(&monitor);

    assert_eq!(recorder.events(), vec![format!("created {}", id_of(&path))]);
}

#[test]
fn test_file_deleted() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("old.txt");
    fs::write(&path, "bye").unwrap();

    let (monitor, recorder) = recording_monitor(fast_config());
    monitor.add_file(LocalFile::handle(&path).unwrap()).unwrap();
    monitor.start().unwrap();

    fs::remove_file(&path).unwrap();
    settle(&monitor);

    assert_eq!(recorder.events(), vec![format!("deleted {}", id_of(&path))]);
}

#[test]
fn test_file_modified() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("data.txt");
    fs::write(&path, "v1").unwrap();
    bump_mtime(&path, 0);

    let (monitor, recorder) = recording_monitor(fast_config());
    monitor.add_file(LocalFile::handle(&path).unwrap()).unwrap();
    monitor.start().unwrap();

    bump_mtime(&path, 60);
    settle(&monitor);

    assert_eq!(recorder.events(), vec![format!("changed {}", id_of(&path))]);
}

#[test]
fn test_size_change_without_mtime_change() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("data.txt");
    fs::write(&path, "short").unwrap();
    bump_mtime(&path, 0);

    let (monitor, recorder) = recording_monitor(fast_config());
    monitor.add_file(LocalFile::handle(&path).unwrap()).unwrap();
    monitor.start().unwrap();

    fs::write(&path, "considerably longer").unwrap();
    bump_mtime(&path, 0);
    settle(&monitor);

    assert_eq!(recorder.events(), vec![format!("changed {}", id_of(&path))]);
}

#[test]
fn test_file_recreated() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("cycle.txt");
    fs::write(&path, "first").unwrap();

    let (monitor, recorder) = recording_monitor(fast_config());
    monitor.add_file(LocalFile::handle(&path).unwrap()).unwrap();
    monitor.start().unwrap();

    fs::remove_file(&path).unwrap();
    settle(&monitor);
    fs::write(&path, "second").unwrap();
    settle(&monitor);

    let id = id_of(&path);
    assert_eq!(
        recorder.events(),
        vec![format!("deleted {}", id), format!("created {}", id)]
    );
}

#[test]
fn test_child_deleted_non_recursive() {
    let temp_dir = TempDir::new().unwrap();
    let child = temp_dir.path().join("child.txt");
    fs::write(&child, "x").unwrap();

    let (monitor, recorder) = recording_monitor(fast_config());
    monitor
        .add_path(LocalFile::handle(temp_dir.path()).unwrap(), false)
        .unwrap();
    monitor.start().unwrap();

    fs::remove_file(&child).unwrap();
    settle(&monitor);

    assert!(recorder.events().is_empty());
}

#[test]
fn test_child_deleted_recursive() {
    let temp_dir = TempDir::new().unwrap();
    let child = temp_dir.path().join("nested").join("child.txt");
    fs::create_dir_all(child.parent().unwrap()).unwrap();
    fs::write(&child, "x").unwrap();

    let config = MonitorConfig {
        recursive: true,
        ..fast_config()
    };
    let (monitor, recorder) = recording_monitor(config);
    monitor
        .add_file(LocalFile::handle(temp_dir.path()).unwrap())
        .unwrap();
    monitor.start().unwrap();

    fs::remove_file(&child).unwrap();
    settle(&monitor);

    assert_eq!(recorder.events(), vec![format!("deleted {}", id_of(&child))]);
}

#[test]
fn test_restart_reports_offline_changes() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("restart.txt");

    let (monitor, recorder) = recording_monitor(fast_config());
    monitor.add_file(LocalFile::handle(&path).unwrap()).unwrap();
    monitor.start().unwrap();
    settle(&monitor);
    monitor.stop();

    fs::write(&path, "written while stopped").unwrap();
    assert!(recorder.events().is_empty());

    monitor.start().unwrap();
    settle(&monitor);
    assert_eq!(recorder.events(), vec![format!("created {}", id_of(&path))]);
}

#[test]
fn test_add_remove_add_reports_creation_once() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("again.txt");
    let file = LocalFile::handle(&path).unwrap();

    let (monitor, recorder) = recording_monitor(fast_config());
    monitor.add_file(Arc::clone(&file)).unwrap();
    monitor.remove_file(file.as_ref());
    monitor.add_file(Arc::clone(&file)).unwrap();
    monitor.start().unwrap();

    fs::write(&path, "x").unwrap();
    settle(&monitor);

    assert_eq!(recorder.events(), vec![format!("created {}", id_of(&path))]);
}

#[test]
fn test_stopping_one_monitor_leaves_another_running() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("shared.txt");

    let (first, first_events) = recording_monitor(fast_config());
    let (second, second_events) = recording_monitor(fast_config());
    first.add_file(LocalFile::handle(&path).unwrap()).unwrap();
    second.add_file(LocalFile::handle(&path).unwrap()).unwrap();
    first.start().unwrap();
    second.start().unwrap();

    first.stop();
    fs::write(&path, "x").unwrap();
    settle(&second);

    assert!(first_events.events().is_empty());
    assert_eq!(second_events.len(), 1);
}
