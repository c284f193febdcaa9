//! Point-in-time state of a watched path
//!
//! A [`Snapshot`] is built once by [`capture`] and never mutated afterwards;
//! every poll produces a fresh tree. Children are shared through `Arc` so a
//! snapshot can be handed to the diff engine while a newer poll is running.

use crate::error::{FsError, Result};
use crate::fs::{FileId, FileObject};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::trace;

/// Observed state of one path at one instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    /// Path this snapshot describes
    pub id: FileId,
    pub exists: bool,
    /// Only set while the path exists
    pub last_modified: Option<SystemTime>,
    /// Content size for files; zero for folders and missing paths
    pub size: u64,
    pub is_folder: bool,
    /// Child name to child snapshot; only populated for recursive captures
    pub children: BTreeMap<String, Arc<Snapshot>>,
}

impl Snapshot {
    /// Snapshot of a path that does not exist
    pub fn missing(id: FileId) -> Self {
        Self {
            id,
            exists: false,
            last_modified: None,
            size: 0,
            is_folder: false,
            children: BTreeMap::new(),
        }
    }

    /// Snapshot of an existing file
    pub fn file(id: FileId, last_modified: SystemTime, size: u64) -> Self {
        Self {
            id,
            exists: true,
            last_modified: Some(last_modified),
            size,
            is_folder: false,
            children: BTreeMap::new(),
        }
    }

    /// Snapshot of an existing folder with the given children
    pub fn folder(
        id: FileId,
        last_modified: SystemTime,
        children: impl IntoIterator<Item = (String, Snapshot)>,
    ) -> Self {
        Self {
            id,
            exists: true,
            last_modified: Some(last_modified),
            size: 0,
            is_folder: true,
            children: children
                .into_iter()
                .map(|(name, child)| (name, Arc::new(child)))
                .collect(),
        }
    }

    /// Number of paths in this tree, including itself
    pub fn node_count(&self) -> usize {
        1 + self.children.values().map(|c| c.node_count()).sum::<usize>()
    }

    pub fn child(&self, name: &str) -> Option<&Snapshot> {
        self.children.get(name).map(AsRef::as_ref)
    }
}

/// Result of [`capture_against`]
#[derive(Debug)]
pub struct Capture {
    pub snapshot: Snapshot,
    /// Descendants that could not be inspected this time
    pub failures: Vec<(FileId, FsError)>,
}

/// Capture the current state of `file`
///
/// A missing path, or one that disappears while it is being inspected, yields
/// a snapshot with `exists == false`. Children that vanish mid-capture are
/// left out of their parent. Any other failure of the capability, anywhere in
/// the tree, is returned as an error.
pub fn capture(file: &dyn FileObject, recursive: bool) -> Result<Snapshot> {
    let mut captured = capture_against(file, recursive, None)?;
    match captured.failures.pop() {
        Some((_, e)) => Err(e),
        None => Ok(captured.snapshot),
    }
}

/// Capture `file`, confining descendant failures to the descendant
///
/// Only a failure on `file` itself is an error. A child that fails keeps its
/// subtree from `previous` (or is left out if it was not known) and is
/// listed in [`Capture::failures`], so its siblings are still observed.
pub fn capture_against(
    file: &dyn FileObject,
    recursive: bool,
    previous: Option<&Snapshot>,
) -> Result<Capture> {
    let mut failures = Vec::new();
    let snapshot = capture_node(file, recursive, previous, &mut failures)?;
    Ok(Capture { snapshot, failures })
}

fn capture_node(
    file: &dyn FileObject,
    recursive: bool,
    previous: Option<&Snapshot>,
    failures: &mut Vec<(FileId, FsError)>,
) -> Result<Snapshot> {
    match capture_existing(file, recursive, previous, failures) {
        Ok(snapshot) => Ok(snapshot),
        Err(e) if e.is_not_found() => {
            trace!("{} vanished during capture", file.id());
            Ok(Snapshot::missing(file.id()))
        }
        Err(e) => Err(e),
    }
}

fn capture_existing(
    file: &dyn FileObject,
    recursive: bool,
    previous: Option<&Snapshot>,
    failures: &mut Vec<(FileId, FsError)>,
) -> Result<Snapshot> {
    let id = file.id();
    if !file.exists()? {
        return Ok(Snapshot::missing(id));
    }

    let last_modified = file.last_modified()?;
    if !file.is_folder()? {
        let size = file.content_size()?;
        return Ok(Snapshot::file(id, last_modified, size));
    }

    let mut children = BTreeMap::new();
    if recursive {
        let known = previous.filter(|p| p.exists && p.is_folder);
        for child in file.children()? {
            let name = child.name();
            let prior = known.and_then(|p| p.children.get(&name));
            match capture_node(child.as_ref(), true, prior.map(AsRef::as_ref), failures) {
                Ok(snapshot) => {
                    if snapshot.exists {
                        children.insert(name, Arc::new(snapshot));
                    }
                }
                Err(e) => {
                    trace!("keeping previous state of {}: {}", child.id(), e);
                    if let Some(prior) = prior {
                        children.insert(name, Arc::clone(prior));
                    }
                    failures.push((child.id(), e));
                }
            }
        }
    }

    Ok(Snapshot {
        id,
        exists: true,
        last_modified: Some(last_modified),
        size: 0,
        is_folder: true,
        children,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memfs::MemoryFs;

    #[test]
    fn test_capture_missing_path() {
        let fs = MemoryFs::new();
        let snapshot = capture(fs.file("/nope").as_ref(), true).unwrap();

        assert!(!snapshot.exists);
        assert_eq!(snapshot.last_modified, None);
        assert!(snapshot.children.is_empty());
        assert_eq!(snapshot.id, FileId::new("mem:///nope"));
    }

    #[test]
    fn test_capture_file() {
        let fs = MemoryFs::new();
        fs.write("/f.txt", "12345").unwrap();
        let snapshot = capture(fs.file("/f.txt").as_ref(), false).unwrap();

        assert!(snapshot.exists);
        assert!(!snapshot.is_folder);
        assert_eq!(snapshot.size, 5);
        assert!(snapshot.last_modified.is_some());
    }

    #[test]
    fn test_capture_recursive_tree() {
        let fs = MemoryFs::new();
        fs.write("/root/a.txt", "a").unwrap();
        fs.write("/root/nested/deeper/b.txt", "bb").unwrap();

        let snapshot = capture(fs.file("/root").as_ref(), true).unwrap();
        assert!(snapshot.is_folder);
        assert_eq!(snapshot.node_count(), 5);

        let b = snapshot
            .child("nested")
            .and_then(|n| n.child("deeper"))
            .and_then(|d| d.child("b.txt"))
            .unwrap();
        assert_eq!(b.size, 2);
        assert_eq!(b.id, FileId::new("mem:///root/nested/deeper/b.txt"));
    }

    #[test]
    fn test_capture_non_recursive_has_no_children() {
        let fs = MemoryFs::new();
        fs.write("/root/a.txt", "a").unwrap();

        let snapshot = capture(fs.file("/root").as_ref(), false).unwrap();
        assert!(snapshot.is_folder);
        assert!(snapshot.children.is_empty());
    }

    #[test]
    fn test_capture_failure_propagates() {
        let fs = MemoryFs::new();
        fs.write("/root/a.txt", "a").unwrap();
        fs.set_failing("/root/a.txt", true);

        let err = capture(fs.file("/root").as_ref(), true).unwrap_err();
        assert!(!err.is_not_found());

        // Non-recursive capture never looks at the child
        assert!(capture(fs.file("/root").as_ref(), false).is_ok());
    }

    #[test]
    fn test_failing_child_keeps_previous_subtree() {
        let fs = MemoryFs::new();
        fs.write("/root/bad/x", "x").unwrap();
        fs.write("/root/good", "g").unwrap();
        let root = fs.file("/root");
        let before = capture(root.as_ref(), true).unwrap();

        fs.set_failing("/root/bad", true);
        fs.write("/root/good", "changed").unwrap();
        fs.write("/root/new.txt", "n").unwrap();

        let captured = capture_against(root.as_ref(), true, Some(&before)).unwrap();
        assert_eq!(captured.failures.len(), 1);
        assert_eq!(captured.failures[0].0, FileId::new("mem:///root/bad"));
        assert!(!captured.failures[0].1.is_not_found());

        let after = captured.snapshot;
        assert!(Arc::ptr_eq(&before.children["bad"], &after.children["bad"]));
        assert_eq!(after.child("good").unwrap().size, 7);
        assert!(after.child("new.txt").is_some());
    }

    #[test]
    fn test_failing_unknown_child_is_left_out() {
        let fs = MemoryFs::new();
        fs.write("/root/bad/x", "x").unwrap();
        fs.set_failing("/root/bad", true);

        let captured = capture_against(fs.file("/root").as_ref(), true, None).unwrap();
        assert_eq!(captured.failures.len(), 1);
        assert!(captured.snapshot.children.is_empty());
    }

    #[test]
    fn test_failure_on_the_path_itself_is_an_error() {
        let fs = MemoryFs::new();
        fs.write("/root/a.txt", "a").unwrap();
        fs.set_failing("/root", true);

        assert!(capture_against(fs.file("/root").as_ref(), true, None).is_err());
    }

    /// Reports that it exists, then vanishes on the next query
    #[derive(Debug)]
    struct Vanishing;

    impl FileObject for Vanishing {
        fn id(&self) -> FileId {
            FileId::new("test://vanishing")
        }
        fn name(&self) -> String {
            "vanishing".into()
        }
        fn exists(&self) -> Result<bool> {
            Ok(true)
        }
        fn is_folder(&self) -> Result<bool> {
            Err(FsError::NotFound("test://vanishing".into()))
        }
        fn last_modified(&self) -> Result<SystemTime> {
            Ok(SystemTime::UNIX_EPOCH)
        }
        fn content_size(&self) -> Result<u64> {
            Err(FsError::NotFound("test://vanishing".into()))
        }
        fn children(&self) -> Result<Vec<crate::fs::FileHandle>> {
            Err(FsError::NotFound("test://vanishing".into()))
        }
    }

    #[test]
    fn test_capture_resolves_mid_stat_deletion() {
        let snapshot = capture(&Vanishing, true).unwrap();
        assert!(!snapshot.exists);
    }
}
