//! In-memory virtual filesystem
//!
//! A thread-safe tree of files and folders that implements [`FileObject`].
//! Modification times come from a logical clock that advances by one
//! millisecond per mutation, so two writes are never indistinguishable by
//! timestamp. Individual paths can be made to fail on demand to reproduce
//! transient stat failures.

use crate::error::{FsError, Result};
use crate::fs::{FileHandle, FileId, FileObject};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const SCHEME: &str = "mem://";

#[derive(Debug, Clone)]
enum NodeKind {
    File(Vec<u8>),
    Folder,
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    modified: SystemTime,
}

#[derive(Debug)]
struct Inner {
    nodes: BTreeMap<String, Node>,
    clock: u64,
    failing: HashSet<String>,
}

impl Inner {
    fn tick(&mut self) -> SystemTime {
        self.clock += 1;
        UNIX_EPOCH + Duration::from_millis(self.clock)
    }

    /// Create every missing ancestor folder of `path`
    fn ensure_parents(&mut self, path: &str) -> Result<()> {
        let mut ancestors = Vec::new();
        let mut current = parent_of(path);
        while let Some(p) = current {
            ancestors.push(p.to_string());
            current = parent_of(p);
        }

        for ancestor in ancestors.into_iter().rev() {
            match self.nodes.get(&ancestor) {
                Some(Node { kind: NodeKind::Folder, .. }) => {}
                Some(_) => return Err(FsError::NotAFolder(format!("{SCHEME}{ancestor}"))),
                None => {
                    let modified = self.tick();
                    self.nodes.insert(ancestor, Node { kind: NodeKind::Folder, modified });
                }
            }
        }
        Ok(())
    }

    fn touch_parent(&mut self, path: &str) {
        if let Some(parent) = parent_of(path) {
            let modified = self.tick();
            if let Some(node) = self.nodes.get_mut(parent) {
                node.modified = modified;
            }
        }
    }
}

/// Handle to an in-memory tree; clones share the same tree
#[derive(Debug, Clone)]
pub struct MemoryFs {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryFs {
    /// Create an empty tree containing only the root folder
    pub fn new() -> Self {
        let mut inner = Inner {
            nodes: BTreeMap::new(),
            clock: 0,
            failing: HashSet::new(),
        };
        let modified = inner.tick();
        inner.nodes.insert("/".to_string(), Node { kind: NodeKind::Folder, modified });

        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    /// Get a path capability for `path` (which need not exist yet)
    pub fn file(&self, path: &str) -> FileHandle {
        Arc::new(MemFile {
            fs: self.clone(),
            path: normalize(path),
        })
    }

    /// Write `content` to a file, creating parent folders as needed
    pub fn write(&self, path: &str, content: impl Into<Vec<u8>>) -> Result<()> {
        let path = normalize(path);
        let mut inner = self.inner.write();
        if let Some(Node { kind: NodeKind::Folder, .. }) = inner.nodes.get(&path) {
            return Err(FsError::Unavailable(format!("{SCHEME}{path} is a folder")));
        }

        inner.ensure_parents(&path)?;
        let is_new = !inner.nodes.contains_key(&path);
        let modified = inner.tick();
        inner.nodes.insert(
            path.clone(),
            Node { kind: NodeKind::File(content.into()), modified },
        );
        if is_new {
            inner.touch_parent(&path);
        }
        Ok(())
    }

    /// Create a folder and any missing ancestors
    pub fn create_dir(&self, path: &str) -> Result<()> {
        let path = normalize(path);
        let mut inner = self.inner.write();
        match inner.nodes.get(&path) {
            Some(Node { kind: NodeKind::Folder, .. }) => return Ok(()),
            Some(_) => return Err(FsError::NotAFolder(format!("{SCHEME}{path}"))),
            None => {}
        }

        inner.ensure_parents(&path)?;
        let modified = inner.tick();
        inner.nodes.insert(path.clone(), Node { kind: NodeKind::Folder, modified });
        inner.touch_parent(&path);
        Ok(())
    }

    /// Remove a path and everything below it
    ///
    /// Returns false if nothing was there. The root cannot be removed.
    pub fn remove(&self, path: &str) -> bool {
        let path = normalize(path);
        if path == "/" {
            return false;
        }

        let mut inner = self.inner.write();
        if inner.nodes.remove(&path).is_none() {
            return false;
        }

        let prefix = format!("{path}/");
        let doomed: Vec<String> = inner
            .nodes
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for key in doomed {
            inner.nodes.remove(&key);
        }

        inner.touch_parent(&path);
        true
    }

    /// Advance the modification time of an existing path
    pub fn touch(&self, path: &str) -> bool {
        let path = normalize(path);
        let mut inner = self.inner.write();
        if !inner.nodes.contains_key(&path) {
            return false;
        }
        let modified = inner.tick();
        if let Some(node) = inner.nodes.get_mut(&path) {
            node.modified = modified;
        }
        true
    }

    /// Make every query on `path` fail with [`FsError::Unavailable`]
    pub fn set_failing(&self, path: &str, failing: bool) {
        let path = normalize(path);
        let mut inner = self.inner.write();
        if failing {
            inner.failing.insert(path);
        } else {
            inner.failing.remove(&path);
        }
    }

    pub fn exists(&self, path: &str) -> bool {
        self.inner.read().nodes.contains_key(&normalize(path))
    }

    /// Read back a file's content
    pub fn read(&self, path: &str) -> Option<Vec<u8>> {
        match self.inner.read().nodes.get(&normalize(path)) {
            Some(Node { kind: NodeKind::File(content), .. }) => Some(content.clone()),
            _ => None,
        }
    }

    fn node(&self, path: &str) -> Result<Node> {
        let inner = self.inner.read();
        if inner.failing.contains(path) {
            return Err(FsError::Unavailable(format!("{SCHEME}{path}")));
        }
        inner
            .nodes
            .get(path)
            .cloned()
            .ok_or_else(|| FsError::NotFound(format!("{SCHEME}{path}")))
    }
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

/// A path inside a [`MemoryFs`]
#[derive(Debug, Clone)]
pub struct MemFile {
    fs: MemoryFs,
    path: String,
}

impl FileObject for MemFile {
    fn id(&self) -> FileId {
        FileId::new(format!("{SCHEME}{}", self.path))
    }

    fn name(&self) -> String {
        self.path.rsplit('/').next().unwrap_or_default().to_string()
    }

    fn exists(&self) -> Result<bool> {
        match self.fs.node(&self.path) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn is_folder(&self) -> Result<bool> {
        Ok(matches!(self.fs.node(&self.path)?.kind, NodeKind::Folder))
    }

    fn last_modified(&self) -> Result<SystemTime> {
        Ok(self.fs.node(&self.path)?.modified)
    }

    fn content_size(&self) -> Result<u64> {
        match self.fs.node(&self.path)?.kind {
            NodeKind::File(content) => Ok(content.len() as u64),
            NodeKind::Folder => Ok(0),
        }
    }

    fn children(&self) -> Result<Vec<FileHandle>> {
        if !matches!(self.fs.node(&self.path)?.kind, NodeKind::Folder) {
            return Err(FsError::NotAFolder(format!("{SCHEME}{}", self.path)));
        }

        let prefix = if self.path == "/" {
            "/".to_string()
        } else {
            format!("{}/", self.path)
        };

        let inner = self.fs.inner.read();
        let children = inner
            .nodes
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter(|(k, _)| k.len() > prefix.len() && !k[prefix.len()..].contains('/'))
            .map(|(k, _)| {
                Arc::new(MemFile {
                    fs: self.fs.clone(),
                    path: k.clone(),
                }) as FileHandle
            })
            .collect();
        Ok(children)
    }
}

/// Normalize to an absolute, slash-separated path without empty segments
fn normalize(path: &str) -> String {
    let path = path.strip_prefix(SCHEME).unwrap_or(path);
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty() && *s != ".").collect();
    format!("/{}", segments.join("/"))
}

fn parent_of(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(i) => Some(&path[..i]),
        None => None,
    }
}
