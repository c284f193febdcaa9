//! Path capability consumed by the monitor
//!
//! The monitor never touches a filesystem directly. It polls anything that
//! implements [`FileObject`]: local disk via [`LocalFile`], the in-memory
//! tree in [`crate::memfs`], or a caller's own virtual filesystem.

use crate::error::{FsError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// Comparable identity of a path
///
/// Used as the listener registry key and to recognise the same path across
/// polls. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(Arc<str>);

impl FileId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Shared handle to a path capability
pub type FileHandle = Arc<dyn FileObject>;

/// Stat-like view of one path
///
/// `last_modified`, `content_size` and `children` are only meaningful while
/// the path exists; implementations return [`FsError::NotFound`] otherwise.
pub trait FileObject: Send + Sync + fmt::Debug {
    /// Identity of this path
    fn id(&self) -> FileId;

    /// Base name, used as the key in a parent's children map
    fn name(&self) -> String;

    fn exists(&self) -> Result<bool>;

    fn is_folder(&self) -> Result<bool>;

    fn last_modified(&self) -> Result<SystemTime>;

    /// Size in bytes (files only)
    fn content_size(&self) -> Result<u64>;

    /// Immediate children (folders only)
    fn children(&self) -> Result<Vec<FileHandle>>;
}

/// A path on the local disk
#[derive(Debug, Clone)]
pub struct LocalFile {
    path: PathBuf,
    id: FileId,
}

impl LocalFile {
    /// Create a handle for `path`
    ///
    /// Relative paths are resolved against the current directory so the
    /// identity is stable even if the process later changes directory.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };
        let id = FileId::new(path.to_string_lossy());
        Ok(Self { path, id })
    }

    /// Convenience for `Arc::new(LocalFile::new(path)?)`
    pub fn handle(path: impl AsRef<Path>) -> Result<FileHandle> {
        Ok(Arc::new(Self::new(path)?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn metadata(&self) -> Result<fs::Metadata> {
        fs::metadata(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FsError::NotFound(self.id.to_string())
            } else {
                FsError::Io(e)
            }
        })
    }
}

impl FileObject for LocalFile {
    fn id(&self) -> FileId {
        self.id.clone()
    }

    fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.id.to_string())
    }

    fn exists(&self) -> Result<bool> {
        match self.metadata() {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn is_folder(&self) -> Result<bool> {
        Ok(self.metadata()?.is_dir())
    }

    fn last_modified(&self) -> Result<SystemTime> {
        Ok(self.metadata()?.modified()?)
    }

    fn content_size(&self) -> Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn children(&self) -> Result<Vec<FileHandle>> {
        let entries = fs::read_dir(&self.path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FsError::NotFound(self.id.to_string()),
            _ => FsError::Io(e),
        })?;

        let mut children: Vec<FileHandle> = Vec::new();
        for entry in entries {
            let entry = entry?;
            children.push(Arc::new(LocalFile::new(entry.path())?));
        }
        Ok(children)
    }
}
