//! Change events produced by the diff engine

use crate::fs::FileId;
use serde::Serialize;
use std::fmt;

/// Type of change observed between two polls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Path started existing
    Created,
    /// Path stopped existing
    Deleted,
    /// Existing file's timestamp or size moved
    Changed,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Created => "created",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Changed => "changed",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single change, reported against the concrete path it happened to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ChangeEvent {
    /// Path that changed (a descendant of the watched path for recursive watches)
    pub file: FileId,
    /// Type of change
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn created(file: FileId) -> Self {
        Self {
            file,
            kind: ChangeKind::Created,
        }
    }

    pub fn deleted(file: FileId) -> Self {
        Self {
            file,
            kind: ChangeKind::Deleted,
        }
    }

    pub fn changed(file: FileId) -> Self {
        Self {
            file,
            kind: ChangeKind::Changed,
        }
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.file)
    }
}
