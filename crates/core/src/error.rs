//! Error types for path capabilities

use std::io;
use thiserror::Error;

/// Errors reported by a [`FileObject`](crate::fs::FileObject)
#[derive(Error, Debug)]
pub enum FsError {
    /// The path does not exist (or stopped existing mid-query)
    #[error("Path not found: {0}")]
    NotFound(String),

    /// A folder-only operation was invoked on something else
    #[error("Not a folder: {0}")]
    NotAFolder(String),

    /// The backing store refused or failed the query
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// IO error from the local filesystem
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl FsError {
    /// True when the error means "the path is gone", which capture folds
    /// into a non-existent snapshot instead of a failure
    pub fn is_not_found(&self) -> bool {
        match self {
            FsError::NotFound(_) => true,
            FsError::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Result type for path capability queries
pub type Result<T> = std::result::Result<T, FsError>;
