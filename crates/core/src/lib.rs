//! Snapshot and diff primitives for statwatch
//!
//! This crate provides:
//! - The path capability the monitor polls ([`FileObject`])
//! - Local-disk and in-memory implementations of it
//! - Immutable per-poll snapshots of a path tree
//! - A pure diff engine turning two snapshots into change events

pub mod diff;
pub mod error;
pub mod event;
pub mod fs;
pub mod memfs;
pub mod snapshot;

// Re-exports
pub use diff::diff;
pub use error::FsError;
pub use event::{ChangeEvent, ChangeKind};
pub use fs::{FileHandle, FileId, FileObject, LocalFile};
pub use memfs::{MemFile, MemoryFs};
pub use snapshot::{capture, capture_against, Capture, Snapshot};
