//! Polling change monitor for statwatch
//!
//! This crate provides:
//! - [`FileMonitor`], a start/stop/close lifecycle around one poll thread
//! - Per-path listener bindings with failure isolation
//! - A diagnostic channel for capture and listener failures
//! - TOML-loadable [`MonitorConfig`]
//!
//! ```no_run
//! use statwatch_watcher::{ChangeEvent, FileMonitor, LocalFile};
//!
//! # fn main() -> anyhow::Result<()> {
//! let monitor = FileMonitor::new(|event: &ChangeEvent| -> anyhow::Result<()> {
//!     println!("{}", event);
//!     Ok(())
//! });
//! monitor.add_file(LocalFile::handle("notes.txt")?)?;
//! monitor.start()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod diagnostics;
pub mod entry;
pub mod error;
pub mod listener;
pub mod monitor;
pub mod registry;
pub mod scheduler;

// Re-exports
pub use config::{MonitorConfig, DEFAULT_DELAY, MIN_DELAY};
pub use diagnostics::Diagnostic;
pub use error::{MonitorError, Result};
pub use listener::{FileListener, ListenerId};
pub use monitor::{FileMonitor, MonitorState};
pub use registry::Delivery;
pub use scheduler::CycleStats;

pub use statwatch_core::{
    ChangeEvent, ChangeKind, FileHandle, FileId, FileObject, LocalFile, MemoryFs, Snapshot,
};
