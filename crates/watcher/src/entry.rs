//! One watched path and its last observed state

use statwatch_core::{FileHandle, Snapshot};
use std::sync::Arc;

/// A path under observation
///
/// `generation` is unique per insertion. A poll that started before the
/// path was removed and re-added carries the old generation, which is how
/// its results are recognised as stale and discarded.
pub struct WatchEntry {
    pub(crate) file: FileHandle,
    pub(crate) recursive: bool,
    pub(crate) last: Option<Arc<Snapshot>>,
    pub(crate) generation: u64,
}

impl WatchEntry {
    pub(crate) fn new(
        file: FileHandle,
        recursive: bool,
        baseline: Option<Snapshot>,
        generation: u64,
    ) -> Self {
        Self {
            file,
            recursive,
            last: baseline.map(Arc::new),
            generation,
        }
    }

    /// Result of the most recent successful poll, if any
    pub fn last_snapshot(&self) -> Option<&Arc<Snapshot>> {
        self.last.as_ref()
    }
}
