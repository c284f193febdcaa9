//! Polling file monitor
//!
//! [`FileMonitor`] owns the watched entries, the listener registry and the
//! poll thread. Its lifecycle is `Idle -> Running -> Stopped -> Running ...
//! -> Closed`. Stopping keeps every entry and its last snapshot, so a
//! restart reports what changed in between exactly once. Closing is final.

use crate::config::MonitorConfig;
use crate::diagnostics::Diagnostic;
use crate::entry::WatchEntry;
use crate::error::{MonitorError, Result};
use crate::listener::{FileListener, ListenerId};
use crate::scheduler::{Engine, PollThread};
use crossbeam_channel::Receiver;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use statwatch_core::{capture_against, FileHandle, FileId, FileObject, Snapshot};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Lifecycle state of a [`FileMonitor`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Created, never started
    Idle,
    /// Poll thread running
    Running,
    /// Stopped; entries and snapshots retained
    Stopped,
    /// Torn down; cannot be restarted
    Closed,
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MonitorState::Idle => "idle",
            MonitorState::Running => "running",
            MonitorState::Stopped => "stopped",
            MonitorState::Closed => "closed",
        };
        f.write_str(s)
    }
}

struct Lifecycle {
    state: MonitorState,
    poller: Option<PollThread>,
}

/// Polls a set of paths and reports creations, deletions and changes
pub struct FileMonitor {
    engine: Arc<Engine>,
    default_listener: Option<Arc<dyn FileListener>>,
    recursive: AtomicBool,
    lifecycle: Mutex<Lifecycle>,
}

impl FileMonitor {
    /// Create a monitor whose `listener` is bound to every added path
    pub fn new(listener: impl FileListener + 'static) -> Self {
        Self::with_config(listener, MonitorConfig::default())
    }

    /// Create a monitor with explicit configuration
    pub fn with_config(listener: impl FileListener + 'static, config: MonitorConfig) -> Self {
        Self::build(Some(Arc::new(listener)), config)
    }

    /// Create a monitor without a default listener
    ///
    /// Listeners are then bound per path with [`FileMonitor::add_listener`].
    pub fn from_config(config: MonitorConfig) -> Self {
        Self::build(None, config)
    }

    fn build(default_listener: Option<Arc<dyn FileListener>>, config: MonitorConfig) -> Self {
        let config = config.normalized();
        let engine = Engine::new(
            config.delay(),
            config.checks_per_run,
            config.slow_capture_threshold(),
            config.diagnostics_capacity,
        );

        Self {
            engine: Arc::new(engine),
            default_listener,
            recursive: AtomicBool::new(config.recursive),
            lifecycle: Mutex::new(Lifecycle {
                state: MonitorState::Idle,
                poller: None,
            }),
        }
    }

    /// Watch `file` using the monitor's recursive default
    pub fn add_file(&self, file: FileHandle) -> Result<()> {
        self.add_path(file, self.is_recursive())
    }

    /// Watch `file`
    ///
    /// The current state is captured right away as the baseline, so content
    /// that already exists is never reported as created. Adding a path that
    /// is already watched changes nothing.
    pub fn add_path(&self, file: FileHandle, recursive: bool) -> Result<()> {
        self.ensure_open()?;
        let id = file.id();
        if self.engine.entries.contains_key(&id) {
            debug!("{} is already watched", id);
            return Ok(());
        }

        let baseline = match capture_against(file.as_ref(), recursive, None) {
            Ok(captured) => {
                for (child, error) in captured.failures {
                    self.engine.diagnostics.emit(Diagnostic::CaptureFailed {
                        file: child,
                        error: error.to_string(),
                    });
                }
                Some(captured.snapshot)
            }
            Err(e) => {
                // The first poll establishes the baseline instead
                self.engine.diagnostics.emit(Diagnostic::CaptureFailed {
                    file: id.clone(),
                    error: e.to_string(),
                });
                None
            }
        };

        let _gate = self.engine.registry.gate();
        self.ensure_open()?;
        match self.engine.entries.entry(id.clone()) {
            Entry::Occupied(_) => return Ok(()),
            Entry::Vacant(vacant) => {
                let generation = self.engine.next_generation();
                vacant.insert(WatchEntry::new(file, recursive, baseline, generation));
            }
        }
        if let Some(listener) = &self.default_listener {
            self.engine.registry.bind(&id, Arc::clone(listener));
        }

        debug!("watching {} (recursive: {})", id, recursive);
        Ok(())
    }

    /// Stop watching `file` and unbind all of its listeners
    ///
    /// Once this returns no event for `file` reaches any of those listeners,
    /// including events from a poll that was already in flight.
    pub fn remove_file(&self, file: &dyn FileObject) -> bool {
        self.remove_id(&file.id())
    }

    /// [`FileMonitor::remove_file`] by identity
    pub fn remove_id(&self, id: &FileId) -> bool {
        let _gate = self.engine.registry.gate();
        let removed = self.engine.entries.remove(id).is_some();
        let unbound = self.engine.registry.unbind(id);
        if removed {
            debug!("stopped watching {} ({} listeners unbound)", id, unbound);
        }
        removed
    }

    /// Bind an extra listener to a watched path
    ///
    /// Returns `None` if `file` is not watched.
    pub fn add_listener(
        &self,
        file: &dyn FileObject,
        listener: impl FileListener + 'static,
    ) -> Option<ListenerId> {
        let id = file.id();
        let _gate = self.engine.registry.gate();
        if !self.engine.entries.contains_key(&id) {
            return None;
        }
        Some(self.engine.registry.bind(&id, Arc::new(listener)))
    }

    /// Unbind one listener from a path, leaving the path watched
    pub fn remove_listener(&self, file: &dyn FileObject, listener: ListenerId) -> bool {
        self.engine.registry.unbind_listener(&file.id(), listener)
    }

    /// Start (or restart) polling
    pub fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        match lifecycle.state {
            MonitorState::Closed => Err(MonitorError::Closed),
            MonitorState::Running => Ok(()),
            MonitorState::Idle | MonitorState::Stopped => {
                let poller = PollThread::spawn(Arc::clone(&self.engine))?;
                lifecycle.poller = Some(poller);
                lifecycle.state = MonitorState::Running;
                info!(
                    "Monitor started ({} paths, delay {:?})",
                    self.engine.entries.len(),
                    self.engine.delay()
                );
                Ok(())
            }
        }
    }

    /// Stop polling after the current cycle; entries are kept
    pub fn stop(&self) {
        let poller = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state != MonitorState::Running {
                return;
            }
            lifecycle.state = MonitorState::Stopped;
            lifecycle.poller.take()
        };

        if let Some(poller) = poller {
            poller.shutdown();
        }
        info!("Monitor stopped");
    }

    /// Tear the monitor down
    ///
    /// Stops polling, drops every entry, listener and diagnostic subscriber.
    /// After this returns no listener is ever invoked again. Idempotent.
    pub fn close(&self) {
        let poller = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state == MonitorState::Closed {
                return;
            }
            lifecycle.state = MonitorState::Closed;
            lifecycle.poller.take()
        };

        self.engine.closed.store(true, Ordering::Release);
        // Waits for any delivery in progress on the poll thread
        self.engine.registry.clear();
        self.engine.entries.clear();

        if let Some(poller) = poller {
            poller.shutdown();
        }
        self.engine.diagnostics.close();
        info!("Monitor closed");
    }

    /// Set the poll delay, effective from the next cycle
    ///
    /// Delays below [`MIN_DELAY`](crate::config::MIN_DELAY) are raised to it.
    pub fn set_delay(&self, delay: Duration) {
        self.engine.set_delay(delay);
    }

    pub fn delay(&self) -> Duration {
        self.engine.delay()
    }

    /// Recursive default for paths added later; existing entries keep theirs
    pub fn set_recursive(&self, recursive: bool) {
        self.recursive.store(recursive, Ordering::Relaxed);
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive.load(Ordering::Relaxed)
    }

    /// Entries checked per burst before pausing one delay; 0 disables it
    pub fn set_checks_per_run(&self, checks: usize) {
        self.engine.set_checks_per_run(checks);
    }

    pub fn checks_per_run(&self) -> usize {
        self.engine.checks_per_run()
    }

    pub fn state(&self) -> MonitorState {
        self.lifecycle.lock().state
    }

    /// Identities of every watched path, sorted
    pub fn watched(&self) -> Vec<FileId> {
        let mut ids: Vec<FileId> = self.engine.entries.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn is_watching(&self, file: &dyn FileObject) -> bool {
        self.engine.entries.contains_key(&file.id())
    }

    /// Last snapshot stored for `file`
    pub fn last_snapshot(&self, file: &dyn FileObject) -> Option<Arc<Snapshot>> {
        self.engine
            .entries
            .get(&file.id())
            .and_then(|entry| entry.last_snapshot().cloned())
    }

    /// Number of poll cycles completed so far
    pub fn cycles(&self) -> u64 {
        self.engine.cycles()
    }

    /// Subscribe to soft failures (capture and listener errors)
    pub fn diagnostics(&self) -> Receiver<Diagnostic> {
        self.engine.diagnostics.subscribe()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.engine.closed.load(Ordering::Acquire) {
            Err(MonitorError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Drop for FileMonitor {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for FileMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileMonitor")
            .field("state", &self.state())
            .field("watched", &self.engine.entries.len())
            .field("delay", &self.delay())
            .field("recursive", &self.is_recursive())
            .finish()
    }
}
