//! Poll scheduler
//!
//! One background thread per running monitor. Each cycle walks every
//! watched entry: capture a fresh snapshot, diff it against the stored one,
//! dispatch the events, then store the new snapshot. Cycles never overlap,
//! even across a stop/start that hands over to a new thread.

use crate::config::{clamp_delay, delay_millis};
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::entry::WatchEntry;
use crate::error::{MonitorError, Result};
use crate::registry::ListenerRegistry;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use dashmap::DashMap;
use parking_lot::Mutex;
use statwatch_core::{capture_against, diff, Capture, FileId};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// Counters for one poll cycle
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    /// Entries captured, fully or with some descendants unreadable
    pub polled: usize,
    /// Events dispatched
    pub events: usize,
    /// Listener calls that returned `Ok`
    pub delivered: usize,
    /// Listener calls that returned `Err` or panicked
    pub listener_failures: usize,
    /// Paths (watched or descendant) whose capture failed
    pub capture_failures: usize,
}

/// State shared between the monitor facade and its poll thread
pub(crate) struct Engine {
    pub(crate) entries: DashMap<FileId, WatchEntry>,
    pub(crate) registry: ListenerRegistry,
    pub(crate) diagnostics: DiagnosticSink,
    pub(crate) closed: AtomicBool,
    delay_ms: AtomicU64,
    checks_per_run: AtomicUsize,
    slow_capture: Duration,
    generation: AtomicU64,
    cycles: AtomicU64,
    cycle_lock: Mutex<()>,
}

impl Engine {
    pub(crate) fn new(
        delay: Duration,
        checks_per_run: usize,
        slow_capture: Duration,
        diagnostics_capacity: usize,
    ) -> Self {
        Self {
            entries: DashMap::new(),
            registry: ListenerRegistry::new(),
            diagnostics: DiagnosticSink::new(diagnostics_capacity),
            closed: AtomicBool::new(false),
            delay_ms: AtomicU64::new(delay_millis(clamp_delay(delay))),
            checks_per_run: AtomicUsize::new(checks_per_run),
            slow_capture,
            generation: AtomicU64::new(0),
            cycles: AtomicU64::new(0),
            cycle_lock: Mutex::new(()),
        }
    }

    pub(crate) fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms.load(Ordering::Relaxed))
    }

    pub(crate) fn set_delay(&self, delay: Duration) {
        let delay = clamp_delay(delay);
        self.delay_ms.store(delay_millis(delay), Ordering::Relaxed);
    }

    pub(crate) fn checks_per_run(&self) -> usize {
        self.checks_per_run.load(Ordering::Relaxed)
    }

    pub(crate) fn set_checks_per_run(&self, checks: usize) {
        self.checks_per_run.store(checks, Ordering::Relaxed);
    }

    pub(crate) fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Acquire)
    }

    /// Run one full pass over the watched entries
    ///
    /// `stop` is only consulted for the `checks_per_run` pause; once a stop
    /// is seen the rest of the cycle runs without pausing.
    pub(crate) fn run_cycle(&self, stop: &Receiver<()>) -> CycleStats {
        let _cycle = self.cycle_lock.lock();
        let ids: Vec<FileId> = self.entries.iter().map(|e| e.key().clone()).collect();
        let checks_per_run = self.checks_per_run();
        let mut stats = CycleStats::default();
        let mut may_pause = true;

        for (checked, id) in ids.iter().enumerate() {
            if self.closed.load(Ordering::Acquire) {
                break;
            }

            if may_pause && checks_per_run > 0 && checked > 0 && checked % checks_per_run == 0 {
                trace!("checked {} entries, pausing", checked);
                if !matches!(stop.recv_timeout(self.delay()), Err(RecvTimeoutError::Timeout)) {
                    may_pause = false;
                }
            }

            self.poll_entry(id, &mut stats);
        }

        self.cycles.fetch_add(1, Ordering::AcqRel);
        debug!(
            "poll cycle done: {} polled, {} events, {} capture failures",
            stats.polled, stats.events, stats.capture_failures
        );
        stats
    }

    fn poll_entry(&self, id: &FileId, stats: &mut CycleStats) {
        let (file, recursive, last, generation) = match self.entries.get(id) {
            Some(entry) => (
                Arc::clone(&entry.file),
                entry.recursive,
                entry.last.clone(),
                entry.generation,
            ),
            // Removed since the cycle started
            None => return,
        };

        let started = Instant::now();
        let captured = capture_against(file.as_ref(), recursive, last.as_deref());
        let elapsed = started.elapsed();
        if elapsed >= self.slow_capture {
            self.diagnostics.emit(Diagnostic::SlowCapture {
                file: id.clone(),
                elapsed,
            });
        }

        let Capture { snapshot, failures } = match captured {
            Ok(captured) => captured,
            Err(e) => {
                stats.capture_failures += 1;
                self.diagnostics.emit(Diagnostic::CaptureFailed {
                    file: id.clone(),
                    error: e.to_string(),
                });
                return;
            }
        };
        stats.polled += 1;

        // Unreadable descendants keep their previous state
        stats.capture_failures += failures.len();
        for (child, error) in failures {
            self.diagnostics.emit(Diagnostic::CaptureFailed {
                file: child,
                error: error.to_string(),
            });
        }

        let snapshot = Arc::new(snapshot);
        let events = match &last {
            Some(previous) => diff(Some(previous.as_ref()), &snapshot),
            None => {
                trace!("baseline established for {}", id);
                Vec::new()
            }
        };

        // Under the gate, removal of this entry either happened before we
        // look (and nothing is delivered) or waits until we are done
        let _gate = self.registry.gate();
        for event in &events {
            if !self.is_current(id, generation) {
                trace!("{} removed mid-dispatch, dropping remaining events", id);
                break;
            }
            trace!("dispatching {}", event);
            let delivery = self.registry.dispatch(id, event, &self.diagnostics);
            stats.events += 1;
            stats.delivered += delivery.delivered;
            stats.listener_failures += delivery.failed;
        }

        if let Some(mut entry) = self.entries.get_mut(id) {
            if entry.generation == generation {
                entry.last = Some(snapshot);
            }
        }
    }

    fn is_current(&self, id: &FileId, generation: u64) -> bool {
        self.entries
            .get(id)
            .is_some_and(|entry| entry.generation == generation)
    }
}

/// Handle to a running poll thread
pub(crate) struct PollThread {
    handle: JoinHandle<()>,
    stop_tx: Sender<()>,
    thread_id: ThreadId,
}

impl PollThread {
    pub(crate) fn spawn(engine: Arc<Engine>) -> Result<Self> {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let handle = thread::Builder::new()
            .name("statwatch-poll".to_string())
            .spawn(move || run(engine, stop_rx))
            .map_err(|e| MonitorError::Spawn(e.to_string()))?;
        let thread_id = handle.thread().id();

        Ok(Self {
            handle,
            stop_tx,
            thread_id,
        })
    }

    /// Ask the thread to stop and wait for its current cycle to finish
    ///
    /// When called from the poll thread itself (a listener stopping its own
    /// monitor) the thread is only signalled; it exits after the cycle.
    pub(crate) fn shutdown(self) {
        drop(self.stop_tx);
        if thread::current().id() == self.thread_id {
            return;
        }
        if self.handle.join().is_err() {
            tracing::error!("poll thread panicked");
        }
    }
}

fn run(engine: Arc<Engine>, stop: Receiver<()>) {
    info!("Poll thread started (delay: {:?})", engine.delay());

    loop {
        engine.run_cycle(&stop);

        // The sender is dropped to stop us, which reads as Disconnected
        match stop.recv_timeout(engine.delay()) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    info!("Poll thread stopped");
}
