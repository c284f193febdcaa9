//! Side channel for soft failures
//!
//! Capture and listener failures never reach the caller that started the
//! monitor. They are logged and fanned out to any subscribed receivers. A
//! full or abandoned receiver never blocks the poll thread.

use crate::listener::ListenerId;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use statwatch_core::{ChangeEvent, FileId};
use std::fmt;
use std::time::Duration;
use tracing::warn;

/// A soft failure observed during a poll cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Capture failed; the previous snapshot was kept
    CaptureFailed { file: FileId, error: String },

    /// A listener returned an error
    ListenerFailed {
        file: FileId,
        listener: ListenerId,
        event: ChangeEvent,
        error: String,
    },

    /// A listener panicked
    ListenerPanicked {
        file: FileId,
        listener: ListenerId,
        event: ChangeEvent,
        message: String,
    },

    /// Capture took longer than the configured threshold
    SlowCapture { file: FileId, elapsed: Duration },
}

impl Diagnostic {
    /// Path the diagnostic is about, the watched path or one of its descendants
    pub fn file(&self) -> &FileId {
        match self {
            Diagnostic::CaptureFailed { file, .. }
            | Diagnostic::ListenerFailed { file, .. }
            | Diagnostic::ListenerPanicked { file, .. }
            | Diagnostic::SlowCapture { file, .. } => file,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::CaptureFailed { file, error } => {
                write!(f, "capture of {} failed: {}", file, error)
            }
            Diagnostic::ListenerFailed { listener, event, error, .. } => {
                write!(f, "{} failed on '{}': {}", listener, event, error)
            }
            Diagnostic::ListenerPanicked { listener, event, message, .. } => {
                write!(f, "{} panicked on '{}': {}", listener, event, message)
            }
            Diagnostic::SlowCapture { file, elapsed } => {
                write!(f, "capture of {} took {:?}", file, elapsed)
            }
        }
    }
}

/// Fan-out of diagnostics to subscribers
pub struct DiagnosticSink {
    capacity: usize,
    subscribers: Mutex<Vec<Sender<Diagnostic>>>,
}

impl DiagnosticSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Open a new receiver; only diagnostics emitted afterwards are seen
    pub fn subscribe(&self) -> Receiver<Diagnostic> {
        let (tx, rx) = crossbeam_channel::bounded(self.capacity);
        self.subscribers.lock().push(tx);
        rx
    }

    /// Log `diagnostic` and offer it to every live subscriber
    pub fn emit(&self, diagnostic: Diagnostic) {
        warn!("{}", diagnostic);

        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| match tx.try_send(diagnostic.clone()) {
            Ok(()) | Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    /// Drop every subscriber; their receivers see a disconnect
    pub fn close(&self) {
        self.subscribers.lock().clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
