//! Listener registry
//!
//! Maps a watched path to the listeners bound to it. Delivery consults the
//! live bindings for every listener it calls, under the same lock that
//! `unbind` needs, so once `unbind` returns no later delivery can reach a
//! removed listener. The lock is reentrant: a listener may bind or unbind
//! from inside its own callback without deadlocking the poll thread.

use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::listener::{FileListener, ListenerId};
use ahash::AHashMap;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use statwatch_core::{ChangeEvent, FileId};
use std::any::Any;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

type Bindings = AHashMap<FileId, Vec<Binding>>;

#[derive(Clone)]
struct Binding {
    id: ListenerId,
    listener: Arc<dyn FileListener>,
}

/// Outcome of delivering one event
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    /// Listeners that returned `Ok`
    pub delivered: usize,
    /// Listeners that returned `Err` or panicked
    pub failed: usize,
}

/// Holds off every registry mutation from other threads while alive
///
/// The poll thread takes a gate around "check the entry is still current,
/// then dispatch" so the check and the delivery are one atomic step.
pub struct DeliveryGate<'a> {
    _guard: ReentrantMutexGuard<'a, RefCell<Bindings>>,
}

/// Path identity to listener bindings
pub struct ListenerRegistry {
    bindings: ReentrantMutex<RefCell<Bindings>>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            bindings: ReentrantMutex::new(RefCell::new(AHashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Bind `listener` to `file`; listeners are called in binding order
    pub fn bind(&self, file: &FileId, listener: Arc<dyn FileListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let guard = self.bindings.lock();
        guard
            .borrow_mut()
            .entry(file.clone())
            .or_default()
            .push(Binding { id, listener });
        trace!("bound {} to {}", id, file);
        id
    }

    /// Remove every listener bound to `file`, returning how many there were
    pub fn unbind(&self, file: &FileId) -> usize {
        let guard = self.bindings.lock();
        let removed = guard.borrow_mut().remove(file).map_or(0, |b| b.len());
        removed
    }

    /// Remove a single binding
    pub fn unbind_listener(&self, file: &FileId, id: ListenerId) -> bool {
        let guard = self.bindings.lock();
        let mut bindings = guard.borrow_mut();
        let Some(list) = bindings.get_mut(file) else {
            return false;
        };

        let before = list.len();
        list.retain(|b| b.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            bindings.remove(file);
        }
        removed
    }

    pub fn is_bound(&self, file: &FileId) -> bool {
        self.bindings.lock().borrow().contains_key(file)
    }

    pub fn listener_count(&self, file: &FileId) -> usize {
        self.bindings.lock().borrow().get(file).map_or(0, |b| b.len())
    }

    /// Drop every binding
    pub fn clear(&self) {
        self.bindings.lock().borrow_mut().clear();
    }

    /// Block mutations from other threads until the gate is dropped
    pub fn gate(&self) -> DeliveryGate<'_> {
        DeliveryGate {
            _guard: self.bindings.lock(),
        }
    }

    /// Deliver `event` to the listeners currently bound to `file`
    ///
    /// Each listener is re-checked right before it is called, so a listener
    /// unbound by an earlier callback in the same delivery is skipped.
    pub fn dispatch(&self, file: &FileId, event: &ChangeEvent, sink: &DiagnosticSink) -> Delivery {
        let guard = self.bindings.lock();
        let mut outcome = Delivery::default();

        let Some(candidates) = guard.borrow().get(file).cloned() else {
            return outcome;
        };

        for binding in candidates {
            let still_bound = guard
                .borrow()
                .get(file)
                .is_some_and(|list| list.iter().any(|b| b.id == binding.id));
            if !still_bound {
                continue;
            }

            match panic::catch_unwind(AssertUnwindSafe(|| binding.listener.on_change(event))) {
                Ok(Ok(())) => outcome.delivered += 1,
                Ok(Err(e)) => {
                    outcome.failed += 1;
                    sink.emit(Diagnostic::ListenerFailed {
                        file: file.clone(),
                        listener: binding.id,
                        event: event.clone(),
                        error: format!("{:#}", e),
                    });
                }
                Err(payload) => {
                    outcome.failed += 1;
                    sink.emit(Diagnostic::ListenerPanicked {
                        file: file.clone(),
                        listener: binding.id,
                        event: event.clone(),
                        message: panic_message(payload.as_ref()).to_string(),
                    });
                }
            }
        }

        outcome
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "<non-string panic payload>"
    }
}
