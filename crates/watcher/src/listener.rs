//! Listener callbacks

use statwatch_core::ChangeEvent;
use std::fmt;

/// Receives change events for the paths it is bound to
///
/// Invoked synchronously on the monitor's poll thread. Invocations for one
/// monitor never overlap, but consecutive calls may come from different
/// threads (for example after a stop and restart). An `Err` or a panic is
/// reported on the diagnostic channel and does not affect other listeners.
pub trait FileListener: Send + Sync {
    fn on_change(&self, event: &ChangeEvent) -> anyhow::Result<()>;
}

impl<F> FileListener for F
where
    F: Fn(&ChangeEvent) -> anyhow::Result<()> + Send + Sync,
{
    fn on_change(&self, event: &ChangeEvent) -> anyhow::Result<()> {
        self(event)
    }
}

/// Identifies one binding in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}
