//! Common utilities for monitor integration tests

#![allow(dead_code)]

use parking_lot::Mutex;
use statwatch_watcher::{ChangeEvent, FileListener, FileMonitor, MonitorConfig};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Listener that records every event it sees, in order
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded events rendered as `"<kind> <id>"`
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl FileListener for Recorder {
    fn on_change(&self, event: &ChangeEvent) -> anyhow::Result<()> {
        self.events.lock().push(event.to_string());
        Ok(())
    }
}

/// Config with the shortest allowed delay
pub fn fast_config() -> MonitorConfig {
    MonitorConfig {
        delay_ms: 20,
        ..MonitorConfig::default()
    }
}

/// Monitor with a recording default listener
pub fn recording_monitor(config: MonitorConfig) -> (FileMonitor, Recorder) {
    let recorder = Recorder::new();
    let monitor = FileMonitor::with_config(recorder.clone(), config);
    (monitor, recorder)
}

/// Block until `n` more poll cycles have completed
///
/// Two cycles after a mutation guarantee at least one full cycle started
/// after it, so its events have been delivered.
pub fn wait_for_cycles(monitor: &FileMonitor, n: u64) {
    let target = monitor.cycles() + n;
    let deadline = Instant::now() + Duration::from_secs(10);
    while monitor.cycles() < target {
        assert!(
            Instant::now() < deadline,
            "timed out waiting for {} poll cycles",
            n
        );
        thread::sleep(Duration::from_millis(5));
    }
}

/// Wait for every change made so far to be observed
pub fn settle(monitor: &FileMonitor) {
    wait_for_cycles(monitor, 2);
}
