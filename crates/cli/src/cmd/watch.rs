//! Watch paths and print changes

use crate::util;
use anyhow::{Context, Result};
use chrono::Local;
use owo_colors::OwoColorize;
use statwatch_core::{ChangeEvent, ChangeKind, LocalFile};
use statwatch_watcher::{FileListener, FileMonitor, MonitorConfig};
use std::io::Write;
use std::path::PathBuf;
use std::thread;
use tracing::{debug, info};

pub struct WatchArgs {
    pub paths: Vec<PathBuf>,
    pub delay_ms: Option<u64>,
    pub recursive: bool,
    pub checks_per_run: Option<usize>,
    pub config: Option<PathBuf>,
    pub json: bool,
}

/// Prints each event as one line on stdout
struct EventPrinter {
    json: bool,
}

impl FileListener for EventPrinter {
    fn on_change(&self, event: &ChangeEvent) -> Result<()> {
        let now = Local::now();
        let mut stdout = std::io::stdout().lock();

        if self.json {
            let line = serde_json::json!({
                "time": now.to_rfc3339(),
                "kind": event.kind,
                "file": event.file,
            });
            writeln!(stdout, "{}", line)?;
        } else {
            let kind = match event.kind {
                ChangeKind::Created => event.kind.as_str().green().to_string(),
                ChangeKind::Deleted => event.kind.as_str().red().to_string(),
                ChangeKind::Changed => event.kind.as_str().yellow().to_string(),
            };
            writeln!(stdout, "{} {:<7} {}", util::format_clock(now).dimmed(), kind, event.file)?;
        }

        stdout.flush()?;
        Ok(())
    }
}

fn build_config(args: &WatchArgs) -> Result<MonitorConfig> {
    let mut config = match &args.config {
        Some(path) => MonitorConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => MonitorConfig::default(),
    };

    if let Some(delay_ms) = args.delay_ms {
        config.delay_ms = delay_ms;
    }
    if args.recursive {
        config.recursive = true;
    }
    if let Some(checks) = args.checks_per_run {
        config.checks_per_run = checks;
    }

    Ok(config.normalized())
}

pub async fn run(args: WatchArgs) -> Result<()> {
    // 1. Resolve configuration
    let config = build_config(&args)?;
    debug!("Effective config: {:?}", config);
    let delay = config.delay();

    // 2. Register paths; the baseline is taken here
    let monitor = FileMonitor::with_config(EventPrinter { json: args.json }, config);
    for path in &args.paths {
        let file = LocalFile::handle(path)
            .with_context(|| format!("Invalid path: {}", path.display()))?;
        monitor.add_file(file)?;
        info!("Watching {}", path.display());
    }

    // 3. Diagnostics are already logged; count them for the exit summary
    let diagnostics = monitor.diagnostics();
    let counter = thread::Builder::new()
        .name("statwatch-diagnostics".to_string())
        .spawn(move || diagnostics.iter().count())
        .context("Failed to spawn diagnostics thread")?;

    // 4. Poll until interrupted
    monitor.start()?;
    eprintln!(
        "{} {} path(s) every {:?}, press Ctrl-C to stop",
        "Watching".bold(),
        args.paths.len(),
        delay
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    // 5. Tear down; closing disconnects the diagnostics channel
    let cycles = monitor.cycles();
    monitor.close();
    let warnings = counter.join().unwrap_or(0);

    eprintln!();
    eprintln!("Stopped after {} poll cycle(s)", cycles);
    if warnings > 0 {
        eprintln!("{} {} warning(s) during watch", "Note:".yellow(), warnings);
    }

    Ok(())
}
