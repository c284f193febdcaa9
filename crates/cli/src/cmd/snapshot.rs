//! Capture and print the current state of a path

use crate::util;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use serde::Serialize;
use statwatch_core::{capture, LocalFile, Snapshot};
use std::path::Path;

/// JSON shape of a captured tree
#[derive(Debug, Serialize)]
struct SnapshotView {
    path: String,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
    modified: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<SnapshotView>,
}

impl From<&Snapshot> for SnapshotView {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            path: snapshot.id.to_string(),
            kind: if snapshot.is_folder { "folder" } else { "file" },
            size: (!snapshot.is_folder).then_some(snapshot.size),
            modified: snapshot.last_modified.map(util::format_rfc3339),
            children: snapshot
                .children
                .values()
                .map(|c| SnapshotView::from(c.as_ref()))
                .collect(),
        }
    }
}

pub fn run(path: &Path, recursive: bool, json: bool) -> Result<()> {
    let file = LocalFile::new(path)
        .with_context(|| format!("Invalid path: {}", path.display()))?;
    let snapshot = capture(&file, recursive)
        .with_context(|| format!("Failed to capture {}", path.display()))?;

    if !snapshot.exists {
        anyhow::bail!("No such file or directory: {}", path.display());
    }

    if json {
        let view = SnapshotView::from(&snapshot);
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    print_tree(&snapshot, &snapshot.id.to_string(), 0);
    println!();
    println!("{} path(s)", snapshot.node_count());
    Ok(())
}

fn print_tree(snapshot: &Snapshot, name: &str, depth: usize) {
    let indent = "  ".repeat(depth);
    let modified = snapshot
        .last_modified
        .map(util::format_absolute_time)
        .unwrap_or_default();

    if snapshot.is_folder {
        println!("{}{}/  {}", indent, name.blue().bold(), modified.dimmed());
    } else {
        println!(
            "{}{}  {}  {}",
            indent,
            name,
            util::format_size(snapshot.size).cyan(),
            modified.dimmed()
        );
    }

    for (child_name, child) in &snapshot.children {
        print_tree(child, child_name, depth + 1);
    }
}
