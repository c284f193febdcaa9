//! Snapshot diffing
//!
//! Pure comparison of two [`Snapshot`] trees for the same path. No I/O
//! happens here; capture and diff are kept apart so the algorithm can be
//! exercised against hand-built trees.
//!
//! Existence is decided strictly by the `exists` flag: a delete followed by
//! a recreate is always two events on two polls, never one `Changed`.

use crate::event::ChangeEvent;
use crate::snapshot::Snapshot;
use std::collections::BTreeSet;

/// Compute the events that turn `old` into `new`
///
/// `old == None` means the path was not known to exist. Events come out in
/// a deterministic order: the path itself first, then its children by name,
/// depth first.
pub fn diff(old: Option<&Snapshot>, new: &Snapshot) -> Vec<ChangeEvent> {
    let mut events = Vec::new();
    diff_into(old, new, &mut events);
    events
}

fn diff_into(old: Option<&Snapshot>, new: &Snapshot, out: &mut Vec<ChangeEvent>) {
    let old = old.filter(|o| o.exists);

    match (old, new.exists) {
        (None, false) => return,
        (Some(old), false) => {
            out.push(ChangeEvent::deleted(old.id.clone()));
            return;
        }
        (None, true) => out.push(ChangeEvent::created(new.id.clone())),
        (Some(old), true) => {
            if is_modified(old, new) {
                out.push(ChangeEvent::changed(new.id.clone()));
            }
        }
    }

    if !new.is_folder {
        return;
    }

    let old_children = old.filter(|o| o.is_folder).map(|o| &o.children);
    let names: BTreeSet<&String> = new
        .children
        .keys()
        .chain(old_children.into_iter().flat_map(|c| c.keys()))
        .collect();

    for name in names {
        let before = old_children.and_then(|c| c.get(name)).map(AsRef::as_ref);
        match new.children.get(name) {
            Some(after) => diff_into(before, after, out),
            None => {
                if let Some(before) = before.filter(|b| b.exists) {
                    out.push(ChangeEvent::deleted(before.id.clone()));
                }
            }
        }
    }
}

/// Files change when their timestamp or size moves. A folder's own
/// timestamp follows its children, so it is never reported; a flip between
/// file and folder is.
fn is_modified(old: &Snapshot, new: &Snapshot) -> bool {
    if old.is_folder != new.is_folder {
        return true;
    }
    !new.is_folder && (old.last_modified != new.last_modified || old.size != new.size)
}
