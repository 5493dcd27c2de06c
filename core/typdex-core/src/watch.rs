//! Watcher bridge: filesystem change events routed into reconciliation (made by FontLab https://www.fontlab.com/)

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

use crate::catalog::{Category, CategoryStatus};
use crate::scanner::Scanner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchKind {
    Add,
    Change,
    Remove,
}

/// One normalized change notification for an absolute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchKind,
    pub path: PathBuf,
}

/// Flatten a raw notify event into normalized per-path events. Access and
/// metadata-only kinds carry no catalog-relevant change and are dropped.
pub fn normalize(event: &Event) -> Vec<WatchEvent> {
    let kind = match event.kind {
        EventKind::Create(_) => WatchKind::Add,
        EventKind::Modify(_) => WatchKind::Change,
        EventKind::Remove(_) => WatchKind::Remove,
        _ => return Vec::new(),
    };

    event
        .paths
        .iter()
        .map(|path| WatchEvent {
            kind,
            path: path.clone(),
        })
        .collect()
}

/// Route one normalized event into the engine.
///
/// Add/change reconcile through the scanner with the owning category
/// resolved by longest-prefix match; remove deletes by path (cascading the
/// faces). Events under no known root, and hidden entries, are ignored.
pub fn apply_event(scanner: &Scanner, event: &WatchEvent) {
    match event.kind {
        WatchKind::Add | WatchKind::Change => {
            let categories = scanner.catalog().categories();
            let Some(category) = owning_category(&categories, &event.path) else {
                debug!(path = %event.path.display(), "event outside watched roots");
                return;
            };
            if hidden_below(&category.path, &event.path) {
                return;
            }
            if let Err(err) = scanner.process_file(&event.path, category.id, &category.path) {
                warn!(path = %event.path.display(), %err, "watch reconciliation failed");
            }
        }
        WatchKind::Remove => {
            if scanner.catalog().delete_file_by_path(&event.path) {
                debug!(path = %event.path.display(), "dropped removed file from catalog");
            }
        }
    }
}

/// The deepest `ok` category whose root contains `path`.
fn owning_category<'a>(categories: &'a [Category], path: &Path) -> Option<&'a Category> {
    categories
        .iter()
        .filter(|c| c.status == CategoryStatus::Ok && path.starts_with(&c.path))
        .max_by_key(|c| c.path.as_os_str().len())
}

// Hidden means a dot-prefixed component below the watched root; the root's
// own prefix (e.g. ~/.fonts) is the user's choice and stays eligible.
fn hidden_below(root: &Path, path: &Path) -> bool {
    path.strip_prefix(root)
        .map(|rel| {
            rel.components().any(
                |c| matches!(c, Component::Normal(os) if os.to_string_lossy().starts_with('.')),
            )
        })
        .unwrap_or(false)
}

/// Live bridge between the filesystem and the scanner. Holds the underlying
/// watcher for the process lifetime; dropping it tears the stream down.
pub struct WatcherBridge {
    _watcher: RecommendedWatcher,
}

impl WatcherBridge {
    /// Subscribe to every `ok` category root, recursively. Events arrive on
    /// the watcher's own thread and run concurrently with full scans.
    pub fn start(scanner: Arc<Scanner>) -> Result<Self> {
        let handler = scanner.clone();
        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    for normalized in normalize(&event) {
                        apply_event(&handler, &normalized);
                    }
                }
                Err(err) => warn!(%err, "watch stream error"),
            }
        })
        .context("creating filesystem watcher")?;

        for category in scanner.catalog().categories() {
            if category.status != CategoryStatus::Ok {
                continue;
            }
            watcher
                .watch(&category.path, RecursiveMode::Recursive)
                .with_context(|| format!("watching {}", category.path.display()))?;
        }

        Ok(Self { _watcher: watcher })
    }
}
