// SPDX-License-Identifier: MIT OR Apache-2.0
//! Debounced watching of graph and config files.
//!
//! Watches the parent directories of the given files and forwards only
//! events that touch one of them. Bursts of writes inside the debounce
//! window arrive as a single batch.

use notify::{EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, RecommendedCache};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::Duration;

/// Events emitted by the graph watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A watched file was created or modified
    Changed(PathBuf),
    /// A watched file was deleted
    Removed(PathBuf),
    /// The watcher reported an error
    Error(String),
}

/// Watches a fixed set of files
pub struct GraphWatcher {
    _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
    event_rx: Receiver<WatchEvent>,
}

impl GraphWatcher {
    /// Start watching `files` with the given debounce window
    pub fn new(files: &[PathBuf], debounce: Duration) -> Result<Self, notify::Error> {
        let (event_tx, event_rx) = mpsc::channel();
        let watched: HashSet<PathBuf> = files.iter().map(|f| absolute(f)).collect();
        let filter = watched.clone();

        let mut debouncer = new_debouncer(
            debounce,
            None,
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    for event in events {
                        for watch_event in classify(&event.kind, &event.paths, &filter) {
                            let _ = event_tx.send(watch_event);
                        }
                    }
                }
                Err(errors) => {
                    for error in errors {
                        let _ = event_tx.send(WatchEvent::Error(error.to_string()));
                    }
                }
            },
        )?;

        let dirs: HashSet<&Path> = watched.iter().filter_map(|f| f.parent()).collect();
        for dir in dirs {
            debouncer.watch(dir, RecursiveMode::NonRecursive)?;
            tracing::info!("Watching {:?} for changes", dir);
        }

        Ok(Self {
            _debouncer: debouncer,
            event_rx,
        })
    }

    /// Block until the next event; `None` once the watcher has shut down
    pub fn recv(&self) -> Option<WatchEvent> {
        self.event_rx.recv().ok()
    }

    /// Take every event already queued (non-blocking)
    pub fn drain(&self) -> Vec<WatchEvent> {
        let mut events = Vec::new();
        loop {
            match self.event_rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::warn!("Watcher channel disconnected");
                    break;
                }
            }
        }
        events
    }
}

/// Whether a batch of events calls for a re-run
pub fn needs_rerun(events: &[WatchEvent]) -> bool {
    events.iter().any(|e| matches!(e, WatchEvent::Changed(_)))
}

/// Map a raw notify event onto watch events for the watched files
fn classify(kind: &EventKind, paths: &[PathBuf], watched: &HashSet<PathBuf>) -> Vec<WatchEvent> {
    let relevant = paths.iter().filter(|p| watched.contains(p.as_path())).cloned();
    match kind {
        EventKind::Create(_) | EventKind::Modify(_) => relevant.map(WatchEvent::Changed).collect(),
        EventKind::Remove(_) => relevant.map(WatchEvent::Removed).collect(),
        EventKind::Any | EventKind::Access(_) | EventKind::Other => Vec::new(),
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    })
}
