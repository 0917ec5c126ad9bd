//! File system watching and incremental sync for Tether
//!
//! This crate provides:
//! - A recursive `notify` watcher that delivers one [`WatchEvent`] per path,
//!   in arrival order, to a single consumer
//! - The incremental synchronizer ([`sync`]) that re-derives the touched part
//!   of the map for each event

pub mod sync;

use anyhow::{Context, Result};
use notify::event::ModifyKind;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub use sync::{process, Change};

/// File system event
///
/// The kind is what the platform reported; the synchronizer re-stats the
/// path and decides for itself what actually happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// Absolute path that changed
    pub path: PathBuf,
    /// Type of change
    pub kind: EventKind,
}

/// Type of file system event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// File created
    Create,
    /// File modified
    Modify,
    /// File deleted
    Delete,
    /// File renamed (reported once per side of the rename)
    Rename,
}

/// Recursive watcher over a project root
///
/// Dropping the watcher stops delivery.
pub struct FsWatcher {
    _watcher: RecommendedWatcher,
}

impl FsWatcher {
    /// Watch `root` recursively, handing every event to `sink`
    ///
    /// `sink` runs on the notify thread; it should only enqueue.
    pub fn start<F>(root: &Path, sink: F) -> Result<Self>
    where
        F: Fn(WatchEvent) + Send + 'static,
    {
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for watch_event in split_event(event) {
                        sink(watch_event);
                    }
                }
                Err(e) => warn!("File watcher error: {}", e),
            },
            Config::default(),
        )
        .context("Failed to create file watcher")?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch path: {}", root.display()))?;
        debug!("Started watching path: {}", root.display());

        Ok(Self { _watcher: watcher })
    }

    /// Watch `root`, delivering events on an unbounded channel
    pub fn channel(root: &Path) -> Result<(Self, mpsc::UnboundedReceiver<WatchEvent>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let watcher = Self::start(root, move |event| {
            // Receiver gone means the engine is shutting down
            let _ = tx.send(event);
        })?;
        Ok((watcher, rx))
    }
}

/// One event per affected path; access notifications are dropped
fn split_event(event: Event) -> Vec<WatchEvent> {
    use notify::EventKind as Notify;

    let kind = match event.kind {
        Notify::Create(_) => EventKind::Create,
        Notify::Remove(_) => EventKind::Delete,
        Notify::Modify(ModifyKind::Name(_)) => EventKind::Rename,
        Notify::Modify(_) | Notify::Any | Notify::Other => EventKind::Modify,
        Notify::Access(_) => return Vec::new(),
    };

    event
        .paths
        .into_iter()
        .map(|path| WatchEvent { path, kind })
        .collect()
}
