//! Filesystem watching for finished transfers.
//!
//! A thin wrapper around `notify` that forwards arrivals (created files and
//! directories, or targets of completed renames) to a handler. Download
//! clients typically write to a staging name and rename into place when the
//! transfer completes, so renames count as arrivals while in-place
//! modifications do not.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use notify::event::{CreateKind, EventKind, ModifyKind, RenameMode};
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use plexnudge_core::paths;

pub(crate) const WATCH_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug)]
enum WatchMessage {
    Event(Event),
    Error(String),
}

/// Owns the notify watchers and the task that forwards their events.
pub struct TransferWatcher {
    watchers: Vec<RecommendedWatcher>,
    forward_task: JoinHandle<()>,
}

impl TransferWatcher {
    /// Starts watching `roots` recursively, invoking `on_arrival` for every
    /// path that looks like a finished transfer. Roots that do not exist
    /// are skipped with a warning; at least one must be usable.
    pub fn spawn<F>(roots: Vec<PathBuf>, on_arrival: F) -> anyhow::Result<Self>
    where
        F: Fn(&Path) + Send + 'static,
    {
        let usable: Vec<PathBuf> = roots
            .into_iter()
            .filter(|root| {
                if root.exists() {
                    true
                } else {
                    warn!(root = %root.display(), "watch root does not exist, skipping");
                    false
                }
            })
            .collect();
        if usable.is_empty() {
            bail!("no usable watch roots");
        }

        let (tx, rx) = mpsc::channel(WATCH_CHANNEL_CAPACITY);
        let watchers = init_watchers(&usable, tx)?;
        let forward_task = tokio::spawn(forward_loop(rx, on_arrival));

        Ok(Self {
            watchers,
            forward_task,
        })
    }

    pub fn shutdown(self) {
        self.forward_task.abort();
        // Dropping the watchers stops the notify callbacks.
    }
}

impl fmt::Debug for TransferWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferWatcher")
            .field("watcher_count", &self.watchers.len())
            .field("forward_task_finished", &self.forward_task.is_finished())
            .finish()
    }
}

async fn forward_loop<F>(mut rx: mpsc::Receiver<WatchMessage>, on_arrival: F)
where
    F: Fn(&Path) + Send + 'static,
{
    while let Some(message) = rx.recv().await {
        match message {
            WatchMessage::Event(event) => {
                let Some(path) = arrival_path(&event) else {
                    continue;
                };
                if !is_refresh_candidate(&event.kind, path) {
                    continue;
                }
                debug!(path = %path.display(), "transfer arrival");
                on_arrival(path);
            }
            WatchMessage::Error(error) => {
                warn!(%error, "filesystem watcher error");
            }
        }
    }
}

/// Extracts the arriving path from a notify event, if the event represents
/// an arrival at all. For a rename within the tree the destination is the
/// last path in the event.
fn arrival_path(event: &Event) -> Option<&PathBuf> {
    match event.kind {
        EventKind::Create(_) => event.paths.first(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event.paths.first(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event.paths.last(),
        _ => None,
    }
}

/// Directories always qualify; files only when they carry a media
/// extension, so sidecars and partial downloads stay quiet.
fn is_refresh_candidate(kind: &EventKind, path: &Path) -> bool {
    if matches!(kind, EventKind::Create(CreateKind::Folder)) || path.is_dir() {
        return true;
    }
    path.to_str().map(paths::is_media_file).unwrap_or(false)
}

fn init_watchers(
    roots: &[PathBuf],
    watcher_tx: mpsc::Sender<WatchMessage>,
) -> anyhow::Result<Vec<RecommendedWatcher>> {
    let mut watchers = Vec::with_capacity(roots.len());
    for root in roots {
        let root_clone = root.clone();
        let tx_event = watcher_tx.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if let Err(err) = tx_event.blocking_send(WatchMessage::Event(event)) {
                        warn!(
                            "watch channel send failed for {}: {}",
                            root_clone.display(),
                            err
                        );
                    }
                }
                Err(err) => {
                    let msg = err.to_string();
                    let _ = tx_event.blocking_send(WatchMessage::Error(msg));
                }
            },
            NotifyConfig::default(),
        )
        .with_context(|| format!("failed to create watcher for {}", root.display()))?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .with_context(|| format!("failed to watch {}", root.display()))?;

        watchers.push(watcher);
    }

    Ok(watchers)
}
