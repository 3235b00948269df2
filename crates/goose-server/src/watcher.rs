//! File watching and debouncing for live reload.

use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::Instant;
use walkdir::WalkDir;

use crate::shutdown::Shutdown;

/// Kind of a qualifying filesystem change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Write,
    Remove,
    Rename,
}

/// A filesystem change that may trigger a rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    /// Convert a notify event into change events, one per affected path.
    ///
    /// Unspecified events count as writes. Access, metadata-only and
    /// `Other` events yield nothing, as do paths whose file name starts
    /// with a dot.
    pub fn from_notify(event: &notify::Event) -> Vec<ChangeEvent> {
        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Create,
            EventKind::Remove(_) => ChangeKind::Remove,
            EventKind::Modify(ModifyKind::Name(_)) => ChangeKind::Rename,
            EventKind::Modify(ModifyKind::Metadata(_)) => return Vec::new(),
            EventKind::Modify(_) | EventKind::Any => ChangeKind::Write,
            _ => return Vec::new(),
        };

        event
            .paths
            .iter()
            .filter(|path| !is_hidden(path))
            .map(|path| ChangeEvent {
                path: path.clone(),
                kind,
            })
            .collect()
    }
}

/// Errors that prevent the watcher from starting.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("Failed to initialize file watcher: {0}")]
    Init(notify::Error),

    #[error("Failed to watch {path}: {source}")]
    Register { path: PathBuf, source: notify::Error },

    #[error("Failed to scan {path}: {source}")]
    Scan { path: PathBuf, source: walkdir::Error },
}

/// File watcher for detecting changes.
///
/// Every non-hidden directory under the root is registered once, when the
/// watcher is created. Directories created afterwards are not picked up.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    watched: Vec<PathBuf>,
}

impl FileWatcher {
    /// Create a new file watcher for `root`.
    ///
    /// Changes under `exclude` (typically the output directory, when it lives
    /// inside the source tree) are ignored. Returns the watcher and a channel
    /// to receive events.
    pub fn new(
        root: &Path,
        exclude: Option<&Path>,
    ) -> Result<(Self, mpsc::Receiver<ChangeEvent>), WatchError> {
        let (tx, rx) = mpsc::channel(100);

        let root = canonical(root);
        let exclude = exclude.map(canonical);
        let filter = exclude.clone();

        let mut watcher =
            notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
                match res {
                    Ok(event) => {
                        for change in ChangeEvent::from_notify(&event) {
                            if is_excluded(&change.path, filter.as_deref()) {
                                continue;
                            }
                            tracing::debug!(path = %change.path.display(), kind = ?change.kind, "File changed");
                            let _ = tx.blocking_send(change);
                        }
                    }
                    Err(e) => tracing::warn!("Watcher error: {}", e),
                }
            })
            .map_err(WatchError::Init)?;

        let mut watched = Vec::new();
        let walker = WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0
                    || !(is_hidden(e.path()) || is_excluded(e.path(), exclude.as_deref()))
            });

        for entry in walker {
            let entry = entry.map_err(|source| WatchError::Scan {
                path: root.clone(),
                source,
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }

            watcher
                .watch(entry.path(), RecursiveMode::NonRecursive)
                .map_err(|source| WatchError::Register {
                    path: entry.path().to_path_buf(),
                    source,
                })?;
            watched.push(entry.into_path());
        }

        Ok((
            Self {
                _watcher: watcher,
                watched,
            },
            rx,
        ))
    }

    /// Directories registered with the OS, in walk order.
    pub fn watched_dirs(&self) -> &[PathBuf] {
        &self.watched
    }
}

/// Run `on_settled` once per burst of events.
///
/// Every event pushes the deadline out to `quiet_period` after it; when the
/// deadline passes with no further events, `on_settled` is awaited. Events
/// that arrive meanwhile are queued and start the next window once it
/// returns. Returns on shutdown or when the event stream ends.
pub async fn debounce<F, Fut>(
    mut events: mpsc::Receiver<ChangeEvent>,
    quiet_period: Duration,
    mut on_settled: F,
    mut shutdown: Shutdown,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut deadline: Option<Instant> = None;

    while !shutdown.is_triggered() {
        tokio::select! {
            _ = shutdown.wait() => break,
            event = events.recv() => match event {
                Some(_) => deadline = Some(Instant::now() + quiet_period),
                None => break,
            },
            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                on_settled().await;
            }
        }
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

fn is_excluded(path: &Path, exclude: Option<&Path>) -> bool {
    exclude.is_some_and(|dir| path.starts_with(dir))
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
