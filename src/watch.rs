//! Watch the notes root for changes.
//!
//! Wraps a platform watcher (notify) behind a debounced stream of
//! [`NoteEvent`]s: a catch-up pass over existing notes, a `Ready` marker,
//! then live changes. Rapid writes to one file collapse into a single
//! `Changed` once the file has been quiet for the configured period;
//! deletions pass through immediately.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::NoteEvent;
use crate::scan::{self, NoteFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChangeKind {
    Write,
    Remove,
}

struct RawChange {
    kind: ChangeKind,
    path: PathBuf,
}

enum Classified {
    Write,
    Remove,
    RenameBoth,
    Ignore,
}

fn classify(kind: &EventKind) -> Classified {
    match kind {
        EventKind::Create(_) => Classified::Write,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Classified::Remove,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Classified::Write,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => Classified::RenameBoth,
        EventKind::Modify(ModifyKind::Metadata(_)) => Classified::Ignore,
        EventKind::Modify(_) => Classified::Write,
        EventKind::Remove(_) => Classified::Remove,
        EventKind::Access(_) => Classified::Ignore,
        EventKind::Any => Classified::Write,
        EventKind::Other => Classified::Ignore,
    }
}

/// Owns the platform watcher and the debounce task. Dropping it stops both
/// and closes the event stream.
pub struct NoteWatcher {
    _watcher: RecommendedWatcher,
    pump: JoinHandle<()>,
}

impl Drop for NoteWatcher {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

impl NoteWatcher {
    /// Start watching the configured notes root.
    ///
    /// Emits `Changed` for every existing note, then exactly one `Ready`,
    /// then debounced live events. Fails with [`Error::WatchUnavailable`]
    /// when the root is missing or the watch cannot be established; a
    /// failure after startup surfaces as a final [`NoteEvent::Lost`].
    pub fn spawn(config: &Config) -> Result<(mpsc::Receiver<NoteEvent>, NoteWatcher)> {
        let root = config.notes.root.clone();
        if !root.is_dir() {
            return Err(Error::WatchUnavailable(format!(
                "notes root does not exist: {}",
                root.display()
            )));
        }
        let filter =
            NoteFilter::new(config).map_err(|e| Error::WatchUnavailable(e.to_string()))?;

        let (raw_tx, mut raw_rx) = mpsc::channel::<RawChange>(config.watch.channel_capacity);
        let (event_tx, event_rx) = mpsc::channel::<NoteEvent>(config.watch.channel_capacity);

        let mut watcher = notify::recommended_watcher(
            move |result: std::result::Result<Event, notify::Error>| {
                let event = match result {
                    Ok(event) => event,
                    Err(e) => {
                        error!("watch error: {e}");
                        return;
                    }
                };
                let send = |kind: ChangeKind, path: PathBuf| {
                    if let Err(e) = raw_tx.blocking_send(RawChange { kind, path }) {
                        error!("failed to forward watch event: {e}");
                    }
                };
                match classify(&event.kind) {
                    Classified::Write => {
                        for path in event.paths {
                            send(ChangeKind::Write, path);
                        }
                    }
                    Classified::Remove => {
                        for path in event.paths {
                            send(ChangeKind::Remove, path);
                        }
                    }
                    Classified::RenameBoth => {
                        // paths come as [from, to]
                        let mut paths = event.paths.into_iter();
                        if let Some(from) = paths.next() {
                            send(ChangeKind::Remove, from);
                        }
                        for to in paths {
                            send(ChangeKind::Write, to);
                        }
                    }
                    Classified::Ignore => {}
                }
            },
        )
        .map_err(|e| Error::WatchUnavailable(e.to_string()))?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| Error::WatchUnavailable(e.to_string()))?;

        let quiet = Duration::from_millis(config.watch.quiet_ms);
        let scan_config = config.clone();
        let pump = tokio::spawn(async move {
            pump_events(scan_config, filter, quiet, &mut raw_rx, &event_tx).await;
        });

        Ok((event_rx, NoteWatcher { _watcher: watcher, pump }))
    }
}

async fn pump_events(
    config: Config,
    filter: NoteFilter,
    quiet: Duration,
    raw_rx: &mut mpsc::Receiver<RawChange>,
    event_tx: &mpsc::Sender<NoteEvent>,
) {
    // Catch-up pass over what is already on disk.
    match scan::collect_notes(&config) {
        Ok(paths) => {
            for path in paths {
                if event_tx.send(NoteEvent::Changed(path)).await.is_err() {
                    return;
                }
            }
            if event_tx.send(NoteEvent::Ready).await.is_err() {
                return;
            }
        }
        Err(e) => {
            let _ = event_tx.send(NoteEvent::Lost(e.to_string())).await;
            return;
        }
    }

    let mut pending: HashMap<PathBuf, Instant> = HashMap::new();
    loop {
        let deadline = pending.values().min().copied();
        let sleep_to = deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

        tokio::select! {
            raw = raw_rx.recv() => {
                let Some(change) = raw else {
                    let _ = event_tx.send(NoteEvent::Lost("watch backend stopped".to_string())).await;
                    return;
                };
                if !filter.matches(&change.path) {
                    continue;
                }
                match change.kind {
                    ChangeKind::Write => {
                        debug!(path = %change.path.display(), "write observed; debouncing");
                        pending.insert(change.path, Instant::now() + quiet);
                    }
                    ChangeKind::Remove => {
                        pending.remove(&change.path);
                        if event_tx.send(NoteEvent::Removed(change.path)).await.is_err() {
                            return;
                        }
                    }
                }
            }
            _ = sleep_until(sleep_to), if deadline.is_some() => {
                let now = Instant::now();
                let due: Vec<PathBuf> = pending
                    .iter()
                    .filter(|(_, at)| **at <= now)
                    .map(|(path, _)| path.clone())
                    .collect();
                for path in due {
                    pending.remove(&path);
                    if event_tx.send(NoteEvent::Changed(path)).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
}
