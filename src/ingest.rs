//! Ingestion: getting notes from disk into the index.
//!
//! One-shot indexing walks the notes root and upserts whatever it finds;
//! watch mode consumes the debounced event stream and applies each change
//! as it lands. Both paths share [`ingest_file`], which skips the write
//! when the stored content hash already matches the file.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::index::NoteIndex;
use crate::models::NoteEvent;
use crate::parse;
use crate::scan;
use crate::watch::NoteWatcher;

/// What happened to a single file during ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Indexed,
    Unchanged,
    Missing,
}

/// Parse one note file and upsert it into the index. Returns `Unchanged`
/// without touching the index when the stored content hash still matches;
/// `force` reindexes regardless. A file that vanished between discovery
/// and read reports `Missing` rather than an error.
pub async fn ingest_file(
    config: &Config,
    index: &NoteIndex,
    path: &Path,
    force: bool,
) -> Result<IngestOutcome> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(IngestOutcome::Missing),
        Err(e) => return Err(Error::io(path, e)),
    };
    let note = parse::parse_note(path, &raw, &config.notes.default_category)?;
    if !force && index.content_hash(&note.id).await?.as_deref() == Some(note.content_hash.as_str())
    {
        debug!(id = %note.id, "content unchanged; skipping");
        return Ok(IngestOutcome::Unchanged);
    }
    index.upsert(&note).await?;
    Ok(IngestOutcome::Indexed)
}

/// Walk the notes root and ingest every note file, printing a summary.
/// Malformed notes are skipped with a warning; they never abort the run.
pub async fn index_all(config: &Config, index: &NoteIndex, force: bool) -> Result<()> {
    let paths = scan::collect_notes(config)?;

    let mut indexed = 0u64;
    let mut unchanged = 0u64;
    let mut malformed = 0u64;

    for path in &paths {
        match ingest_file(config, index, path, force).await {
            Ok(IngestOutcome::Indexed) => indexed += 1,
            Ok(IngestOutcome::Unchanged) => unchanged += 1,
            Ok(IngestOutcome::Missing) => {}
            Err(Error::MalformedNote { path, reason }) => {
                warn!(path = %path.display(), reason = %reason, "skipping malformed note");
                malformed += 1;
            }
            Err(e) => return Err(e),
        }
    }

    println!("index {}", config.notes.root.display());
    println!("  notes found: {}", paths.len());
    println!("  indexed: {indexed}");
    println!("  unchanged: {unchanged}");
    if malformed > 0 {
        println!("  malformed (skipped): {malformed}");
    }
    println!("ok");
    Ok(())
}

/// Drop all derived state and reindex every note currently on disk.
/// Returns the number of notes written into the fresh index.
pub async fn rebuild_from_disk(config: &Config, index: &NoteIndex) -> Result<usize> {
    let paths = scan::collect_notes(config)?;
    let mut notes = Vec::with_capacity(paths.len());
    for path in &paths {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(Error::io(path, e)),
        };
        match parse::parse_note(path, &raw, &config.notes.default_category) {
            Ok(note) => notes.push(note),
            Err(Error::MalformedNote { path, reason }) => {
                warn!(path = %path.display(), reason = %reason, "skipping malformed note");
            }
            Err(e) => return Err(e),
        }
    }
    index.rebuild(&notes).await
}

/// Watch the notes root and keep the index current until the watcher dies
/// or the process is stopped. Storage errors are fatal; malformed or
/// vanished files are not.
pub async fn run_watch(config: &Config, index: &NoteIndex) -> Result<()> {
    let (mut events, _watcher) = NoteWatcher::spawn(config)?;
    info!(root = %config.notes.root.display(), "watching for changes");

    while let Some(event) = events.recv().await {
        match event {
            NoteEvent::Ready => info!("caught up; index is current"),
            NoteEvent::Changed(path) => match ingest_file(config, index, &path, false).await {
                Ok(IngestOutcome::Indexed) => info!(path = %path.display(), "indexed"),
                Ok(_) => {}
                Err(Error::MalformedNote { path, reason }) => {
                    warn!(path = %path.display(), reason = %reason, "skipping malformed note");
                }
                Err(e) => return Err(e),
            },
            NoteEvent::Removed(path) => {
                if let Some(id) = parse::note_id(&path) {
                    if index.remove(id).await? {
                        info!(id, "removed from index");
                    }
                }
            }
            NoteEvent::Lost(reason) => return Err(Error::WatchUnavailable(reason)),
        }
    }
    Ok(())
}
