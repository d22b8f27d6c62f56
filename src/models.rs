//! Core data models used throughout daybook.
//!
//! These types represent the notes, entities, and search results that flow
//! through the ingestion and retrieval pipeline.

use std::path::PathBuf;

use serde::Serialize;

/// A parsed note: front-matter metadata plus body text.
///
/// The id is the file stem and doubles as the note's date (`YYYY-MM-DD`).
#[derive(Debug, Clone, Serialize)]
pub struct Note {
    pub id: String,
    pub path: PathBuf,
    pub title: String,
    pub category: String,
    pub tags: Vec<String>,
    pub mentions: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub body: String,
    pub content_hash: String,
}

/// An extracted entity (currently people referenced by `@name`).
#[derive(Debug, Clone, Serialize)]
pub struct Entity {
    pub name: String,
    pub kind: String,
    pub first_seen: i64,
    pub last_seen: i64,
    pub mention_count: i64,
}

/// A ranked hit returned from the index or the retrieval engine.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    pub category: String,
    pub tags: Vec<String>,
    pub mentions: Vec<String>,
    pub updated_at: i64,
    pub score: f64,
    pub snippet: String,
}

/// Aggregate index counters.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub note_count: i64,
    pub entity_count: i64,
    pub last_indexed_at: Option<i64>,
}

/// Events emitted by the change detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteEvent {
    /// The initial catch-up scan is complete; later events are live changes.
    Ready,
    /// A note file was created or modified (debounced).
    Changed(PathBuf),
    /// A note file was deleted or renamed away.
    Removed(PathBuf),
    /// The watch failed after starting; no further events will arrive.
    Lost(String),
}
