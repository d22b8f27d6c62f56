//! # Daybook
//!
//! A local-first index and search engine for dated, front-matter-tagged
//! notes.
//!
//! Daybook watches a directory of Markdown notes named `YYYY-MM-DD.md`,
//! parses their front matter, `#tags`, and `@mentions` into SQLite, and
//! answers structured queries (people, tags, categories, date ranges,
//! free text) from the index. The notes on disk stay the source of truth;
//! the index is derived state that can be rebuilt at any time.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────┐   ┌───────────┐
//! │ Notes dir │──▶│  Parser  │──▶│  SQLite   │
//! │ *.md      │   │ fm+tags  │   │ FTS5      │
//! └─────┬─────┘   └──────────┘   └─────┬─────┘
//!       │                              │
//!  ┌────▼────┐                   ┌─────▼─────┐
//!  │ Watcher │                   │ Retrieval │
//!  │ (notify)│                   │  engine   │
//!  └─────────┘                   └─────┬─────┘
//!                                      │
//!                                ┌─────▼─────┐
//!                                │    CLI    │
//!                                │   (dbk)   │
//!                                └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! dbk init                        # create the index database
//! dbk index                       # index the notes root
//! dbk watch                       # keep the index current while editing
//! dbk search "@hannah past week"
//! dbk search "#meeting category:work"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`parse`] | Note front matter, tags, and mentions |
//! | [`scan`] | Filesystem discovery of note files |
//! | [`watch`] | Debounced change detection |
//! | [`index`] | SQLite-backed note index |
//! | [`query`] | Query string parsing |
//! | [`engine`] | Retrieval: predicate intersection and ranking |
//! | [`ingest`] | One-shot and continuous indexing |
//! | [`snippet`] | Excerpt extraction for search results |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`error`] | Error taxonomy |

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod index;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod parse;
pub mod query;
pub mod scan;
pub mod snippet;
pub mod watch;
