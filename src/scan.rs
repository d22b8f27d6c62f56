//! Discover note files under the configured root.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::parse;

/// Decides which paths count as notes: configured extension, strict dated
/// stem, not hidden, not ignored, not inside the index directory. Shared by
/// the scanner and the watcher so both see the same set of files.
#[derive(Debug)]
pub struct NoteFilter {
    root: PathBuf,
    index_dir: PathBuf,
    extension: String,
    ignore: GlobSet,
}

impl NoteFilter {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            root: config.notes.root.clone(),
            index_dir: config.index_dir(),
            extension: config.notes.extension.clone(),
            ignore: build_globset(&config.notes.ignore)?,
        })
    }

    pub fn matches(&self, path: &Path) -> bool {
        if !parse::is_note_path(path, &self.extension) {
            return false;
        }
        if path.starts_with(&self.index_dir) {
            return false;
        }
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        let hidden = relative.components().any(|c| {
            c.as_os_str()
                .to_str()
                .map(|s| s.starts_with('.'))
                .unwrap_or(false)
        });
        if hidden {
            return false;
        }
        !self.ignore.is_match(relative)
    }
}

/// Walk the notes root and return every note path in sorted order.
pub fn collect_notes(config: &Config) -> Result<Vec<PathBuf>> {
    let root = &config.notes.root;
    if !root.is_dir() {
        return Err(Error::Config(format!(
            "notes root does not exist: {}",
            root.display()
        )));
    }

    let filter = NoteFilter::new(config)?;
    let mut paths = Vec::new();

    let walker = WalkDir::new(root).follow_links(false).into_iter();
    for entry in walker.filter_entry(|e| !is_hidden(e)) {
        let entry = entry.map_err(|e| {
            let path = e
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.clone());
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "walk failed"));
            Error::io(path, source)
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if filter.matches(entry.path()) {
            paths.push(entry.path().to_path_buf());
        }
    }

    // Sort for deterministic ordering
    paths.sort();
    Ok(paths)
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(
            Glob::new(pattern)
                .map_err(|e| Error::Config(format!("invalid ignore pattern {pattern:?}: {e}")))?,
        );
    }
    builder
        .build()
        .map_err(|e| Error::Config(format!("invalid ignore patterns: {e}")))
}
