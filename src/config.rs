use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub notes: NotesConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotesConfig {
    pub root: PathBuf,
    #[serde(default = "default_extension")]
    pub extension: String,
    #[serde(default = "default_category")]
    pub default_category: String,
    #[serde(default)]
    pub ignore: Vec<String>,
}

fn default_extension() -> String {
    "md".to_string()
}
fn default_category() -> String {
    "daily".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct IndexConfig {
    /// Database file; defaults to `<notes.root>/.daybook/index.db`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WatchConfig {
    #[serde(default = "default_quiet_ms")]
    pub quiet_ms: u64,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            quiet_ms: default_quiet_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_quiet_ms() -> u64 {
    500
}
fn default_channel_capacity() -> usize {
    1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_snippet_width")]
    pub snippet_width: usize,
    #[serde(default = "default_recent_days")]
    pub recent_days: i64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            snippet_width: default_snippet_width(),
            recent_days: default_recent_days(),
        }
    }
}

fn default_limit() -> usize {
    20
}
fn default_snippet_width() -> usize {
    160
}
fn default_recent_days() -> i64 {
    7
}

impl Config {
    /// Programmatic configuration for embedding the engine as a library;
    /// everything but the notes root takes its default.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            notes: NotesConfig {
                root: root.into(),
                extension: default_extension(),
                default_category: default_category(),
                ignore: Vec::new(),
            },
            index: IndexConfig::default(),
            watch: WatchConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }

    pub fn index_db_path(&self) -> PathBuf {
        match &self.index.path {
            Some(p) => p.clone(),
            None => self.notes.root.join(".daybook").join("index.db"),
        }
    }

    /// Directory holding the index; the watcher never reports paths under it.
    pub fn index_dir(&self) -> PathBuf {
        self.index_db_path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.notes.root.clone())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("failed to read config file {}: {e}", path.display()))
    })?;

    let mut config: Config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("failed to parse config file: {e}")))?;

    if config.notes.root.as_os_str().is_empty() {
        return Err(Error::Config("notes.root must not be empty".into()));
    }

    // Accept `.md` and `md` alike.
    if let Some(stripped) = config.notes.extension.strip_prefix('.') {
        config.notes.extension = stripped.to_string();
    }
    if config.notes.extension.is_empty() {
        return Err(Error::Config("notes.extension must not be empty".into()));
    }

    if config.retrieval.default_limit == 0 {
        return Err(Error::Config("retrieval.default_limit must be >= 1".into()));
    }
    if config.retrieval.snippet_width < 16 {
        return Err(Error::Config("retrieval.snippet_width must be >= 16".into()));
    }
    if config.retrieval.recent_days < 1 {
        return Err(Error::Config("retrieval.recent_days must be >= 1".into()));
    }
    if config.watch.channel_capacity == 0 {
        return Err(Error::Config("watch.channel_capacity must be >= 1".into()));
    }

    Ok(config)
}
