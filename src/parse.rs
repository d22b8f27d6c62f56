//! Parse note files into structured documents.
//!
//! A note is an optional front-matter block delimited by `---` lines,
//! followed by the body. The metadata is a hand-rolled `key: value` subset
//! (no serde_yaml): inline `[a, b]` and indented `- item` lists, quoted
//! values, `#` comments. Inline `#tags` and `@mentions` are also extracted
//! from the body and merged into the metadata sets.

use std::path::Path;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::models::Note;

static INLINE_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)#([a-zA-Z][a-zA-Z0-9_-]*)").unwrap());
static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)@([a-zA-Z][a-zA-Z0-9_-]*)").unwrap());

/// File stem, used as the note id.
pub fn note_id(path: &Path) -> Option<&str> {
    path.file_stem()?.to_str()
}

/// Strict `YYYY-MM-DD` check: zero-padded and a real calendar date.
pub fn note_date(stem: &str) -> Option<NaiveDate> {
    if stem.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok()
}

pub fn is_note_id(stem: &str) -> bool {
    note_date(stem).is_some()
}

/// True when the path has the configured extension and a date-shaped stem.
pub fn is_note_path(path: &Path, extension: &str) -> bool {
    let ext_ok = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(extension))
        .unwrap_or(false);
    ext_ok
        && path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(is_note_id)
            .unwrap_or(false)
}

/// Hex SHA-256 of the raw file contents, for unchanged-file skipping.
pub fn content_hash(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Default)]
struct FrontMatter {
    title: Option<String>,
    category: Option<String>,
    tags: Vec<String>,
    mentions: Vec<String>,
    created: Option<String>,
    updated: Option<String>,
}

#[derive(Clone, Copy)]
enum ListKey {
    Tags,
    Mentions,
}

/// Parse a note file into a [`Note`].
///
/// The id comes from the file stem; parsing proceeds even when the stem is
/// not a valid date (callers filter non-dated paths before invoking).
/// A metadata block that is present but not parseable fails with
/// [`Error::MalformedNote`]; an absent block means every field takes its
/// default.
pub fn parse_note(path: &Path, raw: &str, default_category: &str) -> Result<Note> {
    let id = note_id(path)
        .ok_or_else(|| Error::malformed(path, "path has no file name"))?
        .to_string();

    let (fm, body) = match split_front_matter(raw) {
        Ok(Some((block, body))) => (parse_block(path, &block)?, body),
        Ok(None) => (FrontMatter::default(), raw.to_string()),
        Err(e) => return Err(e.into_malformed(path)),
    };

    let created_at = match &fm.created {
        Some(v) => parse_timestamp(v)
            .ok_or_else(|| Error::malformed(path, format!("invalid created timestamp: {v:?}")))?,
        None => note_date(&id)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc().timestamp())
            .or_else(|| fm.updated.as_deref().and_then(parse_timestamp))
            .unwrap_or(0),
    };
    let updated_at = match &fm.updated {
        Some(v) => parse_timestamp(v)
            .ok_or_else(|| Error::malformed(path, format!("invalid updated timestamp: {v:?}")))?,
        None => created_at,
    };
    // Timestamps are monotonic: updated never precedes created.
    let updated_at = updated_at.max(created_at);

    let mut tags = fm.tags;
    for tag in extract_inline_tags(&body) {
        let lower = tag.to_lowercase();
        if !tags.iter().any(|t| t.to_lowercase() == lower) {
            tags.push(tag);
        }
    }

    let mut mentions: Vec<String> = Vec::new();
    for name in fm
        .mentions
        .iter()
        .map(|m| m.to_lowercase())
        .chain(extract_mentions(&body))
    {
        if !mentions.contains(&name) {
            mentions.push(name);
        }
    }

    let title = match fm.title {
        Some(t) if !t.trim().is_empty() => t,
        _ => id.clone(),
    };

    Ok(Note {
        id,
        path: path.to_path_buf(),
        title,
        category: fm.category.unwrap_or_else(|| default_category.to_string()),
        tags,
        mentions,
        created_at,
        updated_at,
        content_hash: content_hash(raw),
        body,
    })
}

enum SplitError {
    Unterminated,
}

impl SplitError {
    fn into_malformed(self, path: &Path) -> Error {
        match self {
            SplitError::Unterminated => {
                Error::malformed(path, "front matter opened with --- but never closed")
            }
        }
    }
}

/// Split content into (front-matter lines, body). `None` when no block exists.
fn split_front_matter(raw: &str) -> std::result::Result<Option<(Vec<String>, String)>, SplitError> {
    let mut lines = raw.lines();
    let mut leading = 0usize;
    let first = loop {
        match lines.next() {
            Some(l) if l.trim().is_empty() => leading += 1,
            other => break other,
        }
    };
    if first.map(|l| l.trim_end()) != Some("---") {
        return Ok(None);
    }

    let rest: Vec<&str> = raw.lines().skip(leading + 1).collect();
    let close = rest
        .iter()
        .position(|l| l.trim_end() == "---")
        .ok_or(SplitError::Unterminated)?;

    let block: Vec<String> = rest[..close].iter().map(|l| l.to_string()).collect();
    let body = rest[close + 1..]
        .join("\n")
        .trim_start_matches('\n')
        .to_string();
    Ok(Some((block, body)))
}

fn parse_block(path: &Path, lines: &[String]) -> Result<FrontMatter> {
    let mut fm = FrontMatter::default();
    let mut open_list: Option<ListKey> = None;

    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(item) = trimmed.strip_prefix("- ") {
            let item = unquote(item);
            if item.is_empty() {
                continue;
            }
            match open_list {
                Some(ListKey::Tags) => fm.tags.push(item),
                Some(ListKey::Mentions) => fm.mentions.push(item),
                None => {
                    return Err(Error::malformed(
                        path,
                        format!("list item outside a list: {trimmed:?}"),
                    ))
                }
            }
            continue;
        }

        let Some((key, value)) = trimmed.split_once(':') else {
            return Err(Error::malformed(
                path,
                format!("unrecognized metadata line: {trimmed:?}"),
            ));
        };
        let key = key.trim();
        let value = value.trim();

        open_list = None;
        match key {
            "title" => fm.title = Some(unquote(value)),
            "category" => fm.category = Some(unquote(value)),
            "tags" => {
                if value.is_empty() {
                    fm.tags.clear();
                    open_list = Some(ListKey::Tags);
                } else {
                    fm.tags = parse_inline_list(value);
                }
            }
            "mentions" => {
                if value.is_empty() {
                    fm.mentions.clear();
                    open_list = Some(ListKey::Mentions);
                } else {
                    fm.mentions = parse_inline_list(value);
                }
            }
            "created" => fm.created = Some(unquote(value)),
            "updated" => fm.updated = Some(unquote(value)),
            _ => {}
        }
    }

    Ok(fm)
}

/// Accept RFC 3339, `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DD HH:MM:SS`, or a bare
/// date (midnight UTC). Naive forms are read as UTC.
fn parse_timestamp(value: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.timestamp());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.and_utc().timestamp());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
}

fn extract_inline_tags(text: &str) -> Vec<String> {
    INLINE_TAG_RE
        .captures_iter(text)
        .map(|cap| cap[1].to_string())
        .collect()
}

fn extract_mentions(text: &str) -> Vec<String> {
    MENTION_RE
        .captures_iter(text)
        .map(|cap| cap[1].to_lowercase())
        .collect()
}

/// Remove surrounding quotes from a string.
fn unquote(s: &str) -> String {
    let s = s.trim();
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"'))
            || (s.starts_with('\'') && s.ends_with('\'')))
    {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}

/// Parse an inline list like `[foo, bar, "baz qux"]`; a bare scalar is a
/// one-element list.
fn parse_inline_list(s: &str) -> Vec<String> {
    let s = s.trim();
    let inner = if s.starts_with('[') && s.ends_with(']') {
        &s[1..s.len() - 1]
    } else {
        s
    };

    inner
        .split(',')
        .map(|item| unquote(item.trim()))
        .filter(|item| !item.is_empty())
        .collect()
}
