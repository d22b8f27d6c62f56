//! Persistent note index over SQLite + FTS5.
//!
//! One row per note, a weighted full-text table over title/body/tags/
//! mentions, and an entity table fed by `@mentions`. Upserts are single
//! transactions; entity mention counts only ever grow, except across a full
//! [`NoteIndex::rebuild`].

use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{Entity, IndexStats, Note, SearchHit};
use crate::snippet::make_snippet;

pub struct NoteIndex {
    pool: SqlitePool,
    snippet_width: usize,
}

impl NoteIndex {
    pub fn new(pool: SqlitePool, snippet_width: usize) -> Self {
        Self {
            pool,
            snippet_width,
        }
    }

    /// Insert or replace a note and refresh its entity links.
    ///
    /// Idempotent: upserting the same note twice leaves one row and
    /// unchanged mention counts. A mention dropped from the note loses its
    /// link but the entity keeps its count.
    pub async fn upsert(&self, note: &Note) -> Result<()> {
        let now = Utc::now().timestamp();
        let tags_json = serde_json::to_string(&note.tags)?;
        let mentions_json = serde_json::to_string(&note.mentions)?;

        let mut tx = self.pool.begin().await?;

        // Replace the FTS row
        sqlx::query("DELETE FROM notes_fts WHERE note_id = ?")
            .bind(&note.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO notes (id, path, title, category, tags, mentions, created_at, updated_at, body, content_hash, indexed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                path = excluded.path,
                title = excluded.title,
                category = excluded.category,
                tags = excluded.tags,
                mentions = excluded.mentions,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                body = excluded.body,
                content_hash = excluded.content_hash,
                indexed_at = excluded.indexed_at
            "#,
        )
        .bind(&note.id)
        .bind(note.path.display().to_string())
        .bind(&note.title)
        .bind(&note.category)
        .bind(&tags_json)
        .bind(&mentions_json)
        .bind(note.created_at)
        .bind(note.updated_at)
        .bind(&note.body)
        .bind(&note.content_hash)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO notes_fts (note_id, title, body, tags, mentions) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&note.id)
        .bind(&note.title)
        .bind(&note.body)
        .bind(note.tags.join(" "))
        .bind(note.mentions.join(" "))
        .execute(&mut *tx)
        .await?;

        // Refresh entity links. Entity keys are lowercase.
        let mut keep_ids: Vec<i64> = Vec::new();
        for name in &note.mentions {
            let name = name.to_lowercase();
            sqlx::query(
                r#"
                INSERT INTO entities (name, kind, first_seen, last_seen, mention_count)
                VALUES (?, 'person', ?, ?, 0)
                ON CONFLICT(name, kind) DO NOTHING
                "#,
            )
            .bind(&name)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            let entity_id: i64 =
                sqlx::query_scalar("SELECT id FROM entities WHERE name = ? AND kind = 'person'")
                    .bind(&name)
                    .fetch_one(&mut *tx)
                    .await?;

            let inserted =
                sqlx::query("INSERT OR IGNORE INTO note_mentions (note_id, entity_id) VALUES (?, ?)")
                    .bind(&note.id)
                    .bind(entity_id)
                    .execute(&mut *tx)
                    .await?;

            if inserted.rows_affected() == 1 {
                // Only a newly created link bumps the count.
                sqlx::query(
                    "UPDATE entities SET mention_count = mention_count + 1, last_seen = MAX(last_seen, ?) WHERE id = ?",
                )
                .bind(now)
                .bind(entity_id)
                .execute(&mut *tx)
                .await?;
            } else {
                sqlx::query("UPDATE entities SET last_seen = MAX(last_seen, ?) WHERE id = ?")
                    .bind(now)
                    .bind(entity_id)
                    .execute(&mut *tx)
                    .await?;
            }
            keep_ids.push(entity_id);
        }

        // Drop links for mentions no longer present; counts stay as they are.
        if keep_ids.is_empty() {
            sqlx::query("DELETE FROM note_mentions WHERE note_id = ?")
                .bind(&note.id)
                .execute(&mut *tx)
                .await?;
        } else {
            let placeholders = vec!["?"; keep_ids.len()].join(", ");
            let sql = format!(
                "DELETE FROM note_mentions WHERE note_id = ? AND entity_id NOT IN ({placeholders})"
            );
            let mut query = sqlx::query(&sql).bind(&note.id);
            for id in &keep_ids {
                query = query.bind(*id);
            }
            query.execute(&mut *tx).await?;
        }

        tx.commit().await?;
        debug!(id = %note.id, "indexed note");
        Ok(())
    }

    /// Delete a note from the store and the full-text table. Links cascade;
    /// entity rows and their counts are left alone. Idempotent.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM notes_fts WHERE note_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM notes WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let removed = result.rows_affected() > 0;
        if removed {
            debug!(id = %id, "removed note");
        }
        Ok(removed)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Note>> {
        let row = sqlx::query(
            "SELECT id, path, title, category, tags, mentions, created_at, updated_at, body, content_hash FROM notes WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| note_from_row(&r)).transpose()
    }

    /// Stored content hash, used to skip unchanged files on re-ingest.
    pub async fn content_hash(&self, id: &str) -> Result<Option<String>> {
        let hash: Option<String> =
            sqlx::query_scalar("SELECT content_hash FROM notes WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(hash)
    }

    /// Weighted full-text search: title counts double, mentions one and a
    /// half times body text. Results come back in rank order.
    pub async fn query_text(&self, terms: &str, limit: Option<usize>) -> Result<Vec<SearchHit>> {
        let match_query = escape_fts5_query(terms);
        if match_query.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT notes.id, notes.title, notes.category, notes.tags, notes.mentions,
                   notes.updated_at, notes.body,
                   bm25(notes_fts, 0.0, 2.0, 1.0, 1.0, 1.5) AS rank
            FROM notes_fts
            JOIN notes ON notes.id = notes_fts.note_id
            WHERE notes_fts MATCH ?
            ORDER BY rank
            LIMIT ?
            "#,
        )
        .bind(&match_query)
        .bind(limit_or_all(limit))
        .fetch_all(&self.pool)
        .await?;

        let term_list: Vec<&str> = terms.split_whitespace().collect();
        rows.iter()
            .map(|row| {
                let rank: f64 = row.get("rank");
                // negate so higher = better
                self.hit_from_row(row, -rank, &term_list)
            })
            .collect()
    }

    /// Notes linked to a person entity, newest first.
    pub async fn query_by_person(&self, name: &str, limit: Option<usize>) -> Result<Vec<SearchHit>> {
        let rows = sqlx::query(
            r#"
            SELECT notes.id, notes.title, notes.category, notes.tags, notes.mentions,
                   notes.updated_at, notes.body
            FROM notes
            JOIN note_mentions ON note_mentions.note_id = notes.id
            JOIN entities ON entities.id = note_mentions.entity_id
            WHERE entities.name = ? AND entities.kind = 'person'
            ORDER BY notes.id DESC
            LIMIT ?
            "#,
        )
        .bind(name.to_lowercase())
        .bind(limit_or_all(limit))
        .fetch_all(&self.pool)
        .await?;

        let name = name.to_lowercase();
        rows.iter()
            .map(|row| self.hit_from_row(row, 0.0, &[name.as_str()]))
            .collect()
    }

    /// Notes carrying a tag (case-insensitive), newest first.
    pub async fn query_by_tag(&self, tag: &str, limit: Option<usize>) -> Result<Vec<SearchHit>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, category, tags, mentions, updated_at, body
            FROM notes
            WHERE EXISTS (
                SELECT 1 FROM json_each(notes.tags)
                WHERE lower(json_each.value) = lower(?)
            )
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(tag)
        .bind(limit_or_all(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| self.hit_from_row(row, 0.0, &[tag]))
            .collect()
    }

    /// Notes in a category (case-insensitive), newest first.
    pub async fn query_by_category(
        &self,
        category: &str,
        limit: Option<usize>,
    ) -> Result<Vec<SearchHit>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, category, tags, mentions, updated_at, body
            FROM notes
            WHERE lower(category) = lower(?)
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(category)
        .bind(limit_or_all(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| self.hit_from_row(row, 0.0, &[]))
            .collect()
    }

    /// Notes dated within `[since, until]`, newest first. Ids are
    /// zero-padded dates, so lexicographic comparison is chronological.
    pub async fn query_by_date_range(
        &self,
        since: NaiveDate,
        until: NaiveDate,
        limit: Option<usize>,
    ) -> Result<Vec<SearchHit>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, category, tags, mentions, updated_at, body
            FROM notes
            WHERE id BETWEEN ? AND ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(since.format("%Y-%m-%d").to_string())
        .bind(until.format("%Y-%m-%d").to_string())
        .bind(limit_or_all(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| self.hit_from_row(row, 0.0, &[]))
            .collect()
    }

    /// Entities ordered by mention count, then name.
    pub async fn list_entities(&self, kind: Option<&str>) -> Result<Vec<Entity>> {
        let rows = match kind {
            Some(kind) => {
                sqlx::query(
                    "SELECT name, kind, first_seen, last_seen, mention_count FROM entities WHERE kind = ? ORDER BY mention_count DESC, name ASC",
                )
                .bind(kind)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT name, kind, first_seen, last_seen, mention_count FROM entities ORDER BY mention_count DESC, name ASC",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows
            .iter()
            .map(|row| Entity {
                name: row.get("name"),
                kind: row.get("kind"),
                first_seen: row.get("first_seen"),
                last_seen: row.get("last_seen"),
                mention_count: row.get("mention_count"),
            })
            .collect())
    }

    /// Wipe all index and entity state, then re-apply every supplied note.
    ///
    /// Each note commits on its own, so a mid-way failure keeps the notes
    /// already processed and reports how many made it.
    pub async fn rebuild(&self, notes: &[Note]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM notes_fts").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM note_mentions").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM notes").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM entities").execute(&mut *tx).await?;
        tx.commit().await?;

        let mut processed = 0usize;
        for note in notes {
            match self.upsert(note).await {
                Ok(()) => processed += 1,
                Err(Error::Storage(source)) => {
                    return Err(Error::Rebuild { processed, source })
                }
                Err(other) => return Err(other),
            }
        }
        debug!(processed, "rebuilt index");
        Ok(processed)
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        let note_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notes")
            .fetch_one(&self.pool)
            .await?;
        let entity_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entities")
            .fetch_one(&self.pool)
            .await?;
        let last_indexed_at: Option<i64> = sqlx::query_scalar("SELECT MAX(indexed_at) FROM notes")
            .fetch_one(&self.pool)
            .await?;

        Ok(IndexStats {
            note_count,
            entity_count,
            last_indexed_at,
        })
    }

    fn hit_from_row(&self, row: &SqliteRow, score: f64, terms: &[&str]) -> Result<SearchHit> {
        let tags: Vec<String> = serde_json::from_str(&row.get::<String, _>("tags"))?;
        let mentions: Vec<String> = serde_json::from_str(&row.get::<String, _>("mentions"))?;
        let body: String = row.get("body");

        Ok(SearchHit {
            id: row.get("id"),
            title: row.get("title"),
            category: row.get("category"),
            tags,
            mentions,
            updated_at: row.get("updated_at"),
            score,
            snippet: make_snippet(&body, terms, self.snippet_width),
        })
    }
}

fn note_from_row(row: &SqliteRow) -> Result<Note> {
    let tags: Vec<String> = serde_json::from_str(&row.get::<String, _>("tags"))?;
    let mentions: Vec<String> = serde_json::from_str(&row.get::<String, _>("mentions"))?;

    Ok(Note {
        id: row.get("id"),
        path: PathBuf::from(row.get::<String, _>("path")),
        title: row.get("title"),
        category: row.get("category"),
        tags,
        mentions,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        body: row.get("body"),
        content_hash: row.get("content_hash"),
    })
}

/// SQLite treats a negative LIMIT as "no limit".
fn limit_or_all(limit: Option<usize>) -> i64 {
    limit.map(|l| l as i64).unwrap_or(-1)
}

/// Escape user text for an FTS5 MATCH expression. Words carrying FTS5
/// syntax characters are double-quoted; terms are OR-joined so any match
/// ranks rather than all being required.
fn escape_fts5_query(query: &str) -> String {
    let words: Vec<&str> = query
        .split_whitespace()
        .filter(|w| w.chars().any(char::is_alphanumeric))
        .collect();
    if words.is_empty() {
        return String::new();
    }

    let escaped: Vec<String> = words
        .iter()
        .map(|word| {
            let bare = word.chars().all(|c| c.is_alphanumeric() || c == '_');
            let keyword = matches!(*word, "AND" | "OR" | "NOT" | "NEAR");
            if bare && !keyword {
                word.to_string()
            } else {
                format!("\"{}\"", word.replace('"', "\"\""))
            }
        })
        .collect();

    escaped.join(" OR ")
}
