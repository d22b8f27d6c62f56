//! Execute parsed queries against the note index.
//!
//! Each predicate produces its own unbounded result set; sets are
//! intersected by id keeping the leftmost set's order and attributes, in
//! fixed order: date range, person, tag, category, free text. Snippets are
//! re-derived for the survivors and only then is the result truncated.

use std::collections::HashSet;

use chrono::{Duration, NaiveDate};
use tracing::debug;

use crate::config::RetrievalConfig;
use crate::error::Result;
use crate::index::NoteIndex;
use crate::models::SearchHit;
use crate::query::ParsedQuery;
use crate::snippet::make_snippet;

pub async fn execute(
    index: &NoteIndex,
    query: &ParsedQuery,
    today: NaiveDate,
    retrieval: &RetrievalConfig,
) -> Result<Vec<SearchHit>> {
    let limit = query.limit.unwrap_or(retrieval.default_limit);

    // An empty query lists recent notes.
    if query.is_empty() {
        let since = today - Duration::days(retrieval.recent_days);
        let mut hits = index.query_by_date_range(since, today, None).await?;
        hits.truncate(limit);
        return Ok(hits);
    }

    let mut sets: Vec<Vec<SearchHit>> = Vec::new();

    if query.since.is_some() || query.until.is_some() {
        // Open bounds clamp to the representable date range; ids are
        // zero-padded so the string comparison still works.
        let since = query
            .since
            .or_else(|| NaiveDate::from_ymd_opt(1, 1, 1))
            .unwrap_or(today);
        let until = query
            .until
            .or_else(|| NaiveDate::from_ymd_opt(9999, 12, 31))
            .unwrap_or(today);
        sets.push(index.query_by_date_range(since, until, None).await?);
    }
    if let Some(person) = &query.person {
        sets.push(index.query_by_person(person, None).await?);
    }
    if let Some(tag) = &query.tag {
        sets.push(index.query_by_tag(tag, None).await?);
    }
    if let Some(category) = &query.category {
        sets.push(index.query_by_category(category, None).await?);
    }
    if let Some(text) = &query.text {
        sets.push(index.query_text(text, None).await?);
    }

    // Left fold: keep the left set's ordering, drop ids missing on the right.
    let mut iter = sets.into_iter();
    let mut merged = iter.next().unwrap_or_default();
    for right in iter {
        let ids: HashSet<String> = right.into_iter().map(|h| h.id).collect();
        merged.retain(|h| ids.contains(&h.id));
    }
    debug!(results = merged.len(), "merged predicate sets");

    // Re-derive snippets around the best available term: free text beats
    // person beats tag. Stored snippets stand when no term applies.
    let has_terms = query.text.is_some() || query.person.is_some() || query.tag.is_some();
    if has_terms {
        for hit in &mut merged {
            if let Some(note) = index.get(&hit.id).await? {
                hit.snippet = snippet_for(&note.body, query, retrieval.snippet_width);
            }
        }
    }

    merged.truncate(limit);
    Ok(merged)
}

fn snippet_for(body: &str, query: &ParsedQuery, width: usize) -> String {
    let lower = body.to_lowercase();

    let mut groups: Vec<Vec<&str>> = Vec::new();
    if let Some(text) = &query.text {
        groups.push(text.split_whitespace().collect());
    }
    if let Some(person) = &query.person {
        groups.push(vec![person.as_str()]);
    }
    if let Some(tag) = &query.tag {
        groups.push(vec![tag.as_str()]);
    }

    for group in &groups {
        let present = group
            .iter()
            .any(|term| lower.contains(&term.to_lowercase()));
        if present {
            return make_snippet(body, group, width);
        }
    }
    make_snippet(body, &[], width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use crate::models::Note;
    use crate::query::parse_query;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::path::PathBuf;

    async fn memory_index() -> NoteIndex {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        NoteIndex::new(pool, 160)
    }

    fn note(id: &str, body: &str, tags: &[&str], mentions: &[&str], category: &str) -> Note {
        Note {
            id: id.to_string(),
            path: PathBuf::from(format!("/notes/{id}.md")),
            title: format!("note {id}"),
            category: category.to_string(),
            tags: tags.iter().map(|s| s.to_string()).collect(),
            mentions: mentions.iter().map(|s| s.to_string()).collect(),
            created_at: 1_700_000_000,
            updated_at: 1_700_000_100,
            body: body.to_string(),
            content_hash: crate::parse::content_hash(body),
        }
    }

    async fn seeded() -> NoteIndex {
        let index = memory_index().await;
        index
            .upsert(&note(
                "2024-12-20",
                "old entry about the roadmap",
                &[],
                &[],
                "daily",
            ))
            .await
            .unwrap();
        index
            .upsert(&note(
                "2025-01-01",
                "kickoff with @hannah about the roadmap",
                &["planning"],
                &["hannah"],
                "work",
            ))
            .await
            .unwrap();
        index
            .upsert(&note(
                "2025-01-05",
                "standup with @hannah and @bob",
                &["meeting"],
                &["hannah", "bob"],
                "work",
            ))
            .await
            .unwrap();
        index
            .upsert(&note("2025-01-07", "quiet day", &[], &[], "daily"))
            .await
            .unwrap();
        index
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn today() -> NaiveDate {
        day("2025-01-08")
    }

    #[tokio::test]
    async fn empty_query_lists_recent_notes() {
        let index = seeded().await;
        let hits = execute(
            &index,
            &ParsedQuery::default(),
            today(),
            &RetrievalConfig::default(),
        )
        .await
        .unwrap();

        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["2025-01-07", "2025-01-05", "2025-01-01"]);
    }

    #[tokio::test]
    async fn person_and_tag_intersect() {
        let index = seeded().await;
        let query = parse_query("@hannah #meeting", today());
        let hits = execute(&index, &query, today(), &RetrievalConfig::default())
            .await
            .unwrap();

        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["2025-01-05"]);
    }

    #[tokio::test]
    async fn person_and_text_intersect() {
        let index = seeded().await;
        let query = parse_query("@hannah standup", today());
        let hits = execute(&index, &query, today(), &RetrievalConfig::default())
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "2025-01-05");
        assert!(hits[0].snippet.contains("standup"));
    }

    #[tokio::test]
    async fn date_range_keeps_left_order() {
        let index = seeded().await;
        let query = parse_query("past week roadmap", today());
        let hits = execute(&index, &query, today(), &RetrievalConfig::default())
            .await
            .unwrap();

        // the old December note matches the text but not the range
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["2025-01-01"]);
        // attributes come from the left (date) set
        assert_eq!(hits[0].score, 0.0);
    }

    #[tokio::test]
    async fn truncation_happens_after_intersection() {
        let index = seeded().await;
        let mut query = parse_query("@hannah roadmap", today());
        query.limit = Some(1);
        let hits = execute(&index, &query, today(), &RetrievalConfig::default())
            .await
            .unwrap();

        // hannah's set is [2025-01-05, 2025-01-01]; only the kickoff note
        // matches the text. Truncating the person set first would lose it.
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "2025-01-01");
    }

    #[tokio::test]
    async fn snippet_prefers_text_over_person() {
        let index = memory_index().await;
        let body = format!(
            "sync with @hannah first thing {} the roadmap discussion came later",
            "filler ".repeat(60)
        );
        index
            .upsert(&note("2025-01-06", &body, &[], &["hannah"], "daily"))
            .await
            .unwrap();

        let query = parse_query("@hannah roadmap", today());
        let hits = execute(&index, &query, today(), &RetrievalConfig::default())
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert!(hits[0].snippet.contains("roadmap"));
        assert!(!hits[0].snippet.contains("hannah"));
    }

    #[tokio::test]
    async fn person_only_snippets_around_the_name() {
        let index = memory_index().await;
        let body = format!(
            "{} then @hannah reviewed the draft {}",
            "filler ".repeat(60),
            "filler ".repeat(60)
        );
        index
            .upsert(&note("2025-01-06", &body, &[], &["hannah"], "daily"))
            .await
            .unwrap();

        let query = parse_query("@hannah", today());
        let hits = execute(&index, &query, today(), &RetrievalConfig::default())
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert!(hits[0].snippet.contains("hannah"));
    }

    #[tokio::test]
    async fn recent_view_honors_the_limit() {
        let index = seeded().await;
        let retrieval = RetrievalConfig {
            default_limit: 2,
            ..RetrievalConfig::default()
        };
        let hits = execute(&index, &ParsedQuery::default(), today(), &retrieval)
            .await
            .unwrap();

        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["2025-01-07", "2025-01-05"]);
    }

    #[tokio::test]
    async fn category_filter_applies() {
        let index = seeded().await;
        let query = parse_query("category:work", today());
        let hits = execute(&index, &query, today(), &RetrievalConfig::default())
            .await
            .unwrap();

        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["2025-01-05", "2025-01-01"]);
    }

    #[tokio::test]
    async fn no_matches_is_empty_not_an_error() {
        let index = seeded().await;
        let query = parse_query("@nobody", today());
        let hits = execute(&index, &query, today(), &RetrievalConfig::default())
            .await
            .unwrap();
        assert!(hits.is_empty());
    }
}
