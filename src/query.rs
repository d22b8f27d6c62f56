//! Parse free-form query strings into structured predicates.
//!
//! `@name`, `#tag`, `category:value`, and one date-range expression are
//! pulled out of the raw string (first occurrence wins for each); whatever
//! survives, whitespace-collapsed, is the free-text term.

use std::sync::LazyLock;

use chrono::{Duration, NaiveDate};
use regex::Regex;

static PERSON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)@([a-zA-Z][a-zA-Z0-9_-]*)").unwrap());
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)#([a-zA-Z][a-zA-Z0-9_-]*)").unwrap());
static CATEGORY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|\s)category:([a-zA-Z0-9_-]+)").unwrap());

static EXPLICIT_FROM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bfrom\s+(\d{4}-\d{2}-\d{2})\s+to\s+(\d{4}-\d{2}-\d{2})\b").unwrap()
});
static EXPLICIT_BETWEEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bbetween\s+(\d{4}-\d{2}-\d{2})\s+and\s+(\d{4}-\d{2}-\d{2})\b").unwrap()
});
static TODAY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\btoday\b").unwrap());
static YESTERDAY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\byesterday\b").unwrap());
static WEEK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:this\s+week|past\s+week|last\s+7\s+days)\b").unwrap()
});
static LAST_WEEK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\blast\s+week\b").unwrap());
static MONTH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:this\s+month|past\s+month|last\s+30\s+days)\b").unwrap()
});
static PAST_DAYS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:past|last)\s+(\d+)\s+days?\b").unwrap());

/// Structured form of a query string. Every field is optional; an entirely
/// empty query means "show recent notes".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    pub text: Option<String>,
    pub person: Option<String>,
    pub tag: Option<String>,
    pub category: Option<String>,
    pub since: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
    pub limit: Option<usize>,
}

impl ParsedQuery {
    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.person.is_none()
            && self.tag.is_none()
            && self.category.is_none()
            && self.since.is_none()
            && self.until.is_none()
    }
}

/// Parse a raw query. Deterministic given `today`, which anchors relative
/// date phrases.
pub fn parse_query(raw: &str, today: NaiveDate) -> ParsedQuery {
    let mut query = ParsedQuery::default();
    let mut remainder = raw.to_string();

    if let Some(caps) = PERSON_RE.captures(&remainder) {
        query.person = Some(caps[1].to_lowercase());
        remainder = strip_range(&remainder, caps.get(0).map(|m| (m.start(), m.end())));
    }
    if let Some(caps) = TAG_RE.captures(&remainder) {
        query.tag = Some(caps[1].to_string());
        remainder = strip_range(&remainder, caps.get(0).map(|m| (m.start(), m.end())));
    }
    if let Some(caps) = CATEGORY_RE.captures(&remainder) {
        query.category = Some(caps[1].to_string());
        remainder = strip_range(&remainder, caps.get(0).map(|m| (m.start(), m.end())));
    }

    remainder = extract_date_range(&mut query, remainder, today);

    let text = remainder.split_whitespace().collect::<Vec<_>>().join(" ");
    query.text = if text.is_empty() { None } else { Some(text) };
    query
}

/// At most one date-range expression is honored. Patterns are tried in
/// priority order, explicit ranges before relative phrases; the first
/// pattern that matches wins and only its fragment is stripped.
fn extract_date_range(query: &mut ParsedQuery, remainder: String, today: NaiveDate) -> String {
    for re in [&*EXPLICIT_FROM_RE, &*EXPLICIT_BETWEEN_RE] {
        if let Some(caps) = re.captures(&remainder) {
            let a = NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d");
            let b = NaiveDate::parse_from_str(&caps[2], "%Y-%m-%d");
            if let (Ok(a), Ok(b)) = (a, b) {
                let (since, until) = if a <= b { (a, b) } else { (b, a) };
                query.since = Some(since);
                query.until = Some(until);
                return strip_range(&remainder, caps.get(0).map(|m| (m.start(), m.end())));
            }
            // date-shaped but not a real date: treat as free text
        }
    }

    let relative: [(&Regex, i64, i64); 5] = [
        (&TODAY_RE, 0, 0),
        (&YESTERDAY_RE, 1, 1),
        (&WEEK_RE, 7, 0),
        (&LAST_WEEK_RE, 14, 7),
        (&MONTH_RE, 30, 0),
    ];
    for (re, back_since, back_until) in relative {
        if let Some(m) = re.find(&remainder) {
            query.since = Some(today - Duration::days(back_since));
            query.until = Some(today - Duration::days(back_until));
            return strip_range(&remainder, Some((m.start(), m.end())));
        }
    }

    if let Some(caps) = PAST_DAYS_RE.captures(&remainder) {
        let days = caps[1].parse::<i64>().unwrap_or(0).min(36_500);
        query.since = Some(today - Duration::days(days));
        query.until = Some(today);
        return strip_range(&remainder, caps.get(0).map(|m| (m.start(), m.end())));
    }

    remainder
}

fn strip_range(s: &str, range: Option<(usize, usize)>) -> String {
    match range {
        Some((start, end)) => format!("{} {}", &s[..start], &s[end..]),
        None => s.to_string(),
    }
}
