//! Contextual snippet extraction.
//!
//! Snippets are windows of the stored body centered on the first query term
//! occurrence, trimmed to word boundaries with `...` markers on cut edges.
//! Stripped of markers, a snippet is always a contiguous substring of the
//! body it came from.

/// Extract a snippet of roughly `width` bytes around the earliest
/// case-insensitive occurrence of any of `terms`. With no terms or no
/// occurrence, the leading window of the body is used instead.
pub fn make_snippet(body: &str, terms: &[&str], width: usize) -> String {
    if body.len() <= width {
        return body.to_string();
    }

    match find_earliest(body, terms) {
        Some((match_start, match_end)) => window_around(body, match_start, match_end, width),
        None => leading_window(body, width),
    }
}

/// Earliest occurrence of any term, as byte offsets into `body`.
fn find_earliest(body: &str, terms: &[&str]) -> Option<(usize, usize)> {
    // Offsets come from the lowercased copy; they are snapped back to char
    // boundaries of the original before slicing.
    let lower = body.to_lowercase();
    let mut best: Option<(usize, usize)> = None;
    for term in terms {
        let term = term.trim();
        if term.is_empty() {
            continue;
        }
        let needle = term.to_lowercase();
        if let Some(pos) = lower.find(&needle) {
            let candidate = (pos, pos + needle.len());
            if best.map(|(s, _)| pos < s).unwrap_or(true) {
                best = Some(candidate);
            }
        }
    }
    best.map(|(s, e)| {
        (
            floor_boundary(body, s),
            ceil_boundary(body, e.min(body.len())),
        )
    })
}

fn window_around(body: &str, match_start: usize, match_end: usize, width: usize) -> String {
    let mid = (match_start + match_end) / 2;
    let mut start = floor_boundary(body, mid.saturating_sub(width / 2));
    let mut end = ceil_boundary(body, (start + width).min(body.len()));
    if end == body.len() {
        start = floor_boundary(body, end.saturating_sub(width));
    }
    // Window always covers the match itself.
    start = start.min(match_start);
    end = end.max(match_end);

    // Trim cut edges inward to whitespace, never crossing the match.
    if start > 0 {
        if let Some((idx, ch)) = body[start..match_start]
            .char_indices()
            .find(|(_, c)| c.is_whitespace())
        {
            start = start + idx + ch.len_utf8();
        }
    }
    if end < body.len() {
        if let Some(idx) = body[match_end..end].rfind(char::is_whitespace) {
            end = match_end + idx;
        }
    }

    let slice = body[start..end].trim();
    let prefix = if body[..start].trim().is_empty() { "" } else { "..." };
    let suffix = if body[end..].trim().is_empty() { "" } else { "..." };
    format!("{prefix}{slice}{suffix}")
}

fn leading_window(body: &str, width: usize) -> String {
    let mut end = ceil_boundary(body, width.min(body.len()));
    if let Some(idx) = body[..end].rfind(char::is_whitespace) {
        if idx > 0 {
            end = idx;
        }
    }
    let slice = body[..end].trim();
    if body[end..].trim().is_empty() {
        slice.to_string()
    } else {
        format!("{slice}...")
    }
}

fn floor_boundary(s: &str, mut i: usize) -> usize {
    i = i.min(s.len());
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_boundary(s: &str, mut i: usize) -> usize {
    i = i.min(s.len());
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}
