//! Text scrubbing for untrusted input.

use regex::Regex;
use std::sync::OnceLock;

fn tag_pattern() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"))
}

fn entity_pattern() -> &'static Regex {
    static ENTITY: OnceLock<Regex> = OnceLock::new();
    ENTITY.get_or_init(|| Regex::new(r"&[^;]+;").expect("entity pattern is valid"))
}

fn sql_patterns() -> &'static [Regex] {
    static SQL: OnceLock<Vec<Regex>> = OnceLock::new();
    SQL.get_or_init(|| {
        [
            r"(?i)\b(SELECT|INSERT|UPDATE|DELETE|DROP|UNION|ALTER|CREATE|TRUNCATE)\b",
            r"--",
            r";",
            r"(?i)\bOR\b.*=",
            r"(?i)\bAND\b.*=",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("sql pattern is valid"))
        .collect()
    })
}

/// Strip every tag and entity, then trim.
///
/// Idempotent: `sanitize_html(&sanitize_html(s)) == sanitize_html(s)`.
pub fn sanitize_html(input: &str) -> String {
    let without_tags = tag_pattern().replace_all(input, "");
    let without_entities = entity_pattern().replace_all(&without_tags, "");
    without_entities.trim().to_string()
}

/// Escape `& < > " '` for embedding in HTML text.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            other => out.push(other),
        }
    }
    out
}

/// Heuristic check for SQL injection fragments.
///
/// Queries are parameterised regardless; this only flags input worth logging.
pub fn has_sql_injection_patterns(input: &str) -> bool {
    sql_patterns().iter().any(|p| p.is_match(input))
}
