use regex::Regex;
use serde_json::Value;

lazy_static::lazy_static! {
    /// Statement shapes rather than bare keywords, so prose like "drop me a line" passes.
    static ref STATEMENT: Regex = Regex::new(
        r"(?i)\b(?:select\s+(?:\*|distinct\b|top\s+\d+|\w+(?:\s*,\s*\w+)*)\s+from\b|insert\s+into\b|delete\s+from\b|update\s+\w+\s+set\b|drop\s+(?:table|database|schema|view|index)\b|truncate\s+table\b|alter\s+table\b|create\s+(?:table|database|user)\b|union(?:\s+all)?\s+select\b|exec(?:ute)?\s+(?:xp_|sp_|\()|information_schema\b)"
    ).unwrap();
    /// A comment marker closing a quoted value or statement, or trailing the whole input.
    static ref COMMENT: Regex = Regex::new(r#"['"`;]\s*(?:--|#)(?:\s|$)|--\s*$|/\*.*?\*/"#).unwrap();
    /// `or`/`and` followed by an equality; the operands are compared in [`is_tautology`].
    static ref COMPARISON: Regex = Regex::new(
        r#"(?i)\b(?:or|and)\s+['"`]?(\w+)['"`]?\s*=\s*['"`]?(\w+)['"`]?"#
    ).unwrap();
    static ref STACKED: Regex = Regex::new(
        r"(?i);\s*(?:select|insert|update|delete|drop|alter|truncate|create|exec|shutdown|declare)\b"
    ).unwrap();
    static ref TIME_PROBE: Regex =
        Regex::new(r"(?i)\b(?:sleep\s*\(\s*\d+|benchmark\s*\(|waitfor\s+delay\b|pg_sleep\s*\()").unwrap();
    static ref QUOTE_PROBE: Regex = Regex::new(r#"(?i)%27|%22|\\x27|\\'|'\s*\)\s*(?:or|and|;|--)|^\s*'\s*;"#).unwrap();
}

/// Heuristic check for strings shaped like SQL-injection payloads.
///
/// Defense in depth for logging and optional blocking; queries must still be parameterized.
pub fn looks_like_sql_injection(value: &str) -> bool {
    if value.trim().is_empty() {
        return false;
    }
    STATEMENT.is_match(value)
        || COMMENT.is_match(value)
        || is_tautology(value)
        || STACKED.is_match(value)
        || TIME_PROBE.is_match(value)
        || QUOTE_PROBE.is_match(value)
}

/// `or 1=1`, `and 'a'='a'` and the like: a comparison whose two sides are the same token.
fn is_tautology(value: &str) -> bool {
    COMPARISON
        .captures_iter(value)
        .any(|caps| caps[1].eq_ignore_ascii_case(&caps[2]))
}

/// Paths (`$.a.b[0]`) of every string inside `value` that looks like SQL injection.
pub fn suspicious_fields(value: &Value) -> Vec<String> {
    let mut hits = Vec::new();
    collect(value, "$".to_string(), &mut hits);
    hits
}

fn collect(value: &Value, path: String, hits: &mut Vec<String>) {
    match value {
        Value::String(s) if looks_like_sql_injection(s) => hits.push(path),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                collect(item, format!("{}[{}]", path, i), hits);
            }
        }
        Value::Object(map) => {
            for (k, v) in map {
                collect(v, format!("{}.{}", path, k), hits);
            }
        }
        _ => {}
    }
}
