//! Semantic comparison of query/watch values: text normalized CR -> LF, JSON
//! compared structurally (`spec.md` §4.5).

use serde_json::Value;

/// A materialized query or file value, compared by the rules in `spec.md`
/// §4.5 when deciding whether a watch should re-arm instead of firing.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Text(String),
    Json(Value),
}

impl Content {
    /// True if `self` and `other` are semantically equal: text is compared
    /// after normalizing line endings, JSON is compared structurally
    /// (key order and whitespace do not matter).
    pub fn semantically_eq(&self, other: &Content) -> bool {
        match (self, other) {
            (Content::Text(a), Content::Text(b)) => normalize_newlines(a) == normalize_newlines(b),
            (Content::Json(a), Content::Json(b)) => a == b,
            _ => false,
        }
    }
}

fn normalize_newlines(s: &str) -> String {
    s.replace("\r\n", "\n").replace('\r', "\n")
}
