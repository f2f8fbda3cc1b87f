//! File changes carried by a push command.

use serde::{Deserialize, Serialize};

/// A single file mutation within a commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Change {
    #[serde(rename = "UPSERT_TEXT")]
    UpsertText { path: String, content: String },

    #[serde(rename = "UPSERT_JSON")]
    UpsertJson {
        path: String,
        content: serde_json::Value,
    },

    #[serde(rename = "REMOVE")]
    Remove { path: String },

    #[serde(rename = "RENAME")]
    Rename { path: String, new_path: String },

    #[serde(rename = "APPLY_JSON_PATCH")]
    ApplyJsonPatch {
        path: String,
        content: serde_json::Value,
    },

    #[serde(rename = "APPLY_TEXT_PATCH")]
    ApplyTextPatch { path: String, content: String },
}

impl Change {
    /// The path this change targets (the *source* path for a rename).
    pub fn path(&self) -> &str {
        match self {
            Change::UpsertText { path, .. }
            | Change::UpsertJson { path, .. }
            | Change::Remove { path }
            | Change::Rename { path, .. }
            | Change::ApplyJsonPatch { path, .. }
            | Change::ApplyTextPatch { path, .. } => path,
        }
    }
}

/// Commit markup language for the human-readable detail field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Markup {
    #[serde(rename = "PLAINTEXT")]
    Plaintext,
    #[serde(rename = "MARKDOWN")]
    Markdown,
}

/// Commit author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_serializes_with_type_tag() {
        let c = Change::UpsertJson {
            path: "/a.json".into(),
            content: serde_json::json!({"a": "bar"}),
        };
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v["type"], "UPSERT_JSON");
        assert_eq!(v["path"], "/a.json");
    }

    #[test]
    fn rename_path_is_source() {
        let c = Change::Rename {
            path: "/old.json".into(),
            new_path: "/new.json".into(),
        };
        assert_eq!(c.path(), "/old.json");
    }
}
