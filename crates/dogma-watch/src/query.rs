//! Queries: the value a watch observes at a revision.
//!
//! `spec.md` §4.5 describes a query-watch overload, `watch(lastKnown, Query)
//! -> future<(revision, value)>`, that "applies the query to that revision's
//! content" without naming a concrete `Query` type, and the overview
//! (`spec.md` §1) promises "query (including JSON-path projections)". The
//! only concrete operation the storage delegate's contract can answer is
//! "the content of one file path", so `Query` is that plus an optional
//! sub-value projection: a JSON Pointer (RFC 6901) into the file's JSON
//! content, the nearest native equivalent to the scenario's illustrative
//! `jsonpath("/cfg.json", "$.rate")` that this workspace's existing
//! `serde_json` dependency can answer without pulling in a JSONPath crate
//! the rest of the stack has no other use for.

use dogma_storage::LocalStorage;
use dogma_types::{Content, DogmaResult, RepositoryId, Revision};

/// A query over a single file path, evaluated against a specific revision,
/// with an optional JSON Pointer projection into that file's JSON content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query {
    path: String,
    json_pointer: Option<String>,
}

impl Query {
    /// Watches the file's content as-is.
    pub fn of_file(path: impl Into<String>) -> Self {
        Self { path: path.into(), json_pointer: None }
    }

    /// Watches a JSON Pointer projection (e.g. `/rate`) into the file's JSON
    /// content, rather than the whole file.
    pub fn of_json_pointer(path: impl Into<String>, json_pointer: impl Into<String>) -> Self {
        Self { path: path.into(), json_pointer: Some(json_pointer.into()) }
    }

    /// The watch path pattern this query implies: exact-match on its path,
    /// since a file query only cares about commits touching that one file.
    pub fn pattern(&self) -> &str {
        &self.path
    }

    /// Reads the file at `revision` and, if this query projects into it,
    /// extracts the pointed-to sub-value (`Value::Null` if the pointer
    /// doesn't resolve, matching the lenient behavior of JSON-path-style
    /// query languages rather than erroring on a missing field).
    pub async fn apply<S: LocalStorage>(
        &self,
        storage: &S,
        repo: &RepositoryId,
        revision: Revision,
    ) -> DogmaResult<Content> {
        let content = storage.get_file(repo, revision, &self.path).await?;
        let Some(pointer) = &self.json_pointer else {
            return Ok(content);
        };
        let projected = match &content {
            Content::Json(value) => value.pointer(pointer).cloned().unwrap_or(serde_json::Value::Null),
            Content::Text(_) => serde_json::Value::Null,
        };
        Ok(Content::Json(projected))
    }
}
