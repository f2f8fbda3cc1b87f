//! Repository coordinates: the `(project, repository)` pair that names an
//! execution path.

use std::fmt;
use thiserror::Error;

/// The well-known internal project, exempt from write-quota enforcement.
pub const INTERNAL_PROJECT: &str = "dogma";

/// The well-known internal repository within [`INTERNAL_PROJECT`].
pub const INTERNAL_REPOSITORY: &str = "meta";

/// A validated project or repository name: non-empty and matching
/// `[A-Za-z0-9_.-]+`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Name(String);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid name {0:?}: must be non-empty and match [A-Za-z0-9_.-]+")]
pub struct InvalidName(String);

impl Name {
    pub fn new(s: impl Into<String>) -> Result<Self, InvalidName> {
        let s = s.into();
        if s.is_empty()
            || !s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        {
            return Err(InvalidName(s));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Name {
    type Error = InvalidName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Name::new(value)
    }
}

impl From<Name> for String {
    fn from(value: Name) -> Self {
        value.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The `(project, repository)` coordinates that identify a repository and
/// double as the cluster-wide lock/quota key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RepositoryId {
    pub project: Name,
    pub repository: Name,
}

impl RepositoryId {
    pub fn new(project: Name, repository: Name) -> Self {
        Self { project, repository }
    }

    /// True for the well-known internal project/repository, which bypasses
    /// write-quota enforcement entirely (`spec.md` §4.4).
    pub fn is_internal(&self) -> bool {
        self.project.as_str() == INTERNAL_PROJECT && self.repository.as_str() == INTERNAL_REPOSITORY
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project, self.repository)
    }
}

/// The string key used for distributed mutexes and quota nodes. Mirrors
/// `Command::execution_path`.
///
/// Project-scoped operations (`CreateRepository` et al.) use `/<project>`;
/// server-wide operations use `/`; repository-scoped operations
/// (`NormalizingPush`, `ForcePush`) use `/<project>/<repository>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExecutionPath(String);

impl ExecutionPath {
    pub fn root() -> Self {
        Self("/".to_string())
    }

    pub fn project(project: &Name) -> Self {
        Self(format!("/{project}"))
    }

    pub fn repository(id: &RepositoryId) -> Self {
        Self(format!("/{}/{}", id.project, id.repository))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
