//! The replicated command model: a tagged-variant encoding of every mutating
//! operation, its execution path (distributed-mutex key), and its result.

use serde::{Deserialize, Serialize};

use crate::change::{Author, Change, Markup};
use crate::repository::{ExecutionPath, Name, RepositoryId};
use crate::revision::Revision;

/// Cluster-wide replication/writability flags, toggled by
/// [`Command::UpdateServerStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    pub replicating: bool,
    pub writable: bool,
}

impl ServerStatus {
    pub const fn writable() -> Self {
        Self {
            replicating: true,
            writable: true,
        }
    }

    pub const fn read_only() -> Self {
        Self {
            replicating: false,
            writable: false,
        }
    }
}

/// A high-level push before the executor has resolved it to an absolute
/// revision. Normalized into [`Command::Push`] before being logged
/// (`spec.md` §4.3 step 7).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizingPushFields {
    pub project: Name,
    pub repository: Name,
    pub base_revision: Revision,
    pub author: Author,
    pub summary: String,
    pub detail: String,
    pub markup: Markup,
    pub changes: Vec<Change>,
}

/// A push already resolved to an absolute revision: the form that is
/// actually appended to the replication log and replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushFields {
    pub project: Name,
    pub repository: Name,
    #[serde(rename = "revision")]
    pub revision: Revision,
    #[serde(rename = "commitTimeMillis")]
    pub commit_time_millis: i64,
    pub author: Author,
    pub summary: String,
    pub detail: String,
    pub markup: Markup,
    pub changes: Vec<Change>,
}

/// A tagged command, serialized with an UPPER_SNAKE_CASE `type` discriminator
/// per `spec.md` §6.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    #[serde(rename = "CREATE_PROJECT")]
    CreateProject { name: Name },
    #[serde(rename = "REMOVE_PROJECT")]
    RemoveProject { name: Name },
    #[serde(rename = "PURGE_PROJECT")]
    PurgeProject { name: Name },
    #[serde(rename = "UNREMOVE_PROJECT")]
    UnremoveProject { name: Name },

    #[serde(rename = "CREATE_REPOSITORY")]
    CreateRepository { project: Name, repository: Name },
    #[serde(rename = "REMOVE_REPOSITORY")]
    RemoveRepository { project: Name, repository: Name },
    #[serde(rename = "PURGE_REPOSITORY")]
    PurgeRepository { project: Name, repository: Name },
    #[serde(rename = "UNREMOVE_REPOSITORY")]
    UnremoveRepository { project: Name, repository: Name },

    #[serde(rename = "NORMALIZING_PUSH")]
    NormalizingPush(NormalizingPushFields),

    #[serde(rename = "PUSH")]
    Push(PushFields),

    #[serde(rename = "FORCE_PUSH")]
    ForcePush { inner: Box<Command> },

    #[serde(rename = "UPDATE_SERVER_STATUS")]
    UpdateServerStatus { status: ServerStatus },
}

impl Command {
    /// The stable UPPER_SNAKE_CASE discriminator for this command.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Command::CreateProject { .. } => "CREATE_PROJECT",
            Command::RemoveProject { .. } => "REMOVE_PROJECT",
            Command::PurgeProject { .. } => "PURGE_PROJECT",
            Command::UnremoveProject { .. } => "UNREMOVE_PROJECT",
            Command::CreateRepository { .. } => "CREATE_REPOSITORY",
            Command::RemoveRepository { .. } => "REMOVE_REPOSITORY",
            Command::PurgeRepository { .. } => "PURGE_REPOSITORY",
            Command::UnremoveRepository { .. } => "UNREMOVE_REPOSITORY",
            Command::NormalizingPush(_) => "NORMALIZING_PUSH",
            Command::Push(_) => "PUSH",
            Command::ForcePush { .. } => "FORCE_PUSH",
            Command::UpdateServerStatus { .. } => "UPDATE_SERVER_STATUS",
        }
    }

    /// The execution path (distributed-mutex key) for this command, per
    /// `spec.md` §3.
    pub fn execution_path(&self) -> ExecutionPath {
        match self {
            Command::CreateProject { name }
            | Command::RemoveProject { name }
            | Command::PurgeProject { name }
            | Command::UnremoveProject { name } => ExecutionPath::project(name),

            Command::CreateRepository { project, repository }
            | Command::RemoveRepository { project, repository }
            | Command::PurgeRepository { project, repository }
            | Command::UnremoveRepository { project, repository } => {
                ExecutionPath::repository(&RepositoryId::new(project.clone(), repository.clone()))
            }

            Command::NormalizingPush(fields) => ExecutionPath::repository(&RepositoryId::new(
                fields.project.clone(),
                fields.repository.clone(),
            )),
            Command::Push(fields) => ExecutionPath::repository(&RepositoryId::new(
                fields.project.clone(),
                fields.repository.clone(),
            )),
            Command::ForcePush { inner } => inner.execution_path(),

            Command::UpdateServerStatus { .. } => ExecutionPath::root(),
        }
    }

    /// The repository this command targets, if any (server/project-scoped
    /// commands have none).
    pub fn repository_id(&self) -> Option<RepositoryId> {
        match self {
            Command::CreateRepository { project, repository }
            | Command::RemoveRepository { project, repository }
            | Command::PurgeRepository { project, repository }
            | Command::UnremoveRepository { project, repository } => {
                Some(RepositoryId::new(project.clone(), repository.clone()))
            }
            Command::NormalizingPush(fields) => Some(RepositoryId::new(
                fields.project.clone(),
                fields.repository.clone(),
            )),
            Command::Push(fields) => Some(RepositoryId::new(
                fields.project.clone(),
                fields.repository.clone(),
            )),
            Command::ForcePush { inner } => inner.repository_id(),
            _ => None,
        }
    }

    /// True if executing this command must acquire a write-quota permit
    /// (`spec.md` §4.3 step 4): a [`Command::NormalizingPush`] against a
    /// non-internal repository. [`Command::ForcePush`] bypasses quota by
    /// construction.
    pub fn requires_quota(&self) -> bool {
        match self {
            Command::NormalizingPush(fields) => {
                !RepositoryId::new(fields.project.clone(), fields.repository.clone()).is_internal()
            }
            _ => false,
        }
    }

    /// Rewrites a [`Command::NormalizingPush`] (optionally wrapped in
    /// [`Command::ForcePush`]) into its resolved [`Command::Push`] form, as
    /// required before appending to the log (`spec.md` §4.3 step 7).
    pub fn resolve_push(self, revision: Revision, commit_time_millis: i64) -> Command {
        match self {
            Command::NormalizingPush(f) => Command::Push(PushFields {
                project: f.project,
                repository: f.repository,
                revision,
                commit_time_millis,
                author: f.author,
                summary: f.summary,
                detail: f.detail,
                markup: f.markup,
                changes: f.changes,
            }),
            Command::ForcePush { inner } => Command::ForcePush {
                inner: Box::new(inner.resolve_push(revision, commit_time_millis)),
            },
            other => other,
        }
    }
}

/// The typed result of executing a [`Command`], mirroring `spec.md` §3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandResult {
    Void,
    Revision(Revision),
    CommitResult {
        revision: Revision,
        changes: Vec<Change>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Name {
        Name::new(s).unwrap()
    }

    #[test]
    fn execution_path_for_push() {
        let cmd = Command::NormalizingPush(NormalizingPushFields {
            project: name("acme"),
            repository: name("widgets"),
            base_revision: Revision::HEAD,
            author: Author {
                name: "a".into(),
                email: "a@example.com".into(),
            },
            summary: "s".into(),
            detail: String::new(),
            markup: Markup::Plaintext,
            changes: vec![],
        });
        assert_eq!(cmd.execution_path().as_str(), "/acme/widgets");
        assert!(cmd.requires_quota());
    }

    #[test]
    fn force_push_bypasses_quota_and_delegates_path() {
        let inner = Command::NormalizingPush(NormalizingPushFields {
            project: name("acme"),
            repository: name("widgets"),
            base_revision: Revision::HEAD,
            author: Author {
                name: "a".into(),
                email: "a@example.com".into(),
            },
            summary: "s".into(),
            detail: String::new(),
            markup: Markup::Plaintext,
            changes: vec![],
        });
        let cmd = Command::ForcePush {
            inner: Box::new(inner),
        };
        assert!(!cmd.requires_quota());
        assert_eq!(cmd.execution_path().as_str(), "/acme/widgets");
    }

    #[test]
    fn server_status_is_root_path() {
        let cmd = Command::UpdateServerStatus {
            status: ServerStatus::read_only(),
        };
        assert_eq!(cmd.execution_path().as_str(), "/");
        assert_eq!(cmd.type_tag(), "UPDATE_SERVER_STATUS");
    }

    #[test]
    fn wire_json_matches_spec_shape() {
        let cmd = Command::Push(PushFields {
            project: name("acme"),
            repository: name("widgets"),
            revision: Revision::new(2),
            commit_time_millis: 1_700_000_000_000,
            author: Author {
                name: "a".into(),
                email: "a@example.com".into(),
            },
            summary: "s".into(),
            detail: String::new(),
            markup: Markup::Plaintext,
            changes: vec![Change::UpsertJson {
                path: "/a.json".into(),
                content: serde_json::json!({"a": "bar"}),
            }],
        });
        let v = serde_json::to_value(&cmd).unwrap();
        assert_eq!(v["type"], "PUSH");
        assert_eq!(v["revision"], 2);
        assert_eq!(v["changes"][0]["type"], "UPSERT_JSON");
    }

    #[test]
    fn resolve_push_rewrites_normalizing_push() {
        let cmd = Command::NormalizingPush(NormalizingPushFields {
            project: name("acme"),
            repository: name("widgets"),
            base_revision: Revision::HEAD,
            author: Author {
                name: "a".into(),
                email: "a@example.com".into(),
            },
            summary: "s".into(),
            detail: String::new(),
            markup: Markup::Plaintext,
            changes: vec![],
        });
        let resolved = cmd.resolve_push(Revision::new(2), 123);
        match resolved {
            Command::Push(f) => assert_eq!(f.revision, Revision::new(2)),
            _ => panic!("expected Push"),
        }
    }
}
