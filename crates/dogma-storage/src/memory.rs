//! An in-memory [`LocalStorage`] reference implementation, used by tests and
//! single-node development deployments.

use std::collections::HashMap;

use dogma_types::{Change, Command, CommandResult, Content, DogmaError, DogmaResult, Name, RepositoryId, Revision};
use tokio::sync::Mutex;

use crate::glob::glob_match;
use crate::traits::LocalStorage;

#[derive(Clone)]
struct Commit {
    revision: Revision,
    files: HashMap<String, Content>,
    changed_paths: Vec<String>,
}

struct Repository {
    removed: bool,
    commits: Vec<Commit>,
}

impl Repository {
    fn new() -> Self {
        Self {
            removed: false,
            commits: vec![Commit {
                revision: Revision::INIT,
                files: HashMap::new(),
                changed_paths: Vec::new(),
            }],
        }
    }

    fn head(&self) -> Revision {
        self.commits.last().expect("at least the initial commit").revision
    }

    fn commit_at(&self, revision: Revision) -> Option<&Commit> {
        let absolute = revision.normalize(self.head());
        self.commits.iter().find(|c| c.revision == absolute)
    }
}

struct Project {
    removed: bool,
    repositories: HashMap<Name, Repository>,
}

/// An in-memory, single-process [`LocalStorage`]. Every repository starts at
/// revision 0 (the initial empty commit) as soon as it is created.
#[derive(Default)]
pub struct InMemoryStorage {
    projects: Mutex<HashMap<Name, Project>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn apply_change(files: &mut HashMap<String, Content>, change: &Change) -> DogmaResult<()> {
        match change {
            Change::UpsertText { path, content } => {
                files.insert(path.clone(), Content::Text(content.clone()));
            }
            Change::UpsertJson { path, content } => {
                files.insert(path.clone(), Content::Json(content.clone()));
            }
            Change::Remove { path } => {
                files
                    .remove(path)
                    .ok_or_else(|| DogmaError::EntryNotFound(path.clone()))?;
            }
            Change::Rename { path, new_path } => {
                if files.contains_key(new_path) {
                    return Err(DogmaError::ChangeConflict(format!(
                        "rename destination already exists: {new_path}"
                    )));
                }
                let content = files
                    .remove(path)
                    .ok_or_else(|| DogmaError::EntryNotFound(path.clone()))?;
                files.insert(new_path.clone(), content);
            }
            Change::ApplyJsonPatch { path, content } => {
                let existing = files
                    .get(path)
                    .ok_or_else(|| DogmaError::EntryNotFound(path.clone()))?;
                let Content::Json(serde_json::Value::Object(mut base)) = existing.clone() else {
                    return Err(DogmaError::ChangeConflict(format!(
                        "{path} is not a JSON object; cannot merge-patch"
                    )));
                };
                let serde_json::Value::Object(patch) = content else {
                    return Err(DogmaError::ChangeConflict(
                        "JSON patch content must be an object".to_string(),
                    ));
                };
                for (k, v) in patch {
                    if v.is_null() {
                        base.remove(&k);
                    } else {
                        base.insert(k, v.clone());
                    }
                }
                files.insert(path.clone(), Content::Json(serde_json::Value::Object(base)));
            }
            Change::ApplyTextPatch { path, content } => {
                if !files.contains_key(path) {
                    return Err(DogmaError::EntryNotFound(path.clone()));
                }
                files.insert(path.clone(), Content::Text(content.clone()));
            }
        }
        Ok(())
    }

    fn push(
        projects: &mut HashMap<Name, Project>,
        project: &Name,
        repository: &Name,
        base_revision: Revision,
        changes: &[Change],
    ) -> DogmaResult<(Revision, Vec<Change>)> {
        let proj = projects
            .get_mut(project)
            .filter(|p| !p.removed)
            .ok_or_else(|| DogmaError::ProjectNotFound(project.to_string()))?;
        let repo = proj
            .repositories
            .get_mut(repository)
            .filter(|r| !r.removed)
            .ok_or_else(|| DogmaError::RepositoryNotFound(repository.to_string()))?;

        let head = repo.head();
        let base = base_revision.normalize(head);
        let base_commit = repo
            .commit_at(base)
            .ok_or(DogmaError::RevisionNotFound(base))?;

        let mut files = base_commit.files.clone();
        for change in changes {
            Self::apply_change(&mut files, change)?;
        }

        let changed_paths: Vec<String> = changes
            .iter()
            .map(|c| c.path().to_string())
            .filter(|p| {
                let before = base_commit.files.get(p);
                let after = files.get(p);
                before != after
            })
            .collect();

        if changed_paths.is_empty() {
            return Err(DogmaError::RedundantChange);
        }

        let new_revision = head.forward(1);
        repo.commits.push(Commit {
            revision: new_revision,
            files,
            changed_paths,
        });

        Ok((new_revision, changes.to_vec()))
    }
}

impl LocalStorage for InMemoryStorage {
    async fn execute(&self, cmd: &Command) -> DogmaResult<CommandResult> {
        let mut projects = self.projects.lock().await;
        // `ForcePush` only changes quota handling upstream in the executor;
        // storage itself just unwraps to the inner command. A `while let`
        // avoids recursive `async fn` calls, which `impl Future` return
        // types cannot express.
        let mut cmd = cmd;
        while let Command::ForcePush { inner } = cmd {
            cmd = inner;
        }
        match cmd {
            Command::CreateProject { name } => {
                if projects.contains_key(name) {
                    return Err(DogmaError::ChangeConflict(format!(
                        "project already exists: {name}"
                    )));
                }
                projects.insert(
                    name.clone(),
                    Project {
                        removed: false,
                        repositories: HashMap::new(),
                    },
                );
                Ok(CommandResult::Void)
            }
            Command::RemoveProject { name } => {
                let project = projects
                    .get_mut(name)
                    .ok_or_else(|| DogmaError::ProjectNotFound(name.to_string()))?;
                project.removed = true;
                Ok(CommandResult::Void)
            }
            Command::UnremoveProject { name } => {
                let project = projects
                    .get_mut(name)
                    .ok_or_else(|| DogmaError::ProjectNotFound(name.to_string()))?;
                project.removed = false;
                Ok(CommandResult::Void)
            }
            Command::PurgeProject { name } => {
                projects
                    .remove(name)
                    .ok_or_else(|| DogmaError::ProjectNotFound(name.to_string()))?;
                Ok(CommandResult::Void)
            }

            Command::CreateRepository { project, repository } => {
                let proj = projects
                    .get_mut(project)
                    .filter(|p| !p.removed)
                    .ok_or_else(|| DogmaError::ProjectNotFound(project.to_string()))?;
                if proj.repositories.contains_key(repository) {
                    return Err(DogmaError::ChangeConflict(format!(
                        "repository already exists: {repository}"
                    )));
                }
                proj.repositories.insert(repository.clone(), Repository::new());
                Ok(CommandResult::Revision(Revision::INIT))
            }
            Command::RemoveRepository { project, repository } => {
                let proj = projects
                    .get_mut(project)
                    .ok_or_else(|| DogmaError::ProjectNotFound(project.to_string()))?;
                let repo = proj
                    .repositories
                    .get_mut(repository)
                    .ok_or_else(|| DogmaError::RepositoryNotFound(repository.to_string()))?;
                repo.removed = true;
                Ok(CommandResult::Void)
            }
            Command::UnremoveRepository { project, repository } => {
                let proj = projects
                    .get_mut(project)
                    .ok_or_else(|| DogmaError::ProjectNotFound(project.to_string()))?;
                let repo = proj
                    .repositories
                    .get_mut(repository)
                    .ok_or_else(|| DogmaError::RepositoryNotFound(repository.to_string()))?;
                repo.removed = false;
                Ok(CommandResult::Void)
            }
            Command::PurgeRepository { project, repository } => {
                let proj = projects
                    .get_mut(project)
                    .ok_or_else(|| DogmaError::ProjectNotFound(project.to_string()))?;
                proj.repositories
                    .remove(repository)
                    .ok_or_else(|| DogmaError::RepositoryNotFound(repository.to_string()))?;
                Ok(CommandResult::Void)
            }

            Command::NormalizingPush(fields) => {
                let (revision, changes) = Self::push(
                    &mut projects,
                    &fields.project,
                    &fields.repository,
                    fields.base_revision,
                    &fields.changes,
                )?;
                Ok(CommandResult::CommitResult { revision, changes })
            }
            Command::Push(fields) => {
                // Replay path: the revision is already resolved. Re-running
                // against the same base must reproduce the same revision
                // (`spec.md` §8 "Replay determinism").
                let (revision, changes) = Self::push(
                    &mut projects,
                    &fields.project,
                    &fields.repository,
                    Revision::new(fields.revision.major() - 1),
                    &fields.changes,
                )?;
                Ok(CommandResult::CommitResult { revision, changes })
            }
            Command::UpdateServerStatus { .. } => Ok(CommandResult::Void),

            // Unreachable: the `while let` above strips every `ForcePush`
            // wrapper before we get here.
            Command::ForcePush { .. } => unreachable!("ForcePush is unwrapped above"),
        }
    }

    async fn get_file(&self, repo: &RepositoryId, revision: Revision, path: &str) -> DogmaResult<Content> {
        let projects = self.projects.lock().await;
        let project = projects
            .get(&repo.project)
            .ok_or_else(|| DogmaError::ProjectNotFound(repo.project.to_string()))?;
        let repository = project
            .repositories
            .get(&repo.repository)
            .ok_or_else(|| DogmaError::RepositoryNotFound(repo.repository.to_string()))?;
        let commit = repository
            .commit_at(revision)
            .ok_or(DogmaError::RevisionNotFound(revision))?;
        commit
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| DogmaError::EntryNotFound(path.to_string()))
    }

    async fn head_revision(&self, repo: &RepositoryId) -> DogmaResult<Revision> {
        let projects = self.projects.lock().await;
        let project = projects
            .get(&repo.project)
            .ok_or_else(|| DogmaError::ProjectNotFound(repo.project.to_string()))?;
        let repository = project
            .repositories
            .get(&repo.repository)
            .ok_or_else(|| DogmaError::RepositoryNotFound(repo.repository.to_string()))?;
        Ok(repository.head())
    }

    async fn find_latest_revision(
        &self,
        repo: &RepositoryId,
        last_known: Revision,
        pattern: &str,
    ) -> DogmaResult<Option<Revision>> {
        let projects = self.projects.lock().await;
        let project = projects
            .get(&repo.project)
            .ok_or_else(|| DogmaError::ProjectNotFound(repo.project.to_string()))?;
        let repository = project
            .repositories
            .get(&repo.repository)
            .ok_or_else(|| DogmaError::RepositoryNotFound(repo.repository.to_string()))?;
        let head = repository.head();
        let threshold = last_known.normalize(head);
        let found = repository
            .commits
            .iter()
            .filter(|c| c.revision > threshold)
            .filter(|c| c.changed_paths.iter().any(|p| glob_match(pattern, p)))
            .map(|c| c.revision)
            .max();
        Ok(found)
    }
}
