//! The replicated command executor (C3): the per-execution-path mutex,
//! catch-up replay, write-quota enforcement, delegate execution, log
//! append, and the per-replica state machine (`spec.md` §4.3).

mod config;
mod cursor;
mod errors;
mod executor;
mod state;

pub use config::{ExecutorConfig, DEFAULT_LOCK_TIMEOUT_MILLIS, PRUNE_INTERVAL};
pub use cursor::{CursorStore, InMemoryCursorStore};
pub use executor::Executor;
pub use state::ExecutorState;

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use dogma_coordination::InMemoryCoordinationClient;
    use dogma_quota::{InMemoryMetadataService, QuotaConfig};
    use dogma_storage::InMemoryStorage;
    use dogma_types::{
        Author, Change, Command, CommandResult, Markup, Name, NormalizingPushFields, ReplicaId, Revision,
        ServerStatus,
    };
    use proptest::prelude::*;

    use super::*;

    fn repo_names() -> (Name, Name) {
        (Name::new("acme").unwrap(), Name::new("widgets").unwrap())
    }

    fn push_command(project: Name, repository: Name, summary: &str) -> Command {
        Command::NormalizingPush(NormalizingPushFields {
            project,
            repository,
            base_revision: Revision::HEAD,
            author: Author {
                name: "a".into(),
                email: "a@example.com".into(),
            },
            summary: summary.into(),
            detail: String::new(),
            markup: Markup::Plaintext,
            changes: vec![Change::UpsertJson {
                path: "/a.json".into(),
                content: serde_json::json!({"k": summary}),
            }],
        })
    }

    async fn started_executor() -> Arc<
        Executor<InMemoryCoordinationClient, InMemoryStorage, InMemoryMetadataService, InMemoryCursorStore>,
    > {
        let executor = Arc::new(Executor::new(
            InMemoryCoordinationClient::new(),
            InMemoryStorage::new(),
            InMemoryMetadataService::new(),
            InMemoryCursorStore::new(),
            "/dogma",
            ReplicaId(1),
            ExecutorConfig::default(),
        ));
        executor.start(|| {}, || {}).await.unwrap();
        executor
    }

    #[tokio::test]
    async fn create_project_and_repository_then_push() {
        let executor = started_executor().await;
        let (project, repository) = repo_names();

        executor
            .execute(Command::CreateProject { name: project.clone() })
            .await
            .unwrap();
        executor
            .execute(Command::CreateRepository {
                project: project.clone(),
                repository: repository.clone(),
            })
            .await
            .unwrap();

        let result = executor
            .execute(push_command(project, repository, "first commit"))
            .await
            .unwrap();
        match result {
            CommandResult::CommitResult { revision, .. } => assert_eq!(revision, Revision::new(1)),
            other => panic!("expected CommitResult, got {other:?}"),
        }
        assert!(executor.is_writable());
    }

    #[tokio::test]
    async fn read_only_rejects_mutating_commands_until_restored() {
        let executor = started_executor().await;
        let (project, _repository) = repo_names();

        executor
            .execute(Command::UpdateServerStatus {
                status: ServerStatus::read_only(),
            })
            .await
            .unwrap();
        assert!(!executor.is_writable());

        let rejected = executor.execute(Command::CreateProject { name: project.clone() }).await;
        assert!(matches!(rejected, Err(dogma_types::DogmaError::ReadOnly)));

        executor
            .execute(Command::UpdateServerStatus {
                status: ServerStatus::writable(),
            })
            .await
            .unwrap();
        assert!(executor.is_writable());

        executor.execute(Command::CreateProject { name: project }).await.unwrap();
    }

    #[tokio::test]
    async fn write_quota_rejects_once_exhausted() {
        let executor = started_executor().await;
        let (project, repository) = repo_names();
        executor
            .execute(Command::CreateProject { name: project.clone() })
            .await
            .unwrap();
        executor
            .execute(Command::CreateRepository {
                project: project.clone(),
                repository: repository.clone(),
            })
            .await
            .unwrap();

        let repo_id = dogma_types::RepositoryId::new(project.clone(), repository.clone());
        executor
            .set_write_quota(&repo_id, Some(QuotaConfig::new(1, 1)))
            .await
            .unwrap();

        executor
            .execute(push_command(project.clone(), repository.clone(), "one"))
            .await
            .unwrap();

        let second = executor.execute(push_command(project, repository, "two")).await;
        assert!(matches!(second, Err(dogma_types::DogmaError::TooManyRequests { .. })));
    }

    #[tokio::test]
    async fn second_replica_replays_the_first_replicas_commits() {
        let client = Arc::new(InMemoryCoordinationClient::new());
        let (project, repository) = repo_names();

        let primary = Arc::new(Executor::new(
            Arc::clone(&client),
            InMemoryStorage::new(),
            InMemoryMetadataService::new(),
            InMemoryCursorStore::new(),
            "/dogma",
            ReplicaId(1),
            ExecutorConfig::default(),
        ));
        primary.start(|| {}, || {}).await.unwrap();
        primary
            .execute(Command::CreateProject { name: project.clone() })
            .await
            .unwrap();
        primary
            .execute(Command::CreateRepository {
                project: project.clone(),
                repository: repository.clone(),
            })
            .await
            .unwrap();
        primary
            .execute(push_command(project.clone(), repository.clone(), "from primary"))
            .await
            .unwrap();

        let replica = Arc::new(Executor::new(
            Arc::clone(&client),
            InMemoryStorage::new(),
            InMemoryMetadataService::new(),
            InMemoryCursorStore::new(),
            "/dogma",
            ReplicaId(2),
            ExecutorConfig::default(),
        ));
        replica.start(|| {}, || {}).await.unwrap();

        // Give the watcher a moment; start()'s own catch-up already applied
        // everything that existed at start time.
        tokio::time::sleep(Duration::from_millis(10)).await;

        let repo_id = dogma_types::RepositoryId::new(project, repository);
        let head = replica.storage().head_revision(&repo_id).await.unwrap();
        assert_eq!(head, Revision::new(1));
    }

    proptest::proptest! {
        /// Invariant 1: for any sequence of successful pushes against one
        /// repository, each commit's assigned revision is the previous
        /// maximum plus one.
        #[test]
        fn log_density_holds_for_any_push_sequence(summaries in proptest::collection::vec("[a-z]{1,8}", 1..12)) {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            runtime.block_on(async {
                let executor = started_executor().await;
                let (project, repository) = repo_names();
                executor.execute(Command::CreateProject { name: project.clone() }).await.unwrap();
                executor
                    .execute(Command::CreateRepository { project: project.clone(), repository: repository.clone() })
                    .await
                    .unwrap();

                let mut previous = Revision::new(1);
                for summary in summaries {
                    let result = executor.execute(push_command(project.clone(), repository.clone(), &summary)).await.unwrap();
                    let revision = match result {
                        CommandResult::CommitResult { revision, .. } => revision,
                        other => panic!("expected a commit result, got {other:?}"),
                    };
                    prop_assert_eq!(revision.major(), previous.major() + 1);
                    previous = revision;
                }
                Ok(())
            })?;
        }
    }
}
