//! Multi-replica scenarios exercised against the in-memory coordination and
//! storage doubles, deterministically and without a real ensemble.

use std::sync::Arc;
use std::time::Duration;

use dogma_coordination::InMemoryCoordinationClient;
use dogma_executor::{Executor, ExecutorConfig, InMemoryCursorStore};
use dogma_quota::{InMemoryMetadataService, QuotaConfig};
use dogma_storage::InMemoryStorage;
use dogma_types::{
    Author, Change, Command, CommandResult, Content, DogmaError, Markup, Name, NormalizingPushFields, ReplicaId,
    RepositoryId, Revision,
};

type TestExecutor = Executor<InMemoryCoordinationClient, InMemoryStorage, InMemoryMetadataService, InMemoryCursorStore>;

fn names() -> (Name, Name) {
    (Name::new("acme").unwrap(), Name::new("widgets").unwrap())
}

fn push(project: Name, repository: Name, summary: &str, path: &str, content: serde_json::Value) -> Command {
    Command::NormalizingPush(NormalizingPushFields {
        project,
        repository,
        base_revision: Revision::HEAD,
        author: Author { name: "c".into(), email: "c@example.com".into() },
        summary: summary.into(),
        detail: String::new(),
        markup: Markup::Plaintext,
        changes: vec![Change::UpsertJson { path: path.into(), content }],
    })
}

async fn new_replica(client: &Arc<InMemoryCoordinationClient>, replica_id: u64) -> Arc<TestExecutor> {
    let executor = Arc::new(Executor::new(
        Arc::clone(client),
        InMemoryStorage::new(),
        InMemoryMetadataService::new(),
        InMemoryCursorStore::new(),
        "/dogma",
        ReplicaId(replica_id),
        ExecutorConfig::default(),
    ));
    executor.start(|| {}, || {}).await.unwrap();
    executor
}

/// S1: three replicas; a push on R1 becomes visible, with correct content,
/// on R2 and R3 within a bounded window.
#[tokio::test]
async fn s1_basic_replication_converges_across_three_replicas() {
    let client = Arc::new(InMemoryCoordinationClient::new());
    let (project, repository) = names();

    let r1 = new_replica(&client, 1).await;
    let r2 = new_replica(&client, 2).await;
    let r3 = new_replica(&client, 3).await;

    r1.execute(Command::CreateProject { name: project.clone() }).await.unwrap();
    r1.execute(Command::CreateRepository { project: project.clone(), repository: repository.clone() })
        .await
        .unwrap();

    let result = r1
        .execute(push(project.clone(), repository.clone(), "first", "/a.json", serde_json::json!({"a": "bar"})))
        .await
        .unwrap();
    let revision = match result {
        CommandResult::CommitResult { revision, .. } => revision,
        other => panic!("expected a commit result, got {other:?}"),
    };
    assert_eq!(revision, Revision::new(2));

    let repo_id = RepositoryId::new(project, repository);
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    for replica in [&r2, &r3] {
        loop {
            if replica.storage().head_revision(&repo_id).await.unwrap() >= revision {
                break;
            }
            assert!(tokio::time::Instant::now() < deadline, "replica did not converge within 1s");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let content = replica.storage().get_file(&repo_id, revision, "/a.json").await.unwrap();
        assert_eq!(content, Content::Json(serde_json::json!({"a": "bar"})));
    }
}

/// S3: a repository with `requestQuota=3` over `timeWindowSeconds=1` lets
/// exactly 3 of 5 rapid pushes through, then recovers after the window.
#[tokio::test(start_paused = true)]
async fn s3_quota_admits_exactly_the_configured_rate_then_recovers() {
    let client = Arc::new(InMemoryCoordinationClient::new());
    let (project, repository) = names();
    let executor = new_replica(&client, 1).await;

    executor.execute(Command::CreateProject { name: project.clone() }).await.unwrap();
    executor
        .execute(Command::CreateRepository { project: project.clone(), repository: repository.clone() })
        .await
        .unwrap();

    let repo_id = RepositoryId::new(project.clone(), repository.clone());
    executor.set_write_quota(&repo_id, Some(QuotaConfig::new(3, 1))).await.unwrap();

    let mut succeeded = 0;
    let mut rejected = 0;
    for i in 0..5 {
        let result = executor
            .execute(push(project.clone(), repository.clone(), &format!("push {i}"), "/a.json", serde_json::json!(i)))
            .await;
        match result {
            Ok(CommandResult::CommitResult { revision, .. }) => {
                assert_eq!(revision, Revision::new(2 + succeeded));
                succeeded += 1;
            }
            Err(DogmaError::TooManyRequests { permits_per_second, .. }) => {
                assert_eq!(permits_per_second, 3);
                rejected += 1;
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
    assert_eq!(succeeded, 3);
    assert_eq!(rejected, 2);

    tokio::time::advance(Duration::from_secs(2)).await;
    tokio::task::yield_now().await;

    for i in 5..7 {
        executor
            .execute(push(project.clone(), repository.clone(), &format!("push {i}"), "/a.json", serde_json::json!(i)))
            .await
            .unwrap();
    }
}
