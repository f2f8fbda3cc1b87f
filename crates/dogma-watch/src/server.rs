//! Server-side watch primitives (`spec.md` §4.5): `find_latest_revision` is
//! a thin pass-through to the storage delegate, while `watch` adds the
//! suspend-until-match behavior on top of it by pairing each repository with
//! a [`tokio::sync::Notify`] that the command executor pokes after every
//! successful commit.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{oneshot, Notify};

use dogma_storage::LocalStorage;
use dogma_types::{Content, DogmaError, DogmaResult, RepositoryId, Revision};

use crate::query::Query;

/// Owns the per-repository wake-up signals and delegates all reads to a
/// [`LocalStorage`]. One instance is shared between the command executor
/// (which calls [`WatchServer::notify_commit`]) and however many in-process
/// or RPC-facing watchers are suspended in [`WatchServer::watch`].
pub struct WatchServer<S> {
    storage: S,
    notifiers: StdMutex<HashMap<RepositoryId, Arc<Notify>>>,
}

impl<S: LocalStorage> WatchServer<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            notifiers: StdMutex::new(HashMap::new()),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn notifier_for(&self, repo: &RepositoryId) -> Arc<Notify> {
        self.notifiers
            .lock()
            .unwrap()
            .entry(repo.clone())
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }

    /// Wakes any watcher suspended against `repo`. The executor calls this
    /// once per successful commit, after the change is durable locally.
    pub fn notify_commit(&self, repo: &RepositoryId) {
        if let Some(notify) = self.notifiers.lock().unwrap().get(repo) {
            notify.notify_waiters();
        }
    }

    /// The greatest revision in `(last_known, head]` touching `pattern`, or
    /// `None` if no such revision exists yet.
    pub async fn find_latest_revision(
        &self,
        repo: &RepositoryId,
        last_known: Revision,
        pattern: &str,
    ) -> DogmaResult<Option<Revision>> {
        self.storage.find_latest_revision(repo, last_known, pattern).await
    }

    /// Suspends until a commit after `last_known` touches `pattern`, or
    /// returns [`DogmaError::Cancelled`] if `cancel` fires first.
    ///
    /// `cancel` is taken by `&mut` so a single [`oneshot::Receiver`] can be
    /// reused across the re-arm loop in [`WatchServer::watch_query`].
    pub async fn watch(
        &self,
        repo: &RepositoryId,
        last_known: Revision,
        pattern: &str,
        cancel: &mut oneshot::Receiver<()>,
    ) -> DogmaResult<Revision> {
        let notifier = self.notifier_for(repo);
        loop {
            // Register interest in the next notification *before* checking
            // the condition, so a commit racing in between is not missed.
            let notified = notifier.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(revision) = self.storage.find_latest_revision(repo, last_known, pattern).await? {
                return Ok(revision);
            }

            tokio::select! {
                _ = notified => continue,
                _ = &mut *cancel => return Err(DogmaError::Cancelled),
            }
        }
    }

    /// The query-watch overload: suspends until the query's value at the
    /// next matching revision differs, by [`Content::semantically_eq`], from
    /// `previous_value`. A revision whose value is unchanged re-arms against
    /// the next one instead of firing (`spec.md` §4.5).
    pub async fn watch_query(
        &self,
        repo: &RepositoryId,
        mut last_known: Revision,
        query: &Query,
        mut previous_value: Option<Content>,
        mut cancel: oneshot::Receiver<()>,
    ) -> DogmaResult<(Revision, Content)> {
        loop {
            let revision = self.watch(repo, last_known, query.pattern(), &mut cancel).await?;
            let value = query.apply(&self.storage, repo, revision).await?;

            if previous_value.as_ref().is_some_and(|prev| prev.semantically_eq(&value)) {
                last_known = revision;
                continue;
            }

            return Ok((revision, value));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dogma_storage::InMemoryStorage;
    use dogma_types::{Author, Change, Command, Markup, Name, NormalizingPushFields};

    use super::*;

    fn repo_id() -> RepositoryId {
        RepositoryId::new(Name::new("acme").unwrap(), Name::new("widgets").unwrap())
    }

    async fn seeded_storage() -> InMemoryStorage {
        let storage = InMemoryStorage::new();
        let project = Name::new("acme").unwrap();
        let repository = Name::new("widgets").unwrap();
        storage
            .execute(&Command::CreateProject { name: project.clone() })
            .await
            .unwrap();
        storage
            .execute(&Command::CreateRepository {
                project,
                repository,
            })
            .await
            .unwrap();
        storage
    }

    fn push_text(summary: &str, content: &str) -> Command {
        Command::NormalizingPush(NormalizingPushFields {
            project: Name::new("acme").unwrap(),
            repository: Name::new("widgets").unwrap(),
            base_revision: Revision::HEAD,
            author: Author {
                name: "a".into(),
                email: "a@example.com".into(),
            },
            summary: summary.into(),
            detail: String::new(),
            markup: Markup::Plaintext,
            changes: vec![Change::UpsertText {
                path: "/a.json".into(),
                content: content.into(),
            }],
        })
    }

    #[tokio::test]
    async fn watch_resolves_immediately_if_already_satisfied() {
        let storage = seeded_storage().await;
        storage.execute(&push_text("seed", "hello\n")).await.unwrap();
        let server = WatchServer::new(storage);
        let (_tx, mut rx) = oneshot::channel();

        let revision = server
            .watch(&repo_id(), Revision::INIT, "/a.json", &mut rx)
            .await
            .unwrap();
        assert_eq!(revision, Revision::new(1));
    }

    #[tokio::test]
    async fn watch_wakes_up_on_notify_commit() {
        let storage = seeded_storage().await;
        let server = Arc::new(WatchServer::new(storage));
        let (_tx, mut rx) = oneshot::channel();

        let waiter = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.watch(&repo_id(), Revision::HEAD, "/a.json", &mut rx).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        server.storage().execute(&push_text("first", "hello\n")).await.unwrap();
        server.notify_commit(&repo_id());

        let revision = waiter.await.unwrap().unwrap();
        assert_eq!(revision, Revision::new(1));
    }

    #[tokio::test]
    async fn watch_cancelled_returns_cancelled_error() {
        let storage = seeded_storage().await;
        let server = Arc::new(WatchServer::new(storage));
        let (tx, mut rx) = oneshot::channel();

        let waiter = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.watch(&repo_id(), Revision::HEAD, "/a.json", &mut rx).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(tx);

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(DogmaError::Cancelled)));
    }

    #[tokio::test]
    async fn query_watch_rearms_on_semantically_equal_value() {
        let storage = seeded_storage().await;
        storage.execute(&push_text("seed", "hello\n")).await.unwrap();
        let server = Arc::new(WatchServer::new(storage));
        let query = Query::of_file("/a.json");
        let previous = Content::Text("hello\n".into());
        let (_tx, rx) = oneshot::channel();

        let waiter = {
            let server = Arc::clone(&server);
            let query = query.clone();
            tokio::spawn(async move {
                server
                    .watch_query(&repo_id(), Revision::new(1), &query, Some(previous), rx)
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        // Same value under a different line ending republished at revision 2:
        // a real commit (the raw bytes differ), but must not satisfy the
        // watch since it is semantically unchanged.
        server
            .storage()
            .execute(&push_text("no-op resubmit", "hello\r\n"))
            .await
            .unwrap();
        server.notify_commit(&repo_id());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        server
            .storage()
            .execute(&push_text("actual change", "world\n"))
            .await
            .unwrap();
        server.notify_commit(&repo_id());

        let (revision, value) = waiter.await.unwrap().unwrap();
        assert_eq!(revision, Revision::new(3));
        assert_eq!(value, Content::Text("world\n".into()));
    }

    fn push_json(summary: &str, value: serde_json::Value) -> Command {
        Command::NormalizingPush(NormalizingPushFields {
            project: Name::new("acme").unwrap(),
            repository: Name::new("widgets").unwrap(),
            base_revision: Revision::HEAD,
            author: Author { name: "a".into(), email: "a@example.com".into() },
            summary: summary.into(),
            detail: String::new(),
            markup: Markup::Plaintext,
            changes: vec![Change::UpsertJson { path: "/cfg.json".into(), content: value }],
        })
    }

    /// Mirrors the spec's "watcher on a JSON-path projection" scenario: rate
    /// goes 1, 1 again (structurally equal, must not fire), 2. Only the
    /// `rate` field changing should surface, and the delivered value must be
    /// the projected number, not the whole file.
    #[tokio::test]
    async fn query_watch_on_json_pointer_delivers_only_real_changes() {
        let storage = seeded_storage().await;
        storage.execute(&push_json("rate=1", serde_json::json!({"rate": 1}))).await.unwrap();
        let server = Arc::new(WatchServer::new(storage));
        let query = Query::of_json_pointer("/cfg.json", "/rate");
        let previous = Content::Json(serde_json::json!(1));
        let (_tx, rx) = oneshot::channel();

        let waiter = {
            let server = Arc::clone(&server);
            let query = query.clone();
            tokio::spawn(async move {
                server.watch_query(&repo_id(), Revision::new(1), &query, Some(previous), rx).await
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        server.storage().execute(&push_json("rate=1 again", serde_json::json!({"rate": 1}))).await.unwrap();
        server.notify_commit(&repo_id());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        server.storage().execute(&push_json("rate=2", serde_json::json!({"rate": 2}))).await.unwrap();
        server.notify_commit(&repo_id());

        let (revision, value) = waiter.await.unwrap().unwrap();
        assert_eq!(revision, Revision::new(3));
        assert_eq!(value, Content::Json(serde_json::json!(2)));
    }
}
