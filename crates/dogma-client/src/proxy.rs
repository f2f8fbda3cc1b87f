//! The lag-tolerant retry proxy (`spec.md` §4.6): wraps any
//! [`LocalStorage`]-shaped peer — local or, eventually, a remote RPC client —
//! and retries a `RevisionNotFound` that its own [`RevisionCache`] believes
//! should already have landed, instead of surfacing it to the caller
//! immediately.

use dogma_storage::LocalStorage;
use dogma_types::{Command, CommandResult, Content, DogmaResult, RepositoryId, Revision};

use crate::cache::RevisionCache;
use crate::retry::{retry_on_revision_not_found, RetryConfig};

/// A [`LocalStorage`] decorator: same contract, same shape, but with a
/// bounded revision cache and a `RevisionNotFound` retry policy layered on
/// top. Generalized directly over `LocalStorage` rather than a separate
/// "remote client" trait, since a remote RPC-backed peer needs to expose
/// exactly this surface.
pub struct LagTolerantClient<S> {
    inner: S,
    cache: RevisionCache,
    config: RetryConfig,
}

impl<S: LocalStorage> LagTolerantClient<S> {
    pub fn new(inner: S) -> Self {
        Self::with_config(inner, RetryConfig::default())
    }

    pub fn with_config(inner: S, config: RetryConfig) -> Self {
        Self {
            inner,
            cache: RevisionCache::new(),
            config,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn cache(&self) -> &RevisionCache {
        &self.cache
    }

    fn observe_result(&self, repo: Option<&RepositoryId>, result: &CommandResult) {
        let Some(repo) = repo else { return };
        match result {
            CommandResult::Revision(revision) => self.cache.observe(repo, *revision),
            CommandResult::CommitResult { revision, .. } => self.cache.observe(repo, *revision),
            CommandResult::Void => {}
        }
    }
}

impl<S: LocalStorage> LocalStorage for LagTolerantClient<S> {
    async fn execute(&self, cmd: &Command) -> DogmaResult<CommandResult> {
        let repo = cmd.repository_id();
        let result = match &repo {
            Some(repo) => {
                retry_on_revision_not_found(&self.config, &self.cache, repo, || self.inner.execute(cmd)).await?
            }
            None => self.inner.execute(cmd).await?,
        };
        self.observe_result(repo.as_ref(), &result);
        Ok(result)
    }

    async fn get_file(&self, repo: &RepositoryId, revision: Revision, path: &str) -> DogmaResult<Content> {
        retry_on_revision_not_found(&self.config, &self.cache, repo, || {
            self.inner.get_file(repo, revision, path)
        })
        .await
    }

    async fn head_revision(&self, repo: &RepositoryId) -> DogmaResult<Revision> {
        let revision = self.inner.head_revision(repo).await?;
        self.cache.observe(repo, revision);
        Ok(revision)
    }

    async fn find_latest_revision(
        &self,
        repo: &RepositoryId,
        last_known: Revision,
        pattern: &str,
    ) -> DogmaResult<Option<Revision>> {
        let found = retry_on_revision_not_found(&self.config, &self.cache, repo, || {
            self.inner.find_latest_revision(repo, last_known, pattern)
        })
        .await?;
        if let Some(revision) = found {
            self.cache.observe(repo, revision);
        }
        Ok(found)
    }
}
