//! The per-repository write-quota limiter (`spec.md` §4.4).

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use lru::LruCache;

use dogma_coordination::{CoordinationClient, LeaseHandle};
use dogma_types::{ExecutionPath, RepositoryId};

use crate::error::{QuotaError, QuotaResult};
use crate::metadata::{MetadataService, QuotaConfig};

/// Acquisition timeout for a single permit (`spec.md` §4.4).
const ACQUIRE_TIMEOUT: Duration = Duration::from_millis(200);

/// Bound on the cached `QuotaConfig` set (`spec.md` §4.4).
const CACHE_CAPACITY: usize = 2_000;

struct CacheEntry {
    config: Option<QuotaConfig>,
    /// The permit count last pushed to the coordination service via
    /// `setSharedCount`, so repeated requests for an unchanged quota don't
    /// re-issue the call.
    applied_count: Option<u32>,
}

/// Limits writes against a repository to `requestQuota` per
/// `timeWindowSeconds`, backed by a shared-count semaphore node per
/// repository. Internal project/repository traffic bypasses enforcement
/// entirely.
///
/// `client` is held behind an `Arc` so the lease-return scheduler (a
/// detached task standing in for the source's dedicated single-thread
/// scheduler) can hold its own handle without requiring `C: Clone`.
pub struct QuotaLimiter<C, M> {
    client: Arc<C>,
    metadata: M,
    root: String,
    cache: StdMutex<LruCache<RepositoryId, CacheEntry>>,
}

impl<C: CoordinationClient, M: MetadataService> QuotaLimiter<C, M> {
    pub fn new(client: C, metadata: M, root: impl Into<String>) -> Self {
        Self {
            client: Arc::new(client),
            metadata,
            root: root.into(),
            cache: StdMutex::new(LruCache::new(NonZeroUsize::new(CACHE_CAPACITY).unwrap())),
        }
    }

    fn quota_path(&self, repo: &RepositoryId) -> String {
        format!("{}/quota/{}/{}", self.root, repo.project, repo.repository)
    }

    /// Loads (from cache, or lazily from the metadata service) the quota
    /// configuration for `repo`, ensuring the coordination semaphore's
    /// permit count matches it.
    async fn load(&self, repo: &RepositoryId) -> QuotaResult<Option<QuotaConfig>> {
        let cached = self.cache.lock().unwrap().get(repo).map(|e| e.config);
        if let Some(config) = cached {
            return Ok(config);
        }

        let config = self.metadata.quota_for(repo).await;
        self.apply(repo, config).await?;
        Ok(config)
    }

    /// Pushes `config`'s permit count to the coordination service if it
    /// differs from what was last applied, and updates the cache.
    async fn apply(&self, repo: &RepositoryId, config: Option<QuotaConfig>) -> QuotaResult<()> {
        let previous_count = self.cache.lock().unwrap().peek(repo).and_then(|e| e.applied_count);
        let new_count = config.map(|c| c.permit_count());

        if new_count != previous_count {
            if let Some(count) = new_count {
                self.client.set_shared_count(&self.quota_path(repo), count).await?;
            }
        }

        self.cache.lock().unwrap().put(
            repo.clone(),
            CacheEntry {
                config,
                applied_count: new_count,
            },
        );
        Ok(())
    }

    /// Sets (or clears) `repo`'s write-quota configuration, analogous to the
    /// public `setWriteQuota` operation.
    pub async fn set_write_quota(&self, repo: &RepositoryId, config: Option<QuotaConfig>) -> QuotaResult<()> {
        self.apply(repo, config).await
    }

    /// Drops any cached quota state for `repo`. Called when the repository
    /// is removed (`spec.md` §4.3 step 4: "for `RemoveRepository`, drop the
    /// quota state for that repo").
    pub fn forget(&self, repo: &RepositoryId) {
        self.cache.lock().unwrap().pop(repo);
    }

    /// Attempts to acquire a write-quota permit for `repo`. Returns `Ok(())`
    /// immediately for the internal project/repository or for a repository
    /// with no configured quota. Otherwise blocks up to `ACQUIRE_TIMEOUT`;
    /// on success the permit is automatically returned after
    /// `timeWindowSeconds` on a detached task.
    pub async fn acquire(&self, repo: &RepositoryId) -> QuotaResult<()> {
        if repo.is_internal() {
            return Ok(());
        }

        let Some(config) = self.load(repo).await? else {
            return Ok(());
        };

        let path = self.quota_path(repo);
        let permit = self
            .client
            .acquire_shared_count_permit(&path, config.permit_count(), ACQUIRE_TIMEOUT)
            .await?;

        let Some(lease) = permit else {
            tracing::debug!(%repo, quota = config.request_quota, "write-quota exhausted");
            return Err(QuotaError::TooManyRequests {
                execution_path: ExecutionPath::repository(repo),
                permits_per_second: config.request_quota,
            });
        };

        self.schedule_return(lease, Duration::from_secs(config.time_window_seconds as u64));
        Ok(())
    }

    fn schedule_return(&self, lease: LeaseHandle, after: Duration) {
        let client = Arc::clone(&self.client);
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Err(err) = client.return_permit(lease).await {
                tracing::warn!(%err, "failed to return write-quota lease");
            }
        });
    }
}
