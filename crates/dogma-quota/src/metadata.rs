//! The (out-of-scope) metadata service's write-quota facet: the delegate
//! this crate consults to load and persist a repository's [`QuotaConfig`].

use dogma_types::RepositoryId;

/// A repository's write-quota configuration. `None` (absent from the
/// metadata service) means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaConfig {
    pub request_quota: u32,
    pub time_window_seconds: u32,
}

impl QuotaConfig {
    pub fn new(request_quota: u32, time_window_seconds: u32) -> Self {
        Self {
            request_quota,
            time_window_seconds,
        }
    }

    /// The semaphore's total permit count: `requestQuota * timeWindowSeconds`
    /// (`spec.md` §4.4).
    pub fn permit_count(&self) -> u32 {
        self.request_quota.saturating_mul(self.time_window_seconds)
    }
}

/// The metadata service facet this crate depends on. A real implementation
/// would be backed by the (out-of-scope) cluster metadata store; tests and
/// single-node setups use [`InMemoryMetadataService`].
pub trait MetadataService: Send + Sync + 'static {
    /// Loads the current write-quota configuration for `repo`, or `None` if
    /// the repository is unlimited.
    fn quota_for(&self, repo: &RepositoryId) -> impl Future<Output = Option<QuotaConfig>> + Send;
}

/// An in-memory [`MetadataService`] fake, suitable for tests and for a
/// single-replica deployment with no external metadata store.
#[derive(Default)]
pub struct InMemoryMetadataService {
    quotas: std::sync::Mutex<std::collections::HashMap<RepositoryId, QuotaConfig>>,
}

impl InMemoryMetadataService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets (or clears, with `None`) the quota for `repo`. Mirrors the
    /// public `setWriteQuota` operation (`spec.md` §4 "C3 public contract").
    pub fn set_quota(&self, repo: RepositoryId, quota: Option<QuotaConfig>) {
        let mut quotas = self.quotas.lock().unwrap();
        match quota {
            Some(q) => {
                quotas.insert(repo, q);
            }
            None => {
                quotas.remove(&repo);
            }
        }
    }
}

impl MetadataService for InMemoryMetadataService {
    async fn quota_for(&self, repo: &RepositoryId) -> Option<QuotaConfig> {
        self.quotas.lock().unwrap().get(repo).copied()
    }
}
