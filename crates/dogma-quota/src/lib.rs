//! The write-quota limiter (C4): a per-repository shared-count semaphore
//! with lazily-loaded configuration and scheduled lease return
//! (`spec.md` §4.4).

pub mod error;
pub mod limiter;
pub mod metadata;

pub use error::{QuotaError, QuotaResult};
pub use limiter::QuotaLimiter;
pub use metadata::{InMemoryMetadataService, MetadataService, QuotaConfig};

#[cfg(test)]
mod tests {
    use super::*;
    use dogma_coordination::InMemoryCoordinationClient;
    use dogma_types::{Name, RepositoryId, INTERNAL_PROJECT, INTERNAL_REPOSITORY};
    use proptest::prelude::*;

    fn repo(project: &str, repository: &str) -> RepositoryId {
        RepositoryId::new(Name::new(project).unwrap(), Name::new(repository).unwrap())
    }

    #[tokio::test]
    async fn unlimited_repository_always_succeeds() {
        let limiter = QuotaLimiter::new(
            InMemoryCoordinationClient::new(),
            InMemoryMetadataService::new(),
            "/dogma",
        );
        let r = repo("acme", "widgets");
        for _ in 0..10 {
            limiter.acquire(&r).await.unwrap();
        }
    }

    #[tokio::test]
    async fn internal_repository_bypasses_quota() {
        let metadata = InMemoryMetadataService::new();
        let internal = repo(INTERNAL_PROJECT, INTERNAL_REPOSITORY);
        metadata.set_quota(internal.clone(), Some(QuotaConfig::new(1, 1)));
        let limiter = QuotaLimiter::new(InMemoryCoordinationClient::new(), metadata, "/dogma");

        for _ in 0..10 {
            limiter.acquire(&internal).await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_quota_rejects_then_recovers_after_window() {
        let metadata = InMemoryMetadataService::new();
        let r = repo("acme", "widgets");
        metadata.set_quota(r.clone(), Some(QuotaConfig::new(3, 1)));
        let limiter = QuotaLimiter::new(InMemoryCoordinationClient::new(), metadata, "/dogma");

        for _ in 0..3 {
            limiter.acquire(&r).await.unwrap();
        }

        let fourth = limiter.acquire(&r).await;
        assert!(matches!(fourth, Err(QuotaError::TooManyRequests { permits_per_second: 3, .. })));

        tokio::time::advance(std::time::Duration::from_secs(2)).await;
        tokio::task::yield_now().await;

        limiter.acquire(&r).await.unwrap();
    }

    #[tokio::test]
    async fn set_write_quota_updates_cached_limit() {
        let metadata = InMemoryMetadataService::new();
        let r = repo("acme", "widgets");
        let limiter = QuotaLimiter::new(InMemoryCoordinationClient::new(), metadata, "/dogma");

        limiter.set_write_quota(&r, Some(QuotaConfig::new(1, 1))).await.unwrap();
        limiter.acquire(&r).await.unwrap();
        let second = limiter.acquire(&r).await;
        assert!(second.is_err());
    }

    proptest::proptest! {
        /// Invariant 5: of any burst of rapid-fire acquires against a
        /// single repository, at most `requestQuota` ever succeed.
        #[test]
        fn quota_bound_holds_for_any_burst(request_quota in 1u32..20, burst in 1u32..40) {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            runtime.block_on(async {
                let metadata = InMemoryMetadataService::new();
                let r = repo("acme", "widgets");
                metadata.set_quota(r.clone(), Some(QuotaConfig::new(request_quota, 1)));
                let limiter = QuotaLimiter::new(InMemoryCoordinationClient::new(), metadata, "/dogma");

                let mut successes = 0u32;
                for _ in 0..burst {
                    if limiter.acquire(&r).await.is_ok() {
                        successes += 1;
                    }
                }
                prop_assert!(successes <= request_quota);
                Ok(())
            })?;
        }
    }
}
