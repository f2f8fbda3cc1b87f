//! The lag-tolerant retry proxy (C6): a bounded revision cache plus a
//! `RevisionNotFound` retry policy layered over any [`dogma_storage::LocalStorage`]
//! peer (`spec.md` §4.6).

mod cache;
mod proxy;
mod retry;

pub use cache::{RevisionCache, CACHE_CAPACITY};
pub use proxy::LagTolerantClient;
pub use retry::{retry_eligible, retry_on_revision_not_found, RetryConfig};
