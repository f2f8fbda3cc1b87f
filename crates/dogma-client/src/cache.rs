//! The bounded `(project, repo) -> highestObservedRevision` map the proxy
//! uses to decide whether a `RevisionNotFound` is worth retrying
//! (`spec.md` §4.6).

use std::num::NonZeroUsize;
use std::sync::Mutex as StdMutex;

use lru::LruCache;

use dogma_types::{RepositoryId, Revision};

/// Bound on the cached entry count (`spec.md` §4.6: "bounded (~8,000-entry
/// LRU)").
pub const CACHE_CAPACITY: usize = 8_000;

/// Tracks, per repository, the highest revision this proxy has observed
/// returned or implied by a successful operation.
pub struct RevisionCache {
    entries: StdMutex<LruCache<RepositoryId, Revision>>,
}

impl RevisionCache {
    pub fn new() -> Self {
        Self {
            entries: StdMutex::new(LruCache::new(NonZeroUsize::new(CACHE_CAPACITY).unwrap())),
        }
    }

    pub fn highest(&self, repo: &RepositoryId) -> Option<Revision> {
        self.entries.lock().unwrap().get(repo).copied()
    }

    /// Records `revision` as observed for `repo`, if it is newer than
    /// whatever is already cached.
    pub fn observe(&self, repo: &RepositoryId, revision: Revision) {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(repo) {
            Some(existing) if *existing >= revision => {}
            _ => {
                entries.put(repo.clone(), revision);
            }
        }
    }
}

impl Default for RevisionCache {
    fn default() -> Self {
        Self::new()
    }
}
