//! dogma: a replicated, versioned configuration repository.
//!
//! dogma keeps hierarchical configuration (JSON, YAML, and plain text files
//! under per-project, per-repository paths) consistent across a replica
//! ensemble. Every mutation is a normalizing push against an explicit base
//! revision; every successful push is appended to a replicated log so other
//! replicas converge by replay, not by a second round of consensus on the
//! projected state itself.
//!
//! # Architecture
//!
//! ```text
//! coordination (C1) -> storage delegate -> executor (C3) -> replication log (C2)
//!                                              |
//!                                   write quota (C4)
//!                                              |
//!                                        watch (C5) <- lag-tolerant client (C6)
//! ```
//!
//! # Quick start
//!
//! ```ignore
//! use dogma::{Command, DogmaConfig, Name, Replica, ReplicaId};
//!
//! # async fn run() -> dogma::DogmaResult<()> {
//! let replica = Replica::start("/dogma", ReplicaId(1), &DogmaConfig::default()).await?;
//! replica.execute(Command::CreateProject { name: Name::new("acme").unwrap() }).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - **Convenience API**: [`Replica`] - a single in-process executor and
//!   watch server sharing one storage instance
//! - **Coordination (C1)**: [`CoordinationClient`], [`InMemoryCoordinationClient`]
//! - **Storage delegate**: [`LocalStorage`], [`InMemoryStorage`]
//! - **Replication log (C2)**: [`LogStore`]
//! - **Executor (C3)**: [`Executor`], [`ExecutorConfig`]
//! - **Write quota (C4)**: [`QuotaLimiter`], [`MetadataService`]
//! - **Watch (C5)**: [`WatchServer`], [`Watcher`], [`Query`]
//! - **Lag-tolerant client (C6)**: [`LagTolerantClient`], [`RevisionCache`]
//! - **Configuration**: [`DogmaConfig`], [`ConfigLoader`]

mod replica;

pub use replica::{InMemoryExecutor, InMemoryWatchServer, Replica};

// Core data model.
pub use dogma_types::{
    Author, Change, Command, CommandResult, Content, DogmaError, DogmaResult, ExecutionPath, InvalidName,
    LogMetadata, LogSequence, Markup, Name, NormalizingPushFields, PushFields, ReplicaId, ReplicationLog,
    RepositoryId, Revision, ServerStatus, INTERNAL_PROJECT, INTERNAL_REPOSITORY, MAX_CHUNK_BYTES,
};

// Coordination client (C1).
pub use dogma_coordination::{
    retry_transient, Attempt, CoordinationClient, CoordinationError, InMemoryCoordinationClient, LeaderElection,
    LeaseHandle, MutexHandle, RETRY_INTERVAL,
};

// Local storage delegate.
pub use dogma_storage::{InMemoryStorage, LocalStorage};

// Replication log (C2).
pub use dogma_replog::{LogStore, LogStoreError, LogStoreResult};

// Command executor (C3).
pub use dogma_executor::{
    CursorStore, Executor, ExecutorConfig, ExecutorState, InMemoryCursorStore, DEFAULT_LOCK_TIMEOUT_MILLIS,
    PRUNE_INTERVAL,
};

// Write quota (C4).
pub use dogma_quota::{InMemoryMetadataService, MetadataService, QuotaConfig, QuotaError, QuotaLimiter, QuotaResult};

// Watch subsystem (C5).
pub use dogma_watch::{
    base_delay_millis, jittered, reconnect_delay, Query, WatchServer, Watcher, WatcherState, DELAY_ON_SUCCESS,
    MAX_INTERVAL_MILLIS, MIN_INTERVAL_MILLIS,
};

// Lag-tolerant client (C6).
pub use dogma_client::{
    retry_eligible, retry_on_revision_not_found, LagTolerantClient, RetryConfig, RevisionCache, CACHE_CAPACITY,
};

// Layered configuration. `dogma_config::ExecutorConfig` is the on-disk
// tunable group, distinct from the executor's own runtime `ExecutorConfig`
// above, so it is re-exported under a name that doesn't collide.
pub use dogma_config::{
    ClientConfig, ConfigError, ConfigLoader, DogmaConfig, ExecutorConfig as ExecutorSettings, LockTimeout, Paths,
    ReplogConfig, WriteQuotaConfig,
};
