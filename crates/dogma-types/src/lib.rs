//! Core data model shared by every Dogma crate: revisions, repository
//! coordinates, the tagged command/result encoding, and the replication log
//! record.
//!
//! This crate has no IO and no async runtime dependency; it only defines
//! types and the pure logic that operates on them (path derivation,
//! revision normalization, semantic content comparison).

pub mod change;
pub mod command;
pub mod content;
pub mod error;
pub mod log;
pub mod repository;
pub mod revision;

pub use change::{Author, Change, Markup};
pub use command::{Command, CommandResult, NormalizingPushFields, PushFields, ServerStatus};
pub use content::Content;
pub use error::{DogmaError, DogmaResult};
pub use log::{LogMetadata, LogSequence, ReplicaId, ReplicationLog, MAX_CHUNK_BYTES};
pub use repository::{ExecutionPath, InvalidName, Name, RepositoryId, INTERNAL_PROJECT, INTERNAL_REPOSITORY};
pub use revision::Revision;
