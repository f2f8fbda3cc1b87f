//! The replication log record and its on-disk metadata shape.

use serde::{Deserialize, Serialize};

use crate::command::{Command, CommandResult};

/// Cluster-wide identifier of a replica (the node that originated a log
/// entry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplicaId(pub u64);

/// A single replicated command and its result, as appended to the log
/// (`spec.md` §3 "Replication log record").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationLog {
    #[serde(rename = "replicaId")]
    pub replica_id: ReplicaId,
    pub command: Command,
    pub result: CommandResult,
}

/// The monotonic, cluster-wide sequence number assigned to a log entry by
/// the coordination service. Independent of any repository revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogSequence(pub u64);

impl LogSequence {
    pub const ZERO: LogSequence = LogSequence(0);

    /// Formats the sequence as the 10-digit zero-padded path segment used
    /// under `<root>/logs/<seq>` and `<root>/log_blocks/<seq>`.
    pub fn path_segment(self) -> String {
        format!("{:010}", self.0)
    }

    pub fn next(self) -> LogSequence {
        LogSequence(self.0 + 1)
    }
}

impl std::fmt::Display for LogSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path_segment())
    }
}

/// Metadata for a stored log entry, at `<root>/logs/<seq>` (`spec.md` §3, §6).
///
/// Unknown fields are ignored on deserialize for forward compatibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMetadata {
    #[serde(rename = "replicaId")]
    pub replica_id: ReplicaId,
    pub timestamp: i64,
    pub size: u64,
    #[serde(default)]
    pub compressed: bool,
    #[serde(default)]
    pub encrypted: bool,
    pub blocks: Vec<u64>,
}

/// Maximum payload size per chunk stored under `<root>/log_blocks/` before a
/// record must be split (`spec.md` §3, §4.2).
pub const MAX_CHUNK_BYTES: usize = 1_046_528;
