//! The chunked replication log store (`spec.md` §4.2).

use dogma_coordination::CoordinationClient;
use dogma_types::{LogMetadata, LogSequence, ReplicaId, ReplicationLog, MAX_CHUNK_BYTES};

use crate::error::{LogStoreError, LogStoreResult};

/// Layout rooted at `<root>`: metadata under `logs/`, chunk payloads under
/// `log_blocks/` (`spec.md` §6).
pub struct LogStore<C> {
    client: C,
    root: String,
    replica_id: ReplicaId,
}

impl<C: CoordinationClient> LogStore<C> {
    pub fn new(client: C, root: impl Into<String>, replica_id: ReplicaId) -> Self {
        Self {
            client,
            root: root.into(),
            replica_id,
        }
    }

    fn logs_path(&self) -> String {
        format!("{}/logs", self.root)
    }

    fn blocks_path(&self) -> String {
        format!("{}/log_blocks", self.root)
    }

    /// Ensures the parent coordination nodes exist. Idempotent
    /// (`spec.md` §4.3 step 2).
    pub async fn ensure_initialized(&self) -> LogStoreResult<()> {
        self.client.create_persistent(&self.logs_path()).await?;
        self.client.create_persistent(&self.blocks_path()).await?;
        Ok(())
    }

    /// Appends `record`, chunking its serialized payload into
    /// `<= MAX_CHUNK_BYTES`-byte blocks, and returns the assigned log
    /// sequence (`spec.md` §4.2 "Append").
    pub async fn store_log(&self, record: &ReplicationLog, now_millis: i64) -> LogStoreResult<LogSequence> {
        let payload = serde_json::to_vec(record)?;
        let size = payload.len() as u64;

        let mut blocks = Vec::new();
        for chunk in payload.chunks(MAX_CHUNK_BYTES) {
            let seq = self
                .client
                .create_sequential(&self.blocks_path(), chunk.to_vec())
                .await?;
            blocks.push(seq);
        }

        let metadata = LogMetadata {
            replica_id: self.replica_id,
            timestamp: now_millis,
            size,
            compressed: false,
            encrypted: false,
            blocks,
        };
        let metadata_bytes = serde_json::to_vec(&metadata)?;
        let seq = self
            .client
            .create_sequential(&self.logs_path(), metadata_bytes)
            .await?;
        Ok(LogSequence(seq))
    }

    /// Loads the log at `sequence`. Returns `Ok(None)` if
    /// `skip_if_same_replica` is set and the log originated from this
    /// replica (its own apply already happened, per `spec.md` §3
    /// invariants).
    pub async fn load_log(
        &self,
        sequence: LogSequence,
        skip_if_same_replica: bool,
    ) -> LogStoreResult<Option<ReplicationLog>> {
        let metadata_path = format!("{}/{}", self.logs_path(), sequence.path_segment());
        let metadata_bytes = self.client.read(&metadata_path).await?;
        let metadata: LogMetadata = serde_json::from_slice(&metadata_bytes)?;

        if skip_if_same_replica && metadata.replica_id == self.replica_id {
            return Ok(None);
        }

        let mut payload = Vec::with_capacity(metadata.size as usize);
        for block_seq in &metadata.blocks {
            let block_path = format!("{}/{:010}", self.blocks_path(), block_seq);
            let chunk = self.client.read(&block_path).await?;
            payload.extend_from_slice(&chunk);
        }
        if payload.len() as u64 != metadata.size {
            return Err(LogStoreError::SizeMismatch {
                sequence: sequence.0,
                expected: metadata.size,
                actual: payload.len(),
            });
        }

        let record: ReplicationLog = serde_json::from_slice(&payload)?;
        Ok(Some(record))
    }

    /// Reads only the metadata for `sequence`, without fetching the chunk
    /// payload. Used by pruning.
    pub async fn load_metadata(&self, sequence: LogSequence) -> LogStoreResult<LogMetadata> {
        let metadata_path = format!("{}/{}", self.logs_path(), sequence.path_segment());
        let bytes = self.client.read(&metadata_path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Lists every stored log sequence, ascending.
    pub async fn list_sequences(&self) -> LogStoreResult<Vec<LogSequence>> {
        let names = self.client.list_children(&self.logs_path()).await?;
        let mut sequences: Vec<LogSequence> = names
            .into_iter()
            .filter_map(|name| name.parse::<u64>().ok().map(LogSequence))
            .collect();
        sequences.sort();
        Ok(sequences)
    }

    /// Subscribes to newly appended logs.
    pub async fn watch_new_logs(&self) -> LogStoreResult<tokio::sync::mpsc::Receiver<String>> {
        Ok(self.client.watch_children(&self.logs_path()).await?)
    }

    /// Deletes every log older than `min_log_age_millis` once the total
    /// count exceeds `max_log_count`, oldest first, stopping at the first
    /// log younger than the threshold (`spec.md` §4.2 "Prune"). Must only be
    /// called by the current leader.
    pub async fn prune(
        &self,
        max_log_count: usize,
        min_log_age_millis: i64,
        now_millis: i64,
    ) -> LogStoreResult<usize> {
        let sequences = self.list_sequences().await?;
        if sequences.len() <= max_log_count {
            return Ok(0);
        }

        let mut pruned = 0;
        for seq in sequences {
            let metadata = self.load_metadata(seq).await?;
            if now_millis - metadata.timestamp < min_log_age_millis {
                break;
            }
            let mut paths = vec![format!("{}/{}", self.logs_path(), seq.path_segment())];
            paths.extend(
                metadata
                    .blocks
                    .iter()
                    .map(|b| format!("{}/{:010}", self.blocks_path(), b)),
            );
            self.client.delete_batch(&paths).await?;
            pruned += 1;
            tracing::info!(sequence = seq.0, "pruned replication log");
        }
        Ok(pruned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dogma_coordination::InMemoryCoordinationClient;
    use dogma_types::{Command, CommandResult, Name};

    fn sample_record() -> ReplicationLog {
        ReplicationLog {
            replica_id: ReplicaId(1),
            command: Command::CreateProject {
                name: Name::new("acme").unwrap(),
            },
            result: CommandResult::Void,
        }
    }

    #[tokio::test]
    async fn store_log_returns_dense_monotonic_sequences() {
        let store = LogStore::new(InMemoryCoordinationClient::new(), "/dogma", ReplicaId(1));
        store.ensure_initialized().await.unwrap();

        let seq0 = store.store_log(&sample_record(), 1000).await.unwrap();
        let seq1 = store.store_log(&sample_record(), 1001).await.unwrap();
        assert_eq!(seq0, LogSequence(0));
        assert_eq!(seq1, LogSequence(1));
    }

    #[tokio::test]
    async fn load_log_round_trips() {
        let store = LogStore::new(InMemoryCoordinationClient::new(), "/dogma", ReplicaId(1));
        store.ensure_initialized().await.unwrap();

        let record = sample_record();
        let seq = store.store_log(&record, 1000).await.unwrap();
        let loaded = store.load_log(seq, false).await.unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn load_log_skips_same_replica_when_requested() {
        let store = LogStore::new(InMemoryCoordinationClient::new(), "/dogma", ReplicaId(1));
        store.ensure_initialized().await.unwrap();

        let seq = store.store_log(&sample_record(), 1000).await.unwrap();
        let loaded = store.load_log(seq, true).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn large_payload_is_chunked_across_blocks() {
        let store = LogStore::new(InMemoryCoordinationClient::new(), "/dogma", ReplicaId(1));
        store.ensure_initialized().await.unwrap();

        let mut record = sample_record();
        // Force a payload larger than one chunk via a long summary-bearing
        // push command.
        record.command = Command::NormalizingPush(dogma_types::NormalizingPushFields {
            project: Name::new("acme").unwrap(),
            repository: Name::new("widgets").unwrap(),
            base_revision: dogma_types::Revision::HEAD,
            author: dogma_types::Author {
                name: "a".into(),
                email: "a@example.com".into(),
            },
            summary: "s".repeat(dogma_types::MAX_CHUNK_BYTES * 2),
            detail: String::new(),
            markup: dogma_types::Markup::Plaintext,
            changes: vec![],
        });

        let seq = store.store_log(&record, 1000).await.unwrap();
        let metadata = store.load_metadata(seq).await.unwrap();
        assert!(metadata.blocks.len() >= 2);

        let loaded = store.load_log(seq, false).await.unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn prune_deletes_old_logs_beyond_max_count() {
        let store = LogStore::new(InMemoryCoordinationClient::new(), "/dogma", ReplicaId(1));
        store.ensure_initialized().await.unwrap();

        for i in 0..5i64 {
            store.store_log(&sample_record(), 1000 + i).await.unwrap();
        }

        let pruned = store.prune(2, 0, 10_000).await.unwrap();
        assert_eq!(pruned, 3);
        let remaining = store.list_sequences().await.unwrap();
        assert_eq!(remaining.len(), 2);
    }

    #[tokio::test]
    async fn prune_stops_at_first_log_younger_than_threshold() {
        let store = LogStore::new(InMemoryCoordinationClient::new(), "/dogma", ReplicaId(1));
        store.ensure_initialized().await.unwrap();

        for i in 0..5i64 {
            store.store_log(&sample_record(), i * 1000).await.unwrap();
        }

        // now=4000, min_age=1500: logs with timestamp <= 2500 are prunable.
        let pruned = store.prune(0, 1500, 4000).await.unwrap();
        assert_eq!(pruned, 3);
    }
}
