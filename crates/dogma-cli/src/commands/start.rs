//! Start command - runs a single in-process replica until interrupted.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use dogma_config::DogmaConfig;
use dogma_coordination::InMemoryCoordinationClient;
use dogma_executor::{Executor, ExecutorConfig, InMemoryCursorStore};
use dogma_quota::InMemoryMetadataService;
use dogma_storage::InMemoryStorage;
use dogma_types::ReplicaId;
use tracing::info;

pub fn run(path: &str, replica_id: u64) -> Result<()> {
    let data_dir = Path::new(path);
    if !dogma_config::Paths::is_initialized(data_dir) {
        bail!("'{path}' is not initialized. Run 'dogma init {path}' first.");
    }

    let config = DogmaConfig::load_from_dir(data_dir).context("failed to load configuration")?;

    println!("dogma replica {replica_id}");
    println!("  data directory: {}", data_dir.canonicalize().unwrap_or(data_dir.to_path_buf()).display());
    println!("  num_workers:    {}", config.executor.num_workers);
    println!("  lock_timeout:   {} ms", config.lock_timeout_millis.0);
    println!();
    println!("This is a single-process replica backed by the in-memory storage and");
    println!("coordination reference doubles; a production deployment wires in a real");
    println!("versioned storage engine and ensemble client instead. Press Ctrl-C to stop.");

    let runtime = tokio::runtime::Runtime::new().context("failed to start the tokio runtime")?;
    runtime.block_on(run_replica(config, replica_id))
}

async fn run_replica(config: DogmaConfig, replica_id: u64) -> Result<()> {
    let executor_config = ExecutorConfig {
        num_workers: config.executor.num_workers as usize,
        lock_timeout: Duration::from_millis(config.lock_timeout_millis.0),
        max_log_count: config.replog.max_log_count as usize,
        min_log_age_millis: config.replog.min_log_age_millis as i64,
    };

    let executor = std::sync::Arc::new(Executor::new(
        InMemoryCoordinationClient::new(),
        InMemoryStorage::new(),
        InMemoryMetadataService::new(),
        InMemoryCursorStore::new(),
        "/dogma",
        ReplicaId(replica_id),
        executor_config,
    ));

    executor
        .start(
            || info!("took leadership, pruning enabled"),
            || info!("released leadership, pruning disabled"),
        )
        .await
        .context("failed to start executor")?;

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;

    println!("shutting down...");
    executor.stop().await;
    Ok(())
}
