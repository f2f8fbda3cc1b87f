//! Layered configuration for the dogma server.
//!
//! Five-source precedence, highest last:
//! 1. Built-in defaults
//! 2. `~/.config/dogma/config.toml` (XDG user defaults)
//! 3. `dogma.toml` (git-tracked, project config)
//! 4. `dogma.local.toml` (gitignored, local overrides)
//! 5. `DOGMA_*` environment variables

use serde::{Deserialize, Serialize};
use std::path::Path;

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// The dogma server's full tunable surface, per the external-interfaces
/// configuration list: executor pool size and coordination session timeout,
/// replication-log pruning thresholds, the global write-quota default,
/// the lag-tolerant proxy's retry policy, and the per-execution-path lock
/// timeout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DogmaConfig {
    pub executor: ExecutorConfig,
    pub replog: ReplogConfig,
    pub write_quota: WriteQuotaConfig,
    pub client: ClientConfig,
    pub lock_timeout_millis: LockTimeout,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub num_workers: u32,
    pub timeout_millis: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { num_workers: 4, timeout_millis: 10_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplogConfig {
    pub max_log_count: u32,
    pub min_log_age_millis: u64,
}

impl Default for ReplogConfig {
    fn default() -> Self {
        Self { max_log_count: 100, min_log_age_millis: 86_400_000 }
    }
}

/// The global write-quota default (`spec.md` §6: `writeQuota =
/// {requestQuota, timeWindowSeconds}`); per-repository overrides live in the
/// out-of-scope metadata store, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteQuotaConfig {
    pub request_quota: u32,
    pub time_window_seconds: u32,
}

impl Default for WriteQuotaConfig {
    fn default() -> Self {
        Self { request_quota: 100, time_window_seconds: 1 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub max_retries: u32,
    pub retry_interval_millis: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { max_retries: 3, retry_interval_millis: 500 }
    }
}

/// A newtype so the top-level `lock_timeout_millis` field (spec default:
/// 60,000) round-trips through TOML/env like the nested tunable groups,
/// without needing its own `[section]` header.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct LockTimeout(pub u64);

impl Default for LockTimeout {
    fn default() -> Self {
        Self(60_000)
    }
}

impl DogmaConfig {
    /// Loads configuration from the default locations, rooted at the
    /// current working directory.
    pub fn load() -> anyhow::Result<Self> {
        ConfigLoader::new().load()
    }

    /// Loads configuration rooted at a specific project directory.
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }
}
