//! The coordination client (C1): a thin adapter over an external ensemble
//! providing sequential nodes, a distributed mutex, a shared-count
//! semaphore, and leader election, plus the shared transient-retry loop.

pub mod client;
pub mod error;
pub mod memory;
pub mod retry;

pub use client::{CoordinationClient, LeaderElection, LeaseHandle, MutexHandle};
pub use error::CoordinationError;
pub use memory::InMemoryCoordinationClient;
pub use retry::{Attempt, RETRY_INTERVAL, retry_transient};
