//! The watch subsystem (C5): server-side `find`/`watch` primitives built on
//! top of the local storage delegate, and a client-side, self-reconnecting
//! `Watcher` with exponential-backoff-with-jitter reconnect scheduling
//! (`spec.md` §4.5).

mod backoff;
mod query;
mod server;
mod watcher;

pub use backoff::{base_delay_millis, jittered, reconnect_delay, DELAY_ON_SUCCESS, MAX_INTERVAL_MILLIS, MIN_INTERVAL_MILLIS};
pub use query::Query;
pub use server::WatchServer;
pub use watcher::{Watcher, WatcherState};
