//! The long-lived, self-reconnecting client-side file watcher (`spec.md`
//! §4.5). Built directly against a [`WatchServer`] rather than a remote RPC
//! client, since `dogma-client` (C6) has no transport of its own yet; the
//! reconnect/backoff/listener machinery here is exactly what a remote-backed
//! watcher would layer on top of a network `doWatch` call.

use std::sync::{Arc, Mutex as StdMutex, RwLock as StdRwLock};

use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use dogma_storage::LocalStorage;
use dogma_types::{Content, DogmaError, RepositoryId, Revision};

use crate::backoff::{self, DELAY_ON_SUCCESS};
use crate::query::Query;
use crate::server::WatchServer;

type Listener = Arc<dyn Fn(Revision, &Content) + Send + Sync>;

/// Forward-only lifecycle: `Init -> Started -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Init,
    Started,
    Stopped,
}

/// A self-reconnecting watch over one file, delivering `(revision, value)`
/// to every registered listener whenever the value semantically changes.
pub struct Watcher<S: LocalStorage> {
    server: Arc<WatchServer<S>>,
    repo: RepositoryId,
    query: Query,
    state: StdRwLock<WatcherState>,
    latest: StdMutex<Option<(Revision, Content)>>,
    listeners: StdMutex<Vec<Listener>>,
    cancel_tx: StdMutex<Option<oneshot::Sender<()>>>,
    task: StdMutex<Option<JoinHandle<()>>>,
    initial_value_ready: Notify,
}

impl<S: LocalStorage> Watcher<S> {
    pub fn new(server: Arc<WatchServer<S>>, repo: RepositoryId, query: Query) -> Arc<Self> {
        Arc::new(Self {
            server,
            repo,
            query,
            state: StdRwLock::new(WatcherState::Init),
            latest: StdMutex::new(None),
            listeners: StdMutex::new(Vec::new()),
            cancel_tx: StdMutex::new(None),
            task: StdMutex::new(None),
            initial_value_ready: Notify::new(),
        })
    }

    pub fn state(&self) -> WatcherState {
        *self.state.read().unwrap()
    }

    pub fn latest(&self) -> Option<(Revision, Content)> {
        self.latest.lock().unwrap().clone()
    }

    /// Starts the reconnect loop. A no-op on a `Watcher` that has already
    /// left `Init` (started, or closed before ever starting).
    pub fn start(self: &Arc<Self>) {
        {
            let mut state = self.state.write().unwrap();
            if *state != WatcherState::Init {
                return;
            }
            *state = WatcherState::Started;
        }
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.run().await });
        *self.task.lock().unwrap() = Some(handle);
    }

    /// Registers `listener`. If a value has already been observed, schedules
    /// an immediate one-shot delivery of it so every listener sees an
    /// "initial" event, matching the behavior of a listener that registers
    /// after the first value has already arrived.
    pub fn watch(self: &Arc<Self>, listener: impl Fn(Revision, &Content) + Send + Sync + 'static) {
        let listener: Listener = Arc::new(listener);
        self.listeners.lock().unwrap().push(Arc::clone(&listener));
        if let Some((revision, value)) = self.latest() {
            tokio::spawn(async move { listener(revision, &value) });
        }
    }

    /// Resolves with the first delivered value, or `None` if the watcher is
    /// closed before one arrives.
    pub async fn initial_value(&self) -> Option<(Revision, Content)> {
        loop {
            let notified = self.initial_value_ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(value) = self.latest() {
                return Some(value);
            }
            if self.state() == WatcherState::Stopped {
                return None;
            }
            notified.await;
        }
    }

    /// Stops the reconnect loop: cancels any in-flight watch, any scheduled
    /// retry/re-arm sleep, and unblocks [`Watcher::initial_value`] if still
    /// pending. Idempotent.
    pub fn close(&self) {
        {
            let mut state = self.state.write().unwrap();
            if *state == WatcherState::Stopped {
                return;
            }
            *state = WatcherState::Stopped;
        }
        if let Some(tx) = self.cancel_tx.lock().unwrap().take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.task.lock().unwrap().take() {
            handle.abort();
        }
        self.initial_value_ready.notify_waiters();
    }

    async fn run(self: Arc<Self>) {
        let mut last_known = Revision::INIT;
        let mut attempt: u32 = 0;
        loop {
            if self.state() == WatcherState::Stopped {
                return;
            }

            let previous_value = self.latest.lock().unwrap().as_ref().map(|(_, value)| value.clone());
            let (cancel_tx, cancel_rx) = oneshot::channel();
            *self.cancel_tx.lock().unwrap() = Some(cancel_tx);
            if self.state() == WatcherState::Stopped {
                return;
            }

            match self
                .server
                .watch_query(&self.repo, last_known, &self.query, previous_value, cancel_rx)
                .await
            {
                Ok((revision, value)) => {
                    last_known = revision;
                    attempt = 0;
                    *self.latest.lock().unwrap() = Some((revision, value.clone()));
                    self.initial_value_ready.notify_waiters();
                    for listener in self.listeners.lock().unwrap().iter().cloned().collect::<Vec<_>>() {
                        let value = value.clone();
                        tokio::spawn(async move { listener(revision, &value) });
                    }
                    tokio::time::sleep(DELAY_ON_SUCCESS).await;
                }
                Err(DogmaError::Cancelled) => return,
                Err(err) => {
                    attempt += 1;
                    log_watch_attempt_error(&err);
                    tokio::time::sleep(backoff::reconnect_delay(attempt)).await;
                }
            }
        }
    }
}

fn log_watch_attempt_error(err: &DogmaError) {
    match err {
        DogmaError::EntryNotFound(_) | DogmaError::RepositoryNotFound(_) | DogmaError::ShuttingDown => {
            info!(error = %err, "watch attempt failed, will retry");
        }
        other => warn!(error = %other, "watch attempt failed, will retry"),
    }
}
