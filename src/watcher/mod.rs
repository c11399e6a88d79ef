//! One-shot, cancellable callback bound to an absolute instant.
//!
//! A [`Watcher`] is created idle by [`Watcher::schedule`] and begins waiting
//! once [`Watcher::start`] spawns its task on the tokio runtime. Expiry and
//! cancellation race; whichever moves the state out of
//! [`WatcherState::Pending`] first decides the outcome:
//!
//! - cancelled first: the callback never runs and no error is recorded
//! - expired first: the callback runs exactly once and a later cancel is a no-op
//!
//! Callback failures are never surfaced proactively, callers poll
//! [`Watcher::last_error`].

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Boxed callback executed when the watcher fires.
pub type WatcherCallback = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Pending,
    Fired,
    Cancelled,
}

struct Inner {
    execution_date: DateTime<Utc>,
    state: Mutex<WatcherState>,
    callback: Mutex<Option<WatcherCallback>>,
    cancel_tx: mpsc::Sender<()>,
    cancel_rx: Mutex<Option<mpsc::Receiver<()>>>,
    last_error: Mutex<Option<Arc<anyhow::Error>>>,
    /// Flips to `true` once the callback has returned or was cancelled.
    done: watch::Sender<bool>,
}

/// Cheaply cloneable handle; all clones control the same scheduled callback.
#[derive(Clone)]
pub struct Watcher {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("execution_date", &self.inner.execution_date)
            .field("state", &self.state())
            .finish()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Watcher {
    /// Creates a watcher for `at`. Nothing runs until [`Watcher::start`].
    pub fn schedule<F, Fut>(at: DateTime<Utc>, callback: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let boxed: WatcherCallback = Box::new(move || Box::pin(callback()));
        Self::with_callback(at, boxed)
    }

    pub fn with_callback(at: DateTime<Utc>, callback: WatcherCallback) -> Self {
        let (cancel_tx, cancel_rx) = mpsc::channel(1);
        Self {
            inner: Arc::new(Inner {
                execution_date: at,
                state: Mutex::new(WatcherState::Pending),
                callback: Mutex::new(Some(callback)),
                cancel_tx,
                cancel_rx: Mutex::new(Some(cancel_rx)),
                last_error: Mutex::new(None),
                done: watch::Sender::new(false),
            }),
        }
    }

    /// Spawns the background wait. Starting twice, or starting a watcher
    /// that was already cancelled, does nothing.
    pub fn start(&self) {
        let Some(mut cancel_rx) = lock(&self.inner.cancel_rx).take() else {
            debug!("Watcher already started");
            return;
        };
        if self.state() != WatcherState::Pending {
            return;
        }
        let inner = self.inner.clone();
        let wait = self.remaining_time();
        debug!(execution_date = %inner.execution_date, ?wait, "Watcher started");
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel_rx.recv() => {
                    debug!(execution_date = %inner.execution_date, "Watcher cancelled while waiting");
                }
                _ = tokio::time::sleep(wait) => {
                    inner.fire().await;
                }
            }
        });
    }

    /// Best-effort cancellation. A no-op once the watcher has fired.
    pub fn cancel(&self) {
        {
            let mut state = lock(&self.inner.state);
            if *state != WatcherState::Pending {
                return;
            }
            *state = WatcherState::Cancelled;
        }
        // A full slot means a signal is already queued.
        let _ = self.inner.cancel_tx.try_send(());
        lock(&self.inner.callback).take();
        self.inner.done.send_replace(true);
    }

    /// Resolves once the watcher is settled: its callback has returned, or
    /// it was cancelled. Never resolves for a pending watcher that is not
    /// started.
    pub async fn wait(&self) {
        let mut done = self.inner.done.subscribe();
        // The sender lives in `inner`, which `self` keeps alive.
        let _ = done.wait_for(|settled| *settled).await;
    }

    /// Time until the callback is due, floored at zero.
    pub fn remaining_time(&self) -> Duration {
        (self.inner.execution_date - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    pub fn execution_date(&self) -> DateTime<Utc> {
        self.inner.execution_date
    }

    pub fn state(&self) -> WatcherState {
        *lock(&self.inner.state)
    }

    /// Error returned by the callback, if it fired and failed.
    pub fn last_error(&self) -> Option<Arc<anyhow::Error>> {
        lock(&self.inner.last_error).clone()
    }
}

impl Inner {
    async fn fire(&self) {
        {
            let mut state = lock(&self.state);
            if *state != WatcherState::Pending {
                return;
            }
            *state = WatcherState::Fired;
        }
        let Some(callback) = lock(&self.callback).take() else {
            self.done.send_replace(true);
            return;
        };
        info!(execution_date = %self.execution_date, "Watcher fired");
        if let Err(e) = callback().await {
            warn!(execution_date = %self.execution_date, error = %e, "Watcher callback failed");
            *lock(&self.last_error) = Some(Arc::new(e));
        }
        self.done.send_replace(true);
    }
}
