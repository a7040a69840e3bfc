//! Debounced batching of refresh requests.
//!
//! Media transfers arrive in bursts: a season of episodes lands file by
//! file over a few minutes. Refreshing on every arrival would hammer the
//! server, so arrivals are grouped under a batching key (usually the parent
//! directory) and the refresh only fires once the key has been quiet for
//! the configured delay. Each new arrival restarts that delay.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::SchedulerSettings;
use crate::paths;

/// Sink for refresh requests.
///
/// Returns true when the request was accepted. Failures are expected to be
/// logged by the implementation, not propagated; the scheduler only uses
/// the flag to decide whether to fall back to per-path requests.
#[async_trait::async_trait]
pub trait RefreshTarget: Send + Sync {
    async fn refresh_path(&self, path: &str) -> bool;
}

#[derive(Default)]
struct BatchState {
    /// Paths queued under each batching key.
    pending: HashMap<String, HashSet<String>>,
    /// Delay task per batching key; replaced whenever the key sees a new
    /// arrival.
    timers: HashMap<String, JoinHandle<()>>,
}

/// Coalesces arrivals per batching key and fires one refresh per quiet key.
pub struct RefreshScheduler<T: RefreshTarget + 'static> {
    target: Arc<T>,
    settings: SchedulerSettings,
    state: Arc<Mutex<BatchState>>,
}

impl<T: RefreshTarget + 'static> RefreshScheduler<T> {
    pub fn new(target: Arc<T>, settings: SchedulerSettings) -> Self {
        Self {
            target,
            settings,
            state: Arc::new(Mutex::new(BatchState::default())),
        }
    }

    /// Queues a destination path and (re)starts the delay for its key.
    pub fn schedule(&self, path: &str) {
        let key = paths::batch_key(path);
        let mut guard = self.state.lock();
        let queued = {
            let set = guard.pending.entry(key.clone()).or_default();
            set.insert(path.to_string());
            set.len()
        };
        if let Some(previous) = guard.timers.remove(&key) {
            previous.abort();
            debug!(parent = %key, "restarting batch delay");
        }
        let state = Arc::clone(&self.state);
        let target = Arc::clone(&self.target);
        let delay = self.settings.batch_delay;
        let pacing = self.settings.fallback_pacing;
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            // Detached so an abort can only cancel batches that have not
            // begun; a batch in flight always runs to completion.
            tokio::spawn(execute_batch(state, target, pacing, task_key));
        });
        guard.timers.insert(key.clone(), handle);
        debug!(parent = %key, queued, "scheduled batched refresh");
    }

    /// Cancels every scheduled batch and clears the queues.
    ///
    /// Batches already executing are left to finish. Safe to call more than
    /// once.
    pub fn shutdown(&self) {
        let (handles, dropped) = {
            let mut guard = self.state.lock();
            let handles: Vec<JoinHandle<()>> =
                guard.timers.drain().map(|(_, handle)| handle).collect();
            let dropped: usize = guard.pending.values().map(HashSet::len).sum();
            guard.pending.clear();
            (handles, dropped)
        };
        let mut cancelled = 0usize;
        for handle in handles {
            if !handle.is_finished() {
                handle.abort();
                cancelled += 1;
            }
        }
        if cancelled > 0 || dropped > 0 {
            info!(cancelled, dropped, "cancelled scheduled refreshes");
        }
    }

    #[cfg(test)]
    fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    #[cfg(test)]
    fn timer_count(&self) -> usize {
        self.state.lock().timers.len()
    }
}

impl<T: RefreshTarget + 'static> fmt::Debug for RefreshScheduler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("RefreshScheduler");
        s.field("settings", &self.settings);
        match self.state.try_lock() {
            Some(guard) => {
                s.field("pending_parents", &guard.pending.len());
                s.field("live_timers", &guard.timers.len());
            }
            None => {
                s.field("state", &"<locked>");
            }
        }
        s.finish()
    }
}

/// Takes the batch for `key` and refreshes it.
///
/// The timer handle is removed without an abort: this task is the one the
/// handle pointed at, or a newer timer already replaced it. A superseded
/// timer that fires later finds no pending entry and returns.
async fn execute_batch<T: RefreshTarget>(
    state: Arc<Mutex<BatchState>>,
    target: Arc<T>,
    pacing: Duration,
    key: String,
) {
    let batch = {
        let mut guard = state.lock();
        let Some(batch) = guard.pending.remove(&key) else {
            return;
        };
        guard.timers.remove(&key);
        batch
    };
    if batch.is_empty() {
        return;
    }
    info!(parent = %key, paths = batch.len(), "executing batched refresh");
    if target.refresh_path(&key).await {
        info!(parent = %key, "batched refresh succeeded");
        return;
    }
    warn!(parent = %key, "parent refresh failed, retrying each path individually");
    for path in &batch {
        if target.refresh_path(path).await {
            debug!(path, "per-path refresh succeeded");
        } else {
            warn!(path, "per-path refresh failed");
        }
        sleep(pacing).await;
    }
}
