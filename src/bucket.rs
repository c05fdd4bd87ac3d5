use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

use crate::counter_store::CounterStore;
use crate::error::CounterError;

/// Sliding attempt counter per key.
///
/// Every increment is undone by a decay task after `expiry`. Decay tasks are
/// tied to the process-wide `shutdown` token, never to the request that
/// triggered them, so a dropped request still gets its attempt decayed.
pub struct RateCounter {
    store: Arc<dyn CounterStore>,
    expiry: Duration,
    safety_ttl: Duration,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

/// The store reports a key's value as text; a value of exactly "1" right
/// after an increment is taken to mean the increment created the key.
///
/// A key that decayed to zero and is incremented again also reads "1";
/// replace with a get-or-create primitive if the store grows one.
fn is_new_key(value: &str) -> bool {
    value == "1"
}

impl RateCounter {
    pub fn new(
        store: Arc<dyn CounterStore>,
        expiry: Duration,
        safety_ttl: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            expiry,
            safety_ttl,
            tracker: TaskTracker::new(),
            shutdown,
        }
    }

    /// Counts one attempt for `key` and returns the number of attempts in the current window.
    ///
    /// Keys may be secrets (the password dimension), so logs only carry `dimension`.
    pub async fn increment(
        &self,
        dimension: &'static str,
        key: &str,
    ) -> Result<i64, CounterError> {
        let count = self.store.incr(key).await.inspect_err(|e| {
            error!(dimension, error = %e, "getting increment error");
        })?;
        self.schedule_decrement(dimension, key);
        debug!(dimension, count, "increment");

        // abandoned keys are reclaimed by the store even if decay never runs
        let current = self.store.get(key).await.inspect_err(|e| {
            error!(dimension, error = %e, "getting key error");
        })?;
        if current.as_deref().is_some_and(is_new_key) {
            self.store
                .expire(key, self.safety_ttl)
                .await
                .inspect_err(|e| error!(dimension, error = %e, "setting TTL error"))?;
            debug!(dimension, "setting TTL for new key");
        }

        Ok(count)
    }

    fn schedule_decrement(&self, dimension: &'static str, key: &str) {
        let store = Arc::clone(&self.store);
        let shutdown = self.shutdown.clone();
        let expiry = self.expiry;
        let key = key.to_string();

        self.tracker.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(expiry) => decrement(store.as_ref(), dimension, &key).await,
                _ = shutdown.cancelled() => {
                    debug!(dimension, "decay cancelled by shutdown");
                }
            }
        });
    }

    /// Removes `key` outright.
    pub async fn clean(&self, dimension: &'static str, key: &str) -> Result<(), CounterError> {
        self.store.delete(key).await?;
        info!(dimension, "key removed");
        Ok(())
    }

    /// Number of decay tasks not yet finished.
    pub fn pending_decays(&self) -> usize {
        self.tracker.len()
    }

    /// Cancels outstanding decay tasks and waits for them to exit.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!("rate counter drained");
    }
}

async fn decrement(store: &dyn CounterStore, dimension: &'static str, key: &str) {
    match store.decr(key).await {
        Ok(count) => debug!(dimension, count, "decrement"),
        Err(e) => error!(dimension, error = %e, "decrement error"),
    }
}
