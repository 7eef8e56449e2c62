//! Request coalescing: at most one in-flight producer per key.
//!
//! Concurrent callers asking for the same key share the first caller's
//! outcome instead of repeating the work. The producer runs on its own task,
//! so a waiter going away never cancels work other waiters depend on.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing::debug;

/// Marker for the pathological case where a producer task dies without
/// publishing an outcome. Error types carried through the coalescer convert
/// from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aborted;

type Outcome<T, E> = Result<T, E>;

/// Single-flight map from key to the in-flight producer's outcome channel.
pub struct Coalescer<T, E> {
    inflight: Arc<Mutex<HashMap<String, broadcast::Sender<Outcome<T, E>>>>>,
}

impl<T, E> Default for Coalescer<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Coalescer<T, E> {
    pub fn new() -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of keys with an in-flight producer.
    pub fn pending(&self) -> usize {
        self.inflight.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.inflight
            .lock()
            .map(|m| m.contains_key(key))
            .unwrap_or(false)
    }

    /// Forget all in-flight entries (test hook; running producers finish but
    /// lose their followers).
    pub fn reset(&self) {
        if let Ok(mut inflight) = self.inflight.lock() {
            inflight.clear();
        }
    }
}

impl<T, E> Coalescer<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + From<Aborted> + 'static,
{
    /// Run `producer` for `key`, or wait on the producer a previous caller
    /// already started. Every caller observes the same outcome.
    pub async fn run<F>(&self, key: &str, producer: F) -> Outcome<T, E>
    where
        F: Future<Output = Outcome<T, E>> + Send + 'static,
    {
        let mut rx = {
            let Ok(mut inflight) = self.inflight.lock() else {
                // Lock poisoned: degrade to uncoalesced execution.
                return producer.await;
            };

            if let Some(tx) = inflight.get(key) {
                debug!(key, "joining in-flight request");
                tx.subscribe()
            } else {
                let (tx, rx) = broadcast::channel(1);
                inflight.insert(key.to_string(), tx.clone());

                let inflight = Arc::clone(&self.inflight);
                let key = key.to_string();
                tokio::spawn(async move {
                    let outcome = producer.await;
                    // Publish and deregister under one guard: joiners either
                    // find the in-flight entry and receive this send, or miss
                    // the entry entirely and start a fresh producer.
                    if let Ok(mut inflight) = inflight.lock() {
                        let _ = tx.send(outcome);
                        inflight.remove(&key);
                    }
                });
                rx
            }
        };

        match rx.recv().await {
            Ok(outcome) => outcome,
            Err(_) => Err(E::from(Aborted)),
        }
    }
}
