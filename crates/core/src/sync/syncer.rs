//! The background synchroniser: queue, worker loop and scheduled seeding.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::{QueueEntry, SyncExecutor, SyncQueue, SyncStatus};
use crate::metrics;
use crate::store::{ManhwaStore, SyncState};

/// Attempts beyond the first before an item is dropped.
const RETRY_LIMIT: u8 = 3;

/// Pause between batches while draining a non-empty queue.
const BATCH_PAUSE: Duration = Duration::from_secs(2);

/// Upper bound on rows seeded per scheduled tick.
const SEED_LIMIT: u32 = 100;

/// Age beyond which an upstream row counts as stale.
const STALE_AFTER_HOURS: i64 = 24;

/// Priority-queued background synchroniser.
pub struct Syncer {
    executor: Arc<dyn SyncExecutor>,
    store: Arc<dyn ManhwaStore>,
    queue: Mutex<SyncQueue>,
    processing: AtomicBool,
    running: AtomicBool,
    batch_size: usize,
    interval: Duration,
    shutdown_tx: broadcast::Sender<()>,
}

impl Syncer {
    pub fn new(
        executor: Arc<dyn SyncExecutor>,
        store: Arc<dyn ManhwaStore>,
        batch_size: usize,
        interval: Duration,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            executor,
            store,
            queue: Mutex::new(SyncQueue::new()),
            processing: AtomicBool::new(false),
            running: AtomicBool::new(false),
            batch_size: batch_size.max(1),
            interval,
            shutdown_tx,
        }
    }

    /// Queue one row. Duplicates of an already-queued id are dropped.
    pub fn enqueue(&self, id: i64, upstream_id: &str, priority: u8) -> bool {
        let Ok(mut queue) = self.queue.lock() else {
            metrics::SYNC_QUEUE_ERRORS.inc();
            return false;
        };
        let added = queue.push(id, upstream_id, priority);
        if added {
            debug!(id, priority, "queued for sync");
        }
        added
    }

    /// High-priority path: queue the row first in line and start draining if
    /// the worker is idle.
    pub fn sync_now(self: &Arc<Self>, id: i64, upstream_id: &str) {
        self.enqueue(id, upstream_id, 0);
        self.kick();
    }

    /// Start draining unless a worker is already at it.
    pub fn kick(self: &Arc<Self>) {
        if self.processing.load(Ordering::SeqCst) {
            return;
        }
        let syncer = Arc::clone(self);
        tokio::spawn(async move {
            syncer.process_queue().await;
        });
    }

    /// Seed the queue with stale upstream rows: previously failed rows run
    /// first, then the longest-unsynced.
    pub fn queue_outdated(&self) {
        let threshold = Utc::now() - chrono::Duration::hours(STALE_AFTER_HOURS);
        let rows = match self.store.list_outdated(threshold, SEED_LIMIT) {
            Ok(rows) => rows,
            Err(e) => {
                error!("failed to seed sync queue: {}", e);
                metrics::SYNC_QUEUE_ERRORS.inc();
                return;
            }
        };

        let mut queued = 0usize;
        for row in rows {
            let priority = if row.sync_status == SyncState::Failed {
                0
            } else {
                1
            };
            if self.enqueue(row.id, &row.upstream_id, priority) {
                queued += 1;
            }
        }
        if queued > 0 {
            info!(queued, "seeded sync queue from stale rows");
        }
    }

    /// Drain the queue in concurrent batches. Re-entrant calls return
    /// immediately; so does a call against an empty queue.
    pub async fn process_queue(self: &Arc<Self>) {
        if self.queue_len() == 0 {
            return;
        }
        if self.processing.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            let batch = {
                let Ok(mut queue) = self.queue.lock() else {
                    metrics::SYNC_QUEUE_ERRORS.inc();
                    break;
                };
                queue.pop_batch(self.batch_size)
            };
            if batch.is_empty() {
                break;
            }

            debug!(batch = batch.len(), "processing sync batch");
            let reports = join_all(batch.into_iter().map(|entry| {
                let executor = Arc::clone(&self.executor);
                async move {
                    let report = executor.sync_one(entry.id, &entry.upstream_id).await;
                    (entry, report)
                }
            }))
            .await;

            for (entry, report) in reports {
                if !report.is_success() {
                    self.handle_failure(entry, &report.message);
                }
            }

            if self.queue_len() == 0 {
                break;
            }
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("sync worker stopping mid-drain");
                    break;
                }
                _ = tokio::time::sleep(BATCH_PAUSE) => {}
            }
        }

        self.processing.store(false, Ordering::SeqCst);
    }

    fn handle_failure(&self, entry: QueueEntry, message: &str) {
        if entry.retries < RETRY_LIMIT {
            let entry = entry.retried();
            warn!(
                id = entry.id,
                attempt = entry.retries,
                priority = entry.priority,
                "sync attempt failed, requeueing"
            );
            metrics::SYNC_RETRIES.inc();
            if let Ok(mut queue) = self.queue.lock() {
                queue.push_entry(entry);
            } else {
                metrics::SYNC_QUEUE_ERRORS.inc();
            }
        } else {
            error!(
                id = entry.id,
                error = message,
                "sync failed after {} attempts, dropping",
                entry.retries + 1
            );
        }
    }

    /// Start the scheduled seeding loop.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("syncer already running");
            return;
        }
        info!(interval_secs = self.interval.as_secs(), "starting syncer");

        let syncer = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("syncer schedule loop stopped");
                        break;
                    }
                    _ = tokio::time::sleep(syncer.interval) => {
                        if !syncer.running.load(Ordering::SeqCst) {
                            break;
                        }
                        syncer.queue_outdated();
                        syncer.process_queue().await;
                    }
                }
            }
        });
    }

    /// Stop the schedule loop and any mid-drain pause.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("stopping syncer");
        let _ = self.shutdown_tx.send(());
    }

    pub fn status(&self) -> SyncStatus {
        let (queue_length, items) = self
            .queue
            .lock()
            .map(|queue| (queue.len(), queue.snapshot()))
            .unwrap_or_default();
        SyncStatus {
            queue_length,
            is_processing: self.processing.load(Ordering::SeqCst),
            items,
        }
    }

    fn queue_len(&self) -> usize {
        self.queue.lock().map(|queue| queue.len()).unwrap_or(0)
    }
}
