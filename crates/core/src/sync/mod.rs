//! Background synchronisation of upstream-sourced rows.
//!
//! A priority-queued in-process worker keeps imported rows fresh: a
//! scheduled tick seeds the queue from the store's stale rows, admin and
//! read paths enqueue individual rows, and a batch loop drains the queue
//! through the shared sync executor with bounded retries.

mod queue;
mod runner;
mod syncer;
mod types;

pub use queue::{QueueEntry, SyncQueue};
pub use runner::SyncRunner;
pub use syncer::Syncer;
pub use types::*;

use async_trait::async_trait;

/// Executes one sync. Shared by the service's synchronous refresh path and
/// the background worker; mocked in syncer tests.
#[async_trait]
pub trait SyncExecutor: Send + Sync {
    async fn sync_one(&self, id: i64, upstream_id: &str) -> SyncReport;
}
