//! Mock sync executor for syncer tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::sync::{SyncExecutor, SyncReport};

/// Failure plan for one id.
#[derive(Debug, Clone, Copy)]
enum FailurePlan {
    Always,
    Times(u32),
}

/// Mock implementation of the [`SyncExecutor`] trait with per-id failure
/// plans, an optional artificial delay, and recorded attempts.
pub struct MockSyncExecutor {
    calls: Arc<RwLock<Vec<(i64, String)>>>,
    attempts: Arc<RwLock<HashMap<i64, u32>>>,
    failures: Arc<RwLock<HashMap<i64, FailurePlan>>>,
    delay: Arc<RwLock<Option<Duration>>>,
}

impl Default for MockSyncExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSyncExecutor {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(RwLock::new(Vec::new())),
            attempts: Arc::new(RwLock::new(HashMap::new())),
            failures: Arc::new(RwLock::new(HashMap::new())),
            delay: Arc::new(RwLock::new(None)),
        }
    }

    /// Fail every attempt for `id`.
    pub async fn fail_always(&self, id: i64) {
        self.failures.write().await.insert(id, FailurePlan::Always);
    }

    /// Fail the first `n` attempts for `id`, then succeed.
    pub async fn fail_times(&self, id: i64, n: u32) {
        self.failures.write().await.insert(id, FailurePlan::Times(n));
    }

    /// Delay every attempt, to widen concurrency windows in tests.
    pub async fn delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }

    pub async fn calls(&self) -> Vec<(i64, String)> {
        self.calls.read().await.clone()
    }
}

#[async_trait]
impl SyncExecutor for MockSyncExecutor {
    async fn sync_one(&self, id: i64, upstream_id: &str) -> SyncReport {
        if let Some(delay) = *self.delay.read().await {
            tokio::time::sleep(delay).await;
        }

        self.calls.write().await.push((id, upstream_id.to_string()));
        let attempt = {
            let mut attempts = self.attempts.write().await;
            let attempt = attempts.entry(id).or_insert(0);
            *attempt += 1;
            *attempt
        };

        let failed = match self.failures.read().await.get(&id) {
            Some(FailurePlan::Always) => true,
            Some(FailurePlan::Times(n)) => attempt <= *n,
            None => false,
        };

        if failed {
            SyncReport::failed(format!("injected failure for {id} (attempt {attempt})"))
        } else {
            SyncReport::success(Utc::now())
        }
    }
}
