//! Types for the background synchroniser.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    Success,
    Failed,
}

/// Report returned by a sync attempt. Failures carry the normalised reason;
/// the row's failed state has already been written back when one arrives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub status: SyncOutcome,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl SyncReport {
    pub fn success(last_synced_at: DateTime<Utc>) -> Self {
        Self {
            status: SyncOutcome::Success,
            message: "synchronised".to_string(),
            last_synced_at: Some(last_synced_at),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: SyncOutcome::Failed,
            message: message.into(),
            last_synced_at: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == SyncOutcome::Success
    }
}

/// One queue entry as exposed by `Status()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: i64,
    pub priority: u8,
    pub retries: u8,
}

/// Snapshot of the synchroniser.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub queue_length: usize,
    pub is_processing: bool,
    pub items: Vec<QueueItem>,
}
