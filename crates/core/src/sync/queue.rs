//! In-memory priority queue for sync work.
//!
//! Lower priority runs sooner; ties fall back to enqueue order. An id can
//! be queued at most once at a time.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use super::QueueItem;

/// Priority ceiling for retry decay.
pub const MAX_PRIORITY: u8 = 10;

/// One piece of queued sync work.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub id: i64,
    pub upstream_id: String,
    pub priority: u8,
    pub retries: u8,
    seq: u64,
}

impl QueueEntry {
    /// Decay for a retry: one priority step down, clamped.
    pub fn retried(mut self) -> Self {
        self.retries += 1;
        self.priority = (self.priority + 1).min(MAX_PRIORITY);
        self
    }
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; invert to pop the lowest priority value
        // (and the earliest seq within it) first.
        (other.priority, other.seq).cmp(&(self.priority, self.seq))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The queue proper. Not synchronised; the syncer holds it in a mutex.
#[derive(Debug, Default)]
pub struct SyncQueue {
    heap: BinaryHeap<QueueEntry>,
    queued_ids: HashSet<i64>,
    next_seq: u64,
}

impl SyncQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue new work. Returns false when the id is already queued.
    pub fn push(&mut self, id: i64, upstream_id: impl Into<String>, priority: u8) -> bool {
        self.push_entry(QueueEntry {
            id,
            upstream_id: upstream_id.into(),
            priority,
            retries: 0,
            seq: 0,
        })
    }

    /// Re-enqueue an entry (retry path keeps its retry counter). Returns
    /// false on duplicate id.
    pub fn push_entry(&mut self, mut entry: QueueEntry) -> bool {
        if !self.queued_ids.insert(entry.id) {
            return false;
        }
        entry.seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(entry);
        true
    }

    pub fn pop(&mut self) -> Option<QueueEntry> {
        let entry = self.heap.pop()?;
        self.queued_ids.remove(&entry.id);
        Some(entry)
    }

    pub fn pop_batch(&mut self, n: usize) -> Vec<QueueEntry> {
        let mut batch = Vec::with_capacity(n);
        while batch.len() < n {
            match self.pop() {
                Some(entry) => batch.push(entry),
                None => break,
            }
        }
        batch
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Queue contents in pop order, for `Status()`.
    pub fn snapshot(&self) -> Vec<QueueItem> {
        let mut entries: Vec<&QueueEntry> = self.heap.iter().collect();
        entries.sort_by_key(|entry| (entry.priority, entry.seq));
        entries
            .into_iter()
            .map(|entry| QueueItem {
                id: entry.id,
                priority: entry.priority,
                retries: entry.retries,
            })
            .collect()
    }
}
