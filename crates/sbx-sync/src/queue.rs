//! Priority queue of pending sync operations.
//!
//! Dispatch order is `(100 - priority, enqueue_seq)` ascending — higher
//! priority drains first, ties break FIFO by enqueue order.

use sbx_core::types::SyncOperation;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Mutex;
use tokio::sync::Notify;

struct QueueEntry {
    priority: u8,
    seq: u64,
    op: SyncOperation,
}

impl QueueEntry {
    fn sort_key(&self) -> (u16, u64) {
        (100u16 - self.priority as u16, self.seq)
    }
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}
impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the smallest sort key (highest
        // priority, earliest enqueue) pops first.
        other.sort_key().cmp(&self.sort_key())
    }
}

/// Thread-safe priority queue feeding the sync worker.
pub struct SyncQueue {
    heap: Mutex<BinaryHeap<QueueEntry>>,
    next_seq: AtomicU64,
    notify: Notify,
}

impl Default for SyncQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncQueue {
    pub fn new() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            next_seq: AtomicU64::new(0),
            notify: Notify::new(),
        }
    }

    pub fn push(&self, op: SyncOperation, priority: u8) {
        let seq = self.next_seq.fetch_add(1, AtomicOrdering::Relaxed);
        self.heap.lock().unwrap().push(QueueEntry { priority, seq, op });
        self.notify.notify_one();
    }

    pub fn pop(&self) -> Option<SyncOperation> {
        self.heap.lock().unwrap().pop().map(|e| e.op)
    }

    pub fn len(&self) -> usize {
        self.heap.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.lock().unwrap().is_empty()
    }

    /// Wait until an item is pushed or `timeout` elapses, whichever first.
    pub async fn wait_for_item(&self, timeout: std::time::Duration) {
        if !self.is_empty() {
            return;
        }
        let _ = tokio::time::timeout(timeout, self.notify.notified()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sbx_core::types::VirtualPath;

    #[test]
    fn higher_priority_drains_first() {
        let q = SyncQueue::new();
        q.push(SyncOperation::Download(VirtualPath::new("/low")), 0);
        q.push(SyncOperation::Upload(VirtualPath::new("/high")), 2);
        q.push(SyncOperation::Upload(VirtualPath::new("/mid")), 1);

        assert_eq!(q.pop().unwrap().path().as_str(), "/high");
        assert_eq!(q.pop().unwrap().path().as_str(), "/mid");
        assert_eq!(q.pop().unwrap().path().as_str(), "/low");
    }

    #[test]
    fn equal_priority_is_fifo() {
        let q = SyncQueue::new();
        q.push(SyncOperation::Upload(VirtualPath::new("/first")), 1);
        q.push(SyncOperation::Upload(VirtualPath::new("/second")), 1);

        assert_eq!(q.pop().unwrap().path().as_str(), "/first");
        assert_eq!(q.pop().unwrap().path().as_str(), "/second");
    }

    #[test]
    fn empty_queue_pops_none() {
        let q = SyncQueue::new();
        assert!(q.pop().is_none());
    }
}
