// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Pending relation writes awaiting a flush.
//!
//! Flushing is two-phase: the store takes a [`snapshot`](OperationBatcher::snapshot),
//! awaits the provider, and only then calls
//! [`acknowledge`](OperationBatcher::acknowledge). Operations enqueued while
//! the write is in flight stay behind the acknowledged prefix.

use crate::domain::repository::RelationWriteOp;

#[derive(Debug)]
pub struct OperationBatcher {
    pending: Vec<RelationWriteOp>,
    batch_size: usize,
}

impl OperationBatcher {
    pub fn new(batch_size: usize) -> Self {
        Self {
            pending: Vec::new(),
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Queue an operation. Returns `true` once the queue has reached `batch_size`.
    pub fn enqueue(&mut self, op: RelationWriteOp) -> bool {
        self.pending.push(op);
        self.is_due()
    }

    pub fn is_due(&self) -> bool {
        self.pending.len() >= self.batch_size
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Copy of the queue, in enqueue order.
    pub fn snapshot(&self) -> Vec<RelationWriteOp> {
        self.pending.clone()
    }

    /// Drop the first `count` operations after they were durably written.
    pub fn acknowledge(&mut self, count: usize) {
        let count = count.min(self.pending.len());
        self.pending.drain(..count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pattern::{PatternId, PatternRelation};

    fn insert() -> RelationWriteOp {
        RelationWriteOp::Insert(PatternRelation::new(
            PatternId::new(),
            PatternId::new(),
            "uses",
            1.0,
        ))
    }

    #[test]
    fn test_due_at_threshold() {
        let mut batcher = OperationBatcher::new(3);
        assert!(!batcher.enqueue(insert()));
        assert!(!batcher.enqueue(insert()));
        assert!(batcher.enqueue(insert()));
        assert_eq!(batcher.len(), 3);
    }

    #[test]
    fn test_zero_batch_size_is_clamped() {
        let mut batcher = OperationBatcher::new(0);
        assert_eq!(batcher.batch_size(), 1);
        assert!(batcher.enqueue(insert()));
    }

    #[test]
    fn test_acknowledge_keeps_ops_enqueued_during_flush() {
        let mut batcher = OperationBatcher::new(10);
        batcher.enqueue(insert());
        batcher.enqueue(insert());
        let in_flight = batcher.snapshot();

        let late = insert();
        batcher.enqueue(late.clone());
        batcher.acknowledge(in_flight.len());

        assert_eq!(batcher.snapshot(), vec![late]);
    }

    #[test]
    fn test_unacknowledged_snapshot_leaves_queue_intact() {
        let mut batcher = OperationBatcher::new(10);
        batcher.enqueue(insert());
        let _ = batcher.snapshot();
        assert_eq!(batcher.len(), 1);
        batcher.acknowledge(5);
        assert!(batcher.is_empty());
    }
}
