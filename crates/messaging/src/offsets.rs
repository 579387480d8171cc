//! Commit watermark tracking for out-of-order completion.

use std::collections::BTreeSet;

use crate::Offset;

/// Tracks in-flight offsets of one partition.
///
/// Messages of different keys finish out of order, but a partition can only
/// be committed up to the first offset that is still being processed. The
/// tracker computes that watermark.
#[derive(Debug, Clone)]
pub struct OffsetTracker {
    in_flight: BTreeSet<Offset>,
    /// One past the highest offset handed out.
    fetched_until: Offset,
    committed: Offset,
}

impl OffsetTracker {
    /// Starts tracking at the group's committed offset.
    pub fn new(committed: Offset) -> Self {
        Self {
            in_flight: BTreeSet::new(),
            fetched_until: committed,
            committed,
        }
    }

    /// Registers a fetched message as in flight.
    pub fn track(&mut self, offset: Offset) {
        self.in_flight.insert(offset);
        if offset >= self.fetched_until {
            self.fetched_until = offset.next();
        }
    }

    /// Marks a message as done. Returns the new commit position if the
    /// watermark moved.
    pub fn complete(&mut self, offset: Offset) -> Option<Offset> {
        self.in_flight.remove(&offset);
        let watermark = self
            .in_flight
            .first()
            .copied()
            .unwrap_or(self.fetched_until);

        if watermark > self.committed {
            self.committed = watermark;
            Some(watermark)
        } else {
            None
        }
    }

    /// Number of messages fetched but not yet completed.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// The last commit position returned.
    pub fn committed(&self) -> Offset {
        self.committed
    }
}
