// Registry of snapshot timestamps still in use by versioned readers.
// The version layer consults it to decide whether an overwrite must keep a
// pre-image, and how far the sync sweep may reclaim.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::common::TimeStamp;

#[derive(Debug, Default)]
pub struct ActiveSnapshots {
    // timestamp -> reader count
    readers: Mutex<BTreeMap<u64, usize>>,
}

impl ActiveSnapshots {
    pub fn new() -> Arc<ActiveSnapshots> {
        Arc::new(ActiveSnapshots::default())
    }

    /// Register a reader at `t`. The guard deregisters on drop.
    pub fn register(self: &Arc<Self>, t: TimeStamp) -> SnapshotGuard {
        *self.readers.lock().entry(t.0).or_insert(0) += 1;
        SnapshotGuard {
            snapshots: self.clone(),
            t,
        }
    }

    /// The oldest timestamp any reader still observes.
    pub fn oldest(&self) -> Option<TimeStamp> {
        self.readers
            .lock()
            .keys()
            .next()
            .copied()
            .map(TimeStamp)
    }

    /// True if some reader may still observe state older than `t`.
    pub fn observes_before(&self, t: TimeStamp) -> bool {
        match self.oldest() {
            Some(oldest) => oldest < t,
            None => false,
        }
    }

    /// True if some reader's snapshot is at or after `t`, i.e. the version
    /// stamped `t` is still observable.
    pub fn observes_at_or_after(&self, t: TimeStamp) -> bool {
        self.readers
            .lock()
            .keys()
            .next_back()
            .is_some_and(|&newest| TimeStamp(newest) >= t)
    }

    fn deregister(&self, t: TimeStamp) {
        let mut readers = self.readers.lock();
        if let Some(count) = readers.get_mut(&t.0) {
            *count -= 1;
            if *count == 0 {
                readers.remove(&t.0);
            }
        }
    }
}

pub struct SnapshotGuard {
    snapshots: Arc<ActiveSnapshots>,
    t: TimeStamp,
}

impl SnapshotGuard {
    pub fn timestamp(&self) -> TimeStamp {
        self.t
    }
}

impl Drop for SnapshotGuard {
    fn drop(&mut self) {
        self.snapshots.deregister(self.t);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oldest_follows_guards() {
        let snapshots = ActiveSnapshots::new();
        assert_eq!(snapshots.oldest(), None);
        let a = snapshots.register(TimeStamp(10));
        let b = snapshots.register(TimeStamp(5));
        assert_eq!(snapshots.oldest(), Some(TimeStamp(5)));
        drop(b);
        assert_eq!(snapshots.oldest(), Some(TimeStamp(10)));
        drop(a);
        assert_eq!(snapshots.oldest(), None);
    }
}
