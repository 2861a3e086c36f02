// The snapshot registry: one writer view for read-write transactions, the
// current snapshot for everything started after the last reorganize commit,
// and per-session bindings for transactions that predate it.
//
// Session snapshots are always released outside the registry latch; the
// snapshot's own maps take their locks during release, and taking them
// under the latch would order locks both ways.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::common::{ObjectId, SessionId, Transaction, TransactionId};

use super::cache::ObjectCachePressure;
use super::snapshot::ObjectSnapshot;

struct SessionEntry {
    transaction_id: TransactionId,
    snapshot: Arc<ObjectSnapshot>,
}

struct Inner {
    read_write: Option<Arc<ObjectSnapshot>>,
    current: Option<Arc<ObjectSnapshot>>,
    sessions: HashMap<SessionId, SessionEntry>,
    /// Transaction id current at the last reorganize commit.
    last_reorganize: TransactionId,
}

pub struct SnapshotRegistry {
    latch: Mutex<Inner>,
    pressure: Arc<ObjectCachePressure>,
}

impl SnapshotRegistry {
    pub fn new() -> SnapshotRegistry {
        SnapshotRegistry {
            latch: Mutex::new(Inner {
                read_write: None,
                current: None,
                sessions: HashMap::new(),
                last_reorganize: 0,
            }),
            pressure: Arc::new(ObjectCachePressure::new()),
        }
    }

    pub fn pressure(&self) -> &Arc<ObjectCachePressure> {
        &self.pressure
    }

    pub fn last_reorganize(&self) -> TransactionId {
        self.latch.lock().last_reorganize
    }

    /// The snapshot `trans` reads the catalog through.
    pub fn get(&self, trans: &Transaction) -> Arc<ObjectSnapshot> {
        let mut to_release: Option<(Arc<ObjectSnapshot>, SessionId)> = None;
        let snapshot = {
            let mut inner = self.latch.lock();

            if trans.is_no_version() {
                // Read-write transactions share the one writer view.
                return inner
                    .read_write
                    .get_or_insert_with(|| {
                        ObjectSnapshot::create(true, self.pressure.clone())
                    })
                    .clone();
            }

            let session = trans.session_id();
            if inner.last_reorganize < trans.id() {
                // Started after the last reorganize commit: the current
                // snapshot serves.
                let current = match &inner.current {
                    Some(current) => current.clone(),
                    None => {
                        let created =
                            ObjectSnapshot::create(false, self.pressure.clone());
                        inner.current = Some(created.clone());
                        created
                    }
                };
                if let Some(entry) = inner.sessions.get(&session) {
                    if !Arc::ptr_eq(&entry.snapshot, &current) {
                        to_release = Some((entry.snapshot.clone(), session));
                    }
                }
                inner.sessions.insert(
                    session,
                    SessionEntry {
                        transaction_id: trans.id(),
                        snapshot: current.clone(),
                    },
                );
                current
            } else {
                // Predates the reorganize boundary: the session keeps its
                // bound snapshot while the transaction stays the same.
                match inner.sessions.get(&session) {
                    Some(entry) if entry.transaction_id == trans.id() => {
                        entry.snapshot.clone()
                    }
                    previous => {
                        // The snapshot bound at session start is stale and
                        // the current one may not match this transaction
                        // either; bind a fresh one.
                        if let Some(entry) = previous {
                            to_release = Some((entry.snapshot.clone(), session));
                        }
                        let fresh = ObjectSnapshot::create(false, self.pressure.clone());
                        inner.sessions.insert(
                            session,
                            SessionEntry {
                                transaction_id: trans.id(),
                                snapshot: fresh.clone(),
                            },
                        );
                        fresh
                    }
                }
            }
        };
        if let Some((stale, session)) = to_release {
            stale.release_session(session);
        }
        snapshot
    }

    /// Forget a session. The releases run outside the latch.
    pub fn erase(&self, session: SessionId) {
        let read_write = {
            let inner = self.latch.lock();
            inner.read_write.clone()
        };
        if let Some(snapshot) = read_write {
            snapshot.release_session(session);
        }

        let bound = {
            let mut inner = self.latch.lock();
            inner.sessions.remove(&session)
        };
        if let Some(entry) = bound {
            entry.snapshot.release_session(session);
        }
    }

    /// A reorganize commit happened: advance the boundary and drop the
    /// current snapshot, so later transactions build a fresh view.
    pub fn re_cache(&self, committed: TransactionId) {
        let mut inner = self.latch.lock();
        inner.last_reorganize = inner.last_reorganize.max(committed);
        inner.current = None;
        debug!(boundary = inner.last_reorganize, "catalog snapshots invalidated");
    }

    /// Drop the current snapshot without advancing the boundary.
    pub fn erase_current(&self) {
        self.latch.lock().current = None;
    }

    /// Remove a dropped database from every live snapshot.
    pub fn erase_database(&self, database: ObjectId) {
        let inner = self.latch.lock();
        if let Some(snapshot) = &inner.read_write {
            snapshot.erase_database(database);
        }
        for entry in inner.sessions.values() {
            entry.snapshot.erase_database(database);
        }
    }

    /// Remove a dropped table from the session-bound older snapshots; the
    /// writer view erases it when the drop persists.
    pub fn erase_table(&self, database: ObjectId, table: ObjectId) {
        let inner = self.latch.lock();
        for entry in inner.sessions.values() {
            entry.snapshot.erase_table(database, table);
        }
    }

    /// Remove a dropped index from the session-bound older snapshots.
    pub fn erase_index(&self, database: ObjectId, table: ObjectId, index: ObjectId) {
        let inner = self.latch.lock();
        for entry in inner.sessions.values() {
            entry.snapshot.erase_index(database, table, index);
        }
    }
}

impl Default for SnapshotRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::IsolationLevel;
    use crate::schema::object::{ObjectCategory, SchemaObject};

    fn versioned(id: TransactionId, session: SessionId) -> Transaction {
        Transaction::new(id, session, IsolationLevel::RepeatableRead, false)
    }

    fn read_write(id: TransactionId, session: SessionId) -> Transaction {
        Transaction::new(id, session, IsolationLevel::ReadCommitted, true)
    }

    #[test]
    fn read_write_transactions_share_one_view() {
        let registry = SnapshotRegistry::new();
        let a = registry.get(&read_write(1, 1));
        let b = registry.get(&read_write(2, 2));
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.is_no_version());
    }

    #[test]
    fn transactions_after_boundary_share_current() {
        let registry = SnapshotRegistry::new();
        let a = registry.get(&versioned(5, 1));
        let b = registry.get(&versioned(6, 2));
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!a.is_no_version());
    }

    #[test]
    fn reorganize_separates_old_and_new() {
        let registry = SnapshotRegistry::new();
        let old = registry.get(&versioned(5, 1));
        registry.re_cache(10);
        // A session whose transaction predates the boundary gets a fresh
        // private snapshot, not the stale current one.
        let old_again = registry.get(&versioned(7, 3));
        assert!(!Arc::ptr_eq(&old, &old_again));
        // Transactions after the boundary share a new current snapshot.
        let new_a = registry.get(&versioned(11, 4));
        let new_b = registry.get(&versioned(12, 5));
        assert!(Arc::ptr_eq(&new_a, &new_b));
        assert!(!Arc::ptr_eq(&new_a, &old));
    }

    #[test]
    fn same_session_same_transaction_reuses_binding() {
        let registry = SnapshotRegistry::new();
        registry.re_cache(100);
        let trans = versioned(50, 9);
        let first = registry.get(&trans);
        let second = registry.get(&trans);
        assert!(Arc::ptr_eq(&first, &second));
        // A new transaction on the same session rebinds.
        let third = registry.get(&versioned(60, 9));
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn erase_database_reaches_bound_snapshots() {
        let registry = SnapshotRegistry::new();
        let snapshot = registry.get(&versioned(5, 1));
        snapshot.add_database(SchemaObject::new(
            1,
            0,
            1,
            "main",
            ObjectCategory::Database,
        ));
        assert_eq!(snapshot.database_count(), 1);
        registry.erase_database(1);
        assert_eq!(snapshot.database_count(), 0);
    }

    #[test]
    fn erase_session_releases_without_deadlock() {
        let registry = SnapshotRegistry::new();
        let snapshot = registry.get(&versioned(5, 1));
        snapshot.add_database(SchemaObject::new(
            1,
            0,
            1,
            "main",
            ObjectCategory::Database,
        ));
        let _ = snapshot.get_database(1, 1);
        registry.erase(1);
        // The snapshot itself survives through our Arc; only the session
        // binding is gone.
        assert_eq!(snapshot.database_count(), 1);
    }
}
