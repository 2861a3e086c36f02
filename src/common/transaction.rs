// Thin transaction descriptor.
//
// The execution engine above this crate owns transaction lifecycle; the
// storage core only needs the identity, isolation, versioning choice,
// status, snapshot timestamp, and cancel flag of the transaction driving an
// operation.

use parking_lot::Mutex;

use crate::error::Result;

use super::cancel::CancelFlag;
use super::timestamp::TimeStamp;
use super::{SessionId, TransactionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IsolationLevel {
    Unknown,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    InProgress,
    Preparing,
    Committing,
    Rollbacking,
}

#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    session: SessionId,
    isolation: IsolationLevel,
    /// True for read-write transactions, which read the current state and
    /// never consult the version log.
    no_version: bool,
    status: Mutex<TransactionStatus>,
    snapshot: Option<TimeStamp>,
    cancel: CancelFlag,
}

impl Transaction {
    pub fn new(
        id: TransactionId,
        session: SessionId,
        isolation: IsolationLevel,
        no_version: bool,
    ) -> Transaction {
        let snapshot = if no_version {
            None
        } else {
            Some(TimeStamp::assign())
        };
        Transaction {
            id,
            session,
            isolation,
            no_version,
            status: Mutex::new(TransactionStatus::InProgress),
            snapshot,
            cancel: CancelFlag::new(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn session_id(&self) -> SessionId {
        self.session
    }

    pub fn isolation(&self) -> IsolationLevel {
        self.isolation
    }

    pub fn is_no_version(&self) -> bool {
        self.no_version
    }

    /// Snapshot timestamp of a versioned transaction.
    pub fn snapshot(&self) -> Option<TimeStamp> {
        self.snapshot
    }

    pub fn status(&self) -> TransactionStatus {
        *self.status.lock()
    }

    pub fn set_status(&self, status: TransactionStatus) {
        *self.status.lock() = status;
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    pub fn check_cancel(&self) -> Result<()> {
        self.cancel.check()
    }
}
