// The adequacy matrix: which lock, at which duration, a transaction takes
// on an object of one category while manipulating an object of another.
// Rollbacking transactions never lock. Versioned read-only transactions use
// their own table whose modes are version-compatible.

use crate::common::{IsolationLevel, Transaction, TransactionStatus};

use super::duration::LockDuration;
use super::mode::LockMode;
use super::name::LockCategory;

/// What the statement is about to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldOperation {
    Drop,
    MoveDatabase,
    ReadForWrite,
    ReadForImport,
    ReadOnly,
    ReadWrite,
}

/// What is being locked, before projection onto a lock category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldTarget {
    MetaDatabase,
    MetaTable,
    MetaTuple,
    Database,
    Table,
    Tuple,
    LogicalLog,
}

impl HoldTarget {
    pub fn category(self) -> LockCategory {
        match self {
            HoldTarget::MetaDatabase | HoldTarget::Database => LockCategory::Database,
            HoldTarget::MetaTable | HoldTarget::Table => LockCategory::Table,
            HoldTarget::MetaTuple | HoldTarget::Tuple => LockCategory::Tuple,
            HoldTarget::LogicalLog => LockCategory::LogicalLog,
        }
    }
}

type Row = [(LockMode, LockDuration); 5];

const N_ROW: Row = [(LockMode::N, LockDuration::Instant); 5];

fn locked_index(category: LockCategory) -> usize {
    match category {
        LockCategory::Unknown | LockCategory::File => 0,
        LockCategory::Database => 1,
        LockCategory::Table => 2,
        LockCategory::Tuple => 3,
        LockCategory::LogicalLog => 4,
    }
}

/// One row of the matrix: the lock per locked category, given operation,
/// manipulated category, and isolation level.
fn row(
    operation: HoldOperation,
    manipulate: LockCategory,
    isolation: IsolationLevel,
) -> Row {
    use HoldOperation as Op;
    use IsolationLevel as Iso;
    use LockCategory as Cat;
    use LockDuration::{Cursor, Middle, Statement};
    use LockMode::*;

    if isolation == Iso::Unknown {
        return N_ROW;
    }
    let n = (N, LockDuration::Instant);

    match (operation, manipulate) {
        (Op::Drop, Cat::Database) => [n, (VX, Middle), n, n, (IX, Statement)],
        (Op::Drop, Cat::Table) => [n, (VIX, Middle), (VX, Middle), n, (IX, Statement)],
        (Op::Drop, Cat::Tuple) => {
            [n, (VIX, Middle), (VIX, Middle), (VX, Middle), (IX, Statement)]
        }
        (Op::Drop, Cat::LogicalLog) => [n, n, n, n, (X, Statement)],
        (Op::Drop, _) => [n, n, n, n, (IX, Statement)],

        (Op::MoveDatabase, Cat::Database) => [n, (VX, Middle), n, n, (IX, Statement)],
        (Op::MoveDatabase, Cat::Table) => {
            [n, (VIX, Middle), (SVIX, Middle), n, (IX, Statement)]
        }
        (Op::MoveDatabase, Cat::Tuple) => {
            [n, (VIX, Middle), (VIX, Middle), (VX, Middle), (IX, Statement)]
        }
        (Op::MoveDatabase, Cat::LogicalLog) => [n, n, n, n, (X, Statement)],
        (Op::MoveDatabase, _) => [n, n, n, n, (IX, Statement)],

        (Op::ReadForWrite, Cat::Database) => [n, (X, Middle), n, n, (IX, Statement)],
        (Op::ReadForWrite, Cat::Table) => {
            [n, (IX, Middle), (X, Middle), n, (IX, Statement)]
        }
        (Op::ReadForWrite, Cat::Tuple) => {
            [n, (IX, Middle), (IX, Middle), (U, Middle), (IX, Statement)]
        }
        (Op::ReadForWrite, Cat::LogicalLog) => [n, n, n, n, (X, Statement)],
        (Op::ReadForWrite, _) => [n, n, n, n, (IX, Statement)],

        (Op::ReadForImport, Cat::Database) => match isolation {
            Iso::ReadUncommitted => [n, n, n, n, (IS, Statement)],
            _ => [n, (S, Cursor), n, n, (IS, Statement)],
        },
        (Op::ReadForImport, Cat::Table) => match isolation {
            Iso::ReadUncommitted => [n, (IS, Middle), n, n, (IS, Statement)],
            _ => [n, (IS, Middle), (S, Cursor), n, (IS, Statement)],
        },
        (Op::ReadForImport, Cat::Tuple) => match isolation {
            Iso::ReadUncommitted => [n, (IS, Middle), (IS, Middle), n, (IS, Statement)],
            _ => [n, (IS, Middle), (IS, Middle), (S, Cursor), (IS, Statement)],
        },
        (Op::ReadForImport, Cat::LogicalLog) => [n, n, n, n, (S, Statement)],
        (Op::ReadForImport, _) => [n, n, n, n, (IS, Statement)],

        // Versioned read-only: version-compatible modes, statement-length
        // at read-committed, transaction-length above.
        (Op::ReadOnly, Cat::Database) => match isolation {
            Iso::ReadUncommitted => [n, n, n, n, (IS, Statement)],
            Iso::ReadCommitted => [n, (VS, Statement), n, n, (IS, Statement)],
            _ => [n, (VS, Middle), n, n, (IS, Statement)],
        },
        (Op::ReadOnly, Cat::Table) => match isolation {
            Iso::ReadUncommitted => [n, n, n, n, (IS, Statement)],
            Iso::ReadCommitted => {
                [n, (VIS, Statement), (VS, Statement), n, (IS, Statement)]
            }
            _ => [n, (VIS, Middle), (VS, Middle), n, (IS, Statement)],
        },
        (Op::ReadOnly, Cat::Tuple) => match isolation {
            Iso::ReadUncommitted => [n, n, n, n, (IS, Statement)],
            Iso::ReadCommitted => [
                n,
                (VIS, Statement),
                (VIS, Statement),
                (VS, Statement),
                (IS, Statement),
            ],
            _ => [n, (VIS, Middle), (VIS, Middle), (VS, Middle), (IS, Statement)],
        },
        (Op::ReadOnly, Cat::LogicalLog) => [n, n, n, n, (S, Statement)],
        (Op::ReadOnly, _) => [n, n, n, n, (IS, Statement)],

        (Op::ReadWrite, Cat::Database) => [n, (X, Middle), n, n, (IX, Statement)],
        (Op::ReadWrite, Cat::Table) => match isolation {
            Iso::Serializable => [n, (SIX, Middle), (X, Middle), n, (IX, Statement)],
            _ => [n, (IX, Middle), (X, Middle), n, (IX, Statement)],
        },
        (Op::ReadWrite, Cat::Tuple) => match isolation {
            Iso::Serializable => {
                [n, (IX, Middle), (SIX, Middle), (X, Middle), (IX, Statement)]
            }
            _ => [n, (IX, Middle), (IX, Middle), (X, Middle), (IX, Statement)],
        },
        (Op::ReadWrite, Cat::LogicalLog) => [n, n, n, n, (X, Statement)],
        (Op::ReadWrite, _) => [n, n, n, n, (IX, Statement)],
    }
}

/// The adequate (mode, duration) for `trans` locking an object of category
/// `locked` while manipulating an object of category `manipulate` under
/// `operation`. `(N, Instant)` means no lock is needed; rollbacking
/// transactions and the `Unknown` isolation rows both land there without
/// erroring.
pub fn adequate_lock(
    trans: &Transaction,
    locked: LockCategory,
    manipulate: LockCategory,
    operation: HoldOperation,
) -> (LockMode, LockDuration) {
    if trans.status() == TransactionStatus::Rollbacking {
        return (LockMode::N, LockDuration::Instant);
    }

    let operation = match operation {
        // Versioned transactions import through the read-only table.
        HoldOperation::ReadForImport if !trans.is_no_version() => HoldOperation::ReadOnly,
        // A read-only operation without versioning behaves like an import
        // read: shared current locks instead of version ones.
        HoldOperation::ReadOnly if trans.is_no_version() => HoldOperation::ReadForImport,
        other => other,
    };

    row(operation, manipulate, trans.isolation())[locked_index(locked)]
}

/// Lock decision for `hold`: `None` when no lock is needed.
pub fn hold_decision(
    trans: &Transaction,
    target: HoldTarget,
    manipulate: LockCategory,
    operation: HoldOperation,
) -> Option<(LockMode, LockDuration)> {
    let (mode, duration) = adequate_lock(trans, target.category(), manipulate, operation);
    mode.is_need_lock().then_some((mode, duration))
}

/// Conversion decision: the (from, to) pair when both sides need a lock and
/// either the mode or the duration changes.
#[allow(clippy::type_complexity)]
pub fn convert_decision(
    trans: &Transaction,
    target: HoldTarget,
    manipulate_from: LockCategory,
    operation_from: HoldOperation,
    manipulate_to: LockCategory,
    operation_to: HoldOperation,
) -> Option<((LockMode, LockDuration), (LockMode, LockDuration))> {
    let from = hold_decision(trans, target, manipulate_from, operation_from)?;
    let to = hold_decision(trans, target, manipulate_to, operation_to)?;
    (from != to).then_some((from, to))
}

/// Release decision: locks actually release early only at cursor or user
/// duration; everything else waits for transaction end.
pub fn release_decision(
    trans: &Transaction,
    target: HoldTarget,
    manipulate: LockCategory,
    operation: HoldOperation,
) -> Option<(LockMode, LockDuration)> {
    let (mode, duration) = hold_decision(trans, target, manipulate, operation)?;
    duration.is_explicitly_releasable().then_some((mode, duration))
}
