// The statement dispatch table. One row per SQL statement kind:
//
//   kind, executing module, transaction permission,
//   ok in read-only transaction?, ok on read-only database?,
//   ok on offline database?, ok on a slave database?,
//   logged in the database log?, logged in the system log?,
//   privilege category and bits.

use crate::error::{DbError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlKind {
    QueryExpression,
    Insert,
    BatchInsert,
    TemporaryInsert,
    Delete,
    TemporaryDelete,
    Update,
    TemporaryUpdate,
    ValueExpression,
    DatabaseDefinition,
    MoveDatabase,
    AlterDatabase,
    DropDatabase,
    AreaDefinition,
    AlterArea,
    DropArea,
    TableDefinition,
    TemporaryTableDefinition,
    AlterTable,
    DropTable,
    IndexDefinition,
    AlterIndex,
    DropIndex,
    Grant,
    Revoke,
    CascadeDefinition,
    AlterCascade,
    DropCascade,
    PartitionDefinition,
    AlterPartition,
    DropPartition,
    FunctionDefinition,
    DropFunction,
    Mount,
    Unmount,
    Verify,
    Checkpoint,
    Sync,
}

/// Module executing the statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Module {
    Executor,
    Schema,
    Admin,
}

/// Transaction envelope the statement runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Runs in whatever transaction is open.
    Any,
    /// Opens its own transaction when none is.
    Implicitly,
    /// Requires an explicit transaction.
    Explicitly,
    /// Must not run inside a transaction.
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tristate {
    True,
    False,
    /// Decided elsewhere; the check does not reject.
    Unknown,
}

impl Tristate {
    fn forbids(self) -> bool {
        self == Tristate::False
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrivilegeCategory {
    Reference,
    Data,
    Database,
    System,
    SuperUser,
}

/// Privilege bits within a category.
pub mod privilege {
    pub const SELECT: u32 = 0x1;
    pub const TEMPORARY_TABLE: u32 = 0x2;
    pub const INSERT: u32 = 0x1;
    pub const DELETE: u32 = 0x2;
    pub const UPDATE: u32 = 0x4;
    pub const CREATE_INDEX: u32 = 0x8;
    pub const CREATE_TABLE: u32 = 0x1;
    pub const CREATE_AREA: u32 = 0x2;
    pub const CREATE_CASCADE: u32 = 0x4;
    pub const CREATE_PARTITION: u32 = 0x8;
    pub const CREATE_FUNCTION: u32 = 0x10;
    pub const GRANT: u32 = 0x20;
    pub const ALTER_DATABASE: u32 = 0x1;
    pub const MOUNT: u32 = 0x2;
    pub const VERIFY: u32 = 0x4;
    pub const OPERATE: u32 = 0x8;
    pub const CREATE_DATABASE: u32 = 0x1;
}

#[derive(Debug, Clone, Copy)]
pub struct DispatchEntry {
    pub kind: SqlKind,
    pub module: Module,
    pub permission: Permission,
    pub ok_in_read_only_tx: bool,
    pub ok_on_read_only_db: Tristate,
    pub ok_on_offline_db: Tristate,
    pub ok_in_slave: bool,
    pub logged_in_db_log: bool,
    pub logged_in_system_log: bool,
    pub privilege_category: PrivilegeCategory,
    pub privilege_bits: u32,
}

impl DispatchEntry {
    /// An implicit distributed-transaction envelope is needed exactly for
    /// the data-modifying executor statements.
    pub fn is_xa_transaction_needed(&self) -> bool {
        self.module == Module::Executor && !self.ok_in_read_only_tx
    }
}

use self::privilege::*;
use self::Module as M;
use self::Permission as P;
use self::PrivilegeCategory as PC;
use self::Tristate::{False, True, Unknown};

const TABLE: &[DispatchEntry] = &[
    DispatchEntry {
        kind: SqlKind::QueryExpression,
        module: M::Executor,
        permission: P::Any,
        ok_in_read_only_tx: true,
        ok_on_read_only_db: True,
        ok_on_offline_db: False,
        ok_in_slave: true,
        logged_in_db_log: false,
        logged_in_system_log: false,
        privilege_category: PC::Reference,
        privilege_bits: SELECT,
    },
    DispatchEntry {
        kind: SqlKind::Insert,
        module: M::Executor,
        permission: P::Any,
        ok_in_read_only_tx: false,
        ok_on_read_only_db: Unknown,
        ok_on_offline_db: False,
        ok_in_slave: false,
        logged_in_db_log: true,
        logged_in_system_log: false,
        privilege_category: PC::Data,
        privilege_bits: INSERT,
    },
    DispatchEntry {
        kind: SqlKind::BatchInsert,
        module: M::Executor,
        permission: P::Any,
        ok_in_read_only_tx: false,
        ok_on_read_only_db: False,
        ok_on_offline_db: False,
        ok_in_slave: false,
        logged_in_db_log: false,
        logged_in_system_log: false,
        privilege_category: PC::Data,
        privilege_bits: INSERT,
    },
    DispatchEntry {
        kind: SqlKind::TemporaryInsert,
        module: M::Executor,
        permission: P::Any,
        ok_in_read_only_tx: false,
        ok_on_read_only_db: True,
        ok_on_offline_db: False,
        ok_in_slave: true,
        logged_in_db_log: false,
        logged_in_system_log: false,
        privilege_category: PC::Reference,
        privilege_bits: TEMPORARY_TABLE,
    },
    DispatchEntry {
        kind: SqlKind::Delete,
        module: M::Executor,
        permission: P::Any,
        ok_in_read_only_tx: false,
        ok_on_read_only_db: Unknown,
        ok_on_offline_db: False,
        ok_in_slave: false,
        logged_in_db_log: true,
        logged_in_system_log: false,
        privilege_category: PC::Data,
        privilege_bits: DELETE,
    },
    DispatchEntry {
        kind: SqlKind::TemporaryDelete,
        module: M::Executor,
        permission: P::Any,
        ok_in_read_only_tx: false,
        ok_on_read_only_db: True,
        ok_on_offline_db: False,
        ok_in_slave: true,
        logged_in_db_log: false,
        logged_in_system_log: false,
        privilege_category: PC::Reference,
        privilege_bits: TEMPORARY_TABLE,
    },
    DispatchEntry {
        kind: SqlKind::Update,
        module: M::Executor,
        permission: P::Any,
        ok_in_read_only_tx: false,
        ok_on_read_only_db: Unknown,
        ok_on_offline_db: False,
        ok_in_slave: false,
        logged_in_db_log: true,
        logged_in_system_log: false,
        privilege_category: PC::Data,
        privilege_bits: UPDATE,
    },
    DispatchEntry {
        kind: SqlKind::TemporaryUpdate,
        module: M::Executor,
        permission: P::Any,
        ok_in_read_only_tx: false,
        ok_on_read_only_db: True,
        ok_on_offline_db: False,
        ok_in_slave: true,
        logged_in_db_log: false,
        logged_in_system_log: false,
        privilege_category: PC::Reference,
        privilege_bits: TEMPORARY_TABLE,
    },
    DispatchEntry {
        kind: SqlKind::ValueExpression,
        module: M::Executor,
        permission: P::Any,
        ok_in_read_only_tx: true,
        ok_on_read_only_db: True,
        ok_on_offline_db: True,
        ok_in_slave: true,
        logged_in_db_log: false,
        logged_in_system_log: false,
        privilege_category: PC::Reference,
        privilege_bits: SELECT,
    },
    DispatchEntry {
        kind: SqlKind::DatabaseDefinition,
        module: M::Schema,
        permission: P::Implicitly,
        ok_in_read_only_tx: false,
        ok_on_read_only_db: Unknown,
        ok_on_offline_db: Unknown,
        ok_in_slave: false,
        logged_in_db_log: false,
        logged_in_system_log: true,
        privilege_category: PC::SuperUser,
        privilege_bits: CREATE_DATABASE,
    },
    DispatchEntry {
        kind: SqlKind::MoveDatabase,
        module: M::Schema,
        permission: P::Implicitly,
        ok_in_read_only_tx: false,
        ok_on_read_only_db: False,
        ok_on_offline_db: False,
        ok_in_slave: false,
        logged_in_db_log: false,
        logged_in_system_log: true,
        privilege_category: PC::System,
        privilege_bits: ALTER_DATABASE,
    },
    DispatchEntry {
        kind: SqlKind::AlterDatabase,
        module: M::Schema,
        permission: P::Implicitly,
        ok_in_read_only_tx: false,
        ok_on_read_only_db: True,
        ok_on_offline_db: True,
        ok_in_slave: true,
        logged_in_db_log: false,
        logged_in_system_log: true,
        privilege_category: PC::System,
        privilege_bits: ALTER_DATABASE,
    },
    DispatchEntry {
        kind: SqlKind::DropDatabase,
        module: M::Schema,
        permission: P::Implicitly,
        ok_in_read_only_tx: false,
        ok_on_read_only_db: False,
        ok_on_offline_db: True,
        ok_in_slave: false,
        logged_in_db_log: false,
        logged_in_system_log: true,
        privilege_category: PC::SuperUser,
        privilege_bits: CREATE_DATABASE,
    },
    DispatchEntry {
        kind: SqlKind::AreaDefinition,
        module: M::Schema,
        permission: P::Implicitly,
        ok_in_read_only_tx: false,
        ok_on_read_only_db: False,
        ok_on_offline_db: False,
        ok_in_slave: false,
        logged_in_db_log: true,
        logged_in_system_log: false,
        privilege_category: PC::Database,
        privilege_bits: CREATE_AREA,
    },
    DispatchEntry {
        kind: SqlKind::AlterArea,
        module: M::Schema,
        permission: P::Implicitly,
        ok_in_read_only_tx: false,
        ok_on_read_only_db: False,
        ok_on_offline_db: False,
        ok_in_slave: false,
        logged_in_db_log: true,
        logged_in_system_log: false,
        privilege_category: PC::Database,
        privilege_bits: CREATE_AREA,
    },
    DispatchEntry {
        kind: SqlKind::DropArea,
        module: M::Schema,
        permission: P::Implicitly,
        ok_in_read_only_tx: false,
        ok_on_read_only_db: False,
        ok_on_offline_db: False,
        ok_in_slave: false,
        logged_in_db_log: true,
        logged_in_system_log: false,
        privilege_category: PC::Database,
        privilege_bits: CREATE_AREA,
    },
    DispatchEntry {
        kind: SqlKind::TableDefinition,
        module: M::Schema,
        permission: P::Implicitly,
        ok_in_read_only_tx: false,
        ok_on_read_only_db: False,
        ok_on_offline_db: False,
        ok_in_slave: false,
        logged_in_db_log: true,
        logged_in_system_log: false,
        privilege_category: PC::Database,
        privilege_bits: CREATE_TABLE,
    },
    DispatchEntry {
        kind: SqlKind::TemporaryTableDefinition,
        module: M::Schema,
        permission: P::Any,
        ok_in_read_only_tx: false,
        ok_on_read_only_db: True,
        ok_on_offline_db: False,
        ok_in_slave: true,
        logged_in_db_log: false,
        logged_in_system_log: false,
        privilege_category: PC::Reference,
        privilege_bits: TEMPORARY_TABLE,
    },
    DispatchEntry {
        kind: SqlKind::AlterTable,
        module: M::Schema,
        permission: P::Implicitly,
        ok_in_read_only_tx: false,
        ok_on_read_only_db: False,
        ok_on_offline_db: False,
        ok_in_slave: false,
        logged_in_db_log: true,
        logged_in_system_log: false,
        privilege_category: PC::Database,
        privilege_bits: CREATE_TABLE,
    },
    DispatchEntry {
        kind: SqlKind::DropTable,
        module: M::Schema,
        permission: P::Implicitly,
        ok_in_read_only_tx: false,
        ok_on_read_only_db: False,
        ok_on_offline_db: False,
        ok_in_slave: false,
        logged_in_db_log: true,
        logged_in_system_log: false,
        privilege_category: PC::Database,
        privilege_bits: CREATE_TABLE,
    },
    DispatchEntry {
        kind: SqlKind::IndexDefinition,
        module: M::Schema,
        permission: P::Implicitly,
        ok_in_read_only_tx: false,
        ok_on_read_only_db: False,
        ok_on_offline_db: False,
        ok_in_slave: false,
        logged_in_db_log: true,
        logged_in_system_log: false,
        privilege_category: PC::Data,
        privilege_bits: CREATE_INDEX,
    },
    DispatchEntry {
        kind: SqlKind::AlterIndex,
        module: M::Schema,
        permission: P::Implicitly,
        ok_in_read_only_tx: false,
        ok_on_read_only_db: False,
        ok_on_offline_db: False,
        ok_in_slave: false,
        logged_in_db_log: true,
        logged_in_system_log: false,
        privilege_category: PC::Data,
        privilege_bits: CREATE_INDEX,
    },
    DispatchEntry {
        kind: SqlKind::DropIndex,
        module: M::Schema,
        permission: P::Implicitly,
        ok_in_read_only_tx: false,
        ok_on_read_only_db: False,
        ok_on_offline_db: False,
        ok_in_slave: false,
        logged_in_db_log: true,
        logged_in_system_log: false,
        privilege_category: PC::Data,
        privilege_bits: CREATE_INDEX,
    },
    DispatchEntry {
        kind: SqlKind::Grant,
        module: M::Schema,
        permission: P::Implicitly,
        ok_in_read_only_tx: false,
        ok_on_read_only_db: False,
        ok_on_offline_db: False,
        ok_in_slave: false,
        logged_in_db_log: true,
        logged_in_system_log: false,
        privilege_category: PC::Database,
        privilege_bits: GRANT,
    },
    DispatchEntry {
        kind: SqlKind::Revoke,
        module: M::Schema,
        permission: P::Implicitly,
        ok_in_read_only_tx: false,
        ok_on_read_only_db: False,
        ok_on_offline_db: False,
        ok_in_slave: false,
        logged_in_db_log: true,
        logged_in_system_log: false,
        privilege_category: PC::Database,
        privilege_bits: GRANT,
    },
    DispatchEntry {
        kind: SqlKind::CascadeDefinition,
        module: M::Schema,
        permission: P::Implicitly,
        ok_in_read_only_tx: false,
        ok_on_read_only_db: False,
        ok_on_offline_db: False,
        ok_in_slave: false,
        logged_in_db_log: true,
        logged_in_system_log: false,
        privilege_category: PC::Database,
        privilege_bits: CREATE_CASCADE,
    },
    DispatchEntry {
        kind: SqlKind::AlterCascade,
        module: M::Schema,
        permission: P::Implicitly,
        ok_in_read_only_tx: false,
        ok_on_read_only_db: False,
        ok_on_offline_db: False,
        ok_in_slave: false,
        logged_in_db_log: true,
        logged_in_system_log: false,
        privilege_category: PC::Database,
        privilege_bits: CREATE_CASCADE,
    },
    DispatchEntry {
        kind: SqlKind::DropCascade,
        module: M::Schema,
        permission: P::Implicitly,
        ok_in_read_only_tx: false,
        ok_on_read_only_db: False,
        ok_on_offline_db: False,
        ok_in_slave: false,
        logged_in_db_log: true,
        logged_in_system_log: false,
        privilege_category: PC::Database,
        privilege_bits: CREATE_CASCADE,
    },
    DispatchEntry {
        kind: SqlKind::PartitionDefinition,
        module: M::Schema,
        permission: P::Implicitly,
        ok_in_read_only_tx: false,
        ok_on_read_only_db: False,
        ok_on_offline_db: False,
        ok_in_slave: false,
        logged_in_db_log: true,
        logged_in_system_log: false,
        privilege_category: PC::Database,
        privilege_bits: CREATE_PARTITION,
    },
    DispatchEntry {
        kind: SqlKind::AlterPartition,
        module: M::Schema,
        permission: P::Implicitly,
        ok_in_read_only_tx: false,
        ok_on_read_only_db: False,
        ok_on_offline_db: False,
        ok_in_slave: false,
        logged_in_db_log: true,
        logged_in_system_log: false,
        privilege_category: PC::Database,
        privilege_bits: CREATE_PARTITION,
    },
    DispatchEntry {
        kind: SqlKind::DropPartition,
        module: M::Schema,
        permission: P::Implicitly,
        ok_in_read_only_tx: false,
        ok_on_read_only_db: False,
        ok_on_offline_db: False,
        ok_in_slave: false,
        logged_in_db_log: true,
        logged_in_system_log: false,
        privilege_category: PC::Database,
        privilege_bits: CREATE_PARTITION,
    },
    DispatchEntry {
        kind: SqlKind::FunctionDefinition,
        module: M::Schema,
        permission: P::Implicitly,
        ok_in_read_only_tx: false,
        ok_on_read_only_db: False,
        ok_on_offline_db: False,
        ok_in_slave: false,
        logged_in_db_log: true,
        logged_in_system_log: false,
        privilege_category: PC::Database,
        privilege_bits: CREATE_FUNCTION,
    },
    DispatchEntry {
        kind: SqlKind::DropFunction,
        module: M::Schema,
        permission: P::Implicitly,
        ok_in_read_only_tx: false,
        ok_on_read_only_db: False,
        ok_on_offline_db: False,
        ok_in_slave: false,
        logged_in_db_log: true,
        logged_in_system_log: false,
        privilege_category: PC::Database,
        privilege_bits: CREATE_FUNCTION,
    },
    DispatchEntry {
        kind: SqlKind::Mount,
        module: M::Admin,
        permission: P::Implicitly,
        ok_in_read_only_tx: false,
        ok_on_read_only_db: True,
        ok_on_offline_db: True,
        ok_in_slave: false,
        logged_in_db_log: false,
        logged_in_system_log: true,
        privilege_category: PC::System,
        privilege_bits: MOUNT,
    },
    DispatchEntry {
        kind: SqlKind::Unmount,
        module: M::Admin,
        permission: P::Implicitly,
        ok_in_read_only_tx: false,
        ok_on_read_only_db: True,
        ok_on_offline_db: True,
        ok_in_slave: false,
        logged_in_db_log: false,
        logged_in_system_log: true,
        privilege_category: PC::System,
        privilege_bits: MOUNT,
    },
    DispatchEntry {
        kind: SqlKind::Verify,
        module: M::Admin,
        permission: P::Any,
        ok_in_read_only_tx: true,
        ok_on_read_only_db: True,
        ok_on_offline_db: False,
        ok_in_slave: true,
        logged_in_db_log: false,
        logged_in_system_log: false,
        privilege_category: PC::System,
        privilege_bits: VERIFY,
    },
    DispatchEntry {
        kind: SqlKind::Checkpoint,
        module: M::Admin,
        permission: P::Never,
        ok_in_read_only_tx: true,
        ok_on_read_only_db: True,
        ok_on_offline_db: True,
        ok_in_slave: true,
        logged_in_db_log: false,
        logged_in_system_log: false,
        privilege_category: PC::System,
        privilege_bits: OPERATE,
    },
    DispatchEntry {
        kind: SqlKind::Sync,
        module: M::Admin,
        permission: P::Never,
        ok_in_read_only_tx: true,
        ok_on_read_only_db: True,
        ok_on_offline_db: True,
        ok_in_slave: true,
        logged_in_db_log: false,
        logged_in_system_log: false,
        privilege_category: PC::System,
        privilege_bits: OPERATE,
    },
];

/// Look up the dispatch row of a statement kind.
pub fn entry(kind: SqlKind) -> &'static DispatchEntry {
    TABLE
        .iter()
        .find(|e| e.kind == kind)
        .expect("every statement kind has a dispatch row")
}

/// The session's grants, per privilege category.
#[derive(Debug, Clone, Default)]
pub struct Privileges {
    grants: std::collections::HashMap<PrivilegeCategory, u32>,
}

impl Privileges {
    pub fn new() -> Privileges {
        Privileges::default()
    }

    /// All bits everywhere.
    pub fn superuser() -> Privileges {
        let mut privileges = Privileges::new();
        for category in [
            PrivilegeCategory::Reference,
            PrivilegeCategory::Data,
            PrivilegeCategory::Database,
            PrivilegeCategory::System,
            PrivilegeCategory::SuperUser,
        ] {
            privileges.grant(category, u32::MAX);
        }
        privileges
    }

    pub fn grant(&mut self, category: PrivilegeCategory, bits: u32) {
        *self.grants.entry(category).or_insert(0) |= bits;
    }

    pub fn revoke(&mut self, category: PrivilegeCategory, bits: u32) {
        if let Some(held) = self.grants.get_mut(&category) {
            *held &= !bits;
        }
    }

    pub fn has(&self, category: PrivilegeCategory, bits: u32) -> bool {
        self.grants
            .get(&category)
            .is_some_and(|held| held & bits == bits)
    }
}

/// The state the dispatch-time checks run against.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub in_read_only_transaction: bool,
    pub database_read_only: bool,
    pub database_offline: bool,
    pub is_slave: bool,
    pub privileges: Privileges,
}

/// The dispatch-time admission checks, in table order.
pub fn dispatch_check(entry: &DispatchEntry, context: &SessionContext) -> Result<()> {
    if context.in_read_only_transaction && !entry.ok_in_read_only_tx {
        return Err(DbError::PermissionDenied(
            "statement not executable inside a read-only transaction".into(),
        ));
    }
    if context.database_read_only && entry.ok_on_read_only_db.forbids() {
        return Err(DbError::PermissionDenied(
            "statement not executable on a read-only database".into(),
        ));
    }
    if context.database_offline && entry.ok_on_offline_db.forbids() {
        return Err(DbError::PermissionDenied(
            "statement not executable on an offline database".into(),
        ));
    }
    if context.is_slave && !entry.ok_in_slave {
        return Err(DbError::PermissionDenied(
            "statement not executable on a slave database".into(),
        ));
    }
    if !context
        .privileges
        .has(entry.privilege_category, entry.privilege_bits)
    {
        return Err(DbError::PermissionDenied(format!(
            "missing {:?} privilege",
            entry.privilege_category
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_row() {
        // The lookup panics if a row is missing; touch a spread of kinds.
        for kind in [
            SqlKind::QueryExpression,
            SqlKind::Insert,
            SqlKind::DropDatabase,
            SqlKind::AlterArea,
            SqlKind::Verify,
            SqlKind::Sync,
        ] {
            assert_eq!(entry(kind).kind, kind);
        }
    }

    #[test]
    fn xa_needed_only_for_writing_executor_statements() {
        assert!(entry(SqlKind::Insert).is_xa_transaction_needed());
        assert!(entry(SqlKind::Delete).is_xa_transaction_needed());
        assert!(entry(SqlKind::Update).is_xa_transaction_needed());
        assert!(!entry(SqlKind::QueryExpression).is_xa_transaction_needed());
        assert!(!entry(SqlKind::TableDefinition).is_xa_transaction_needed());
        assert!(!entry(SqlKind::Verify).is_xa_transaction_needed());
    }

    #[test]
    fn read_only_transaction_rejects_writes() {
        let mut context = SessionContext {
            in_read_only_transaction: true,
            privileges: Privileges::superuser(),
            ..SessionContext::default()
        };
        assert!(dispatch_check(entry(SqlKind::Insert), &context).is_err());
        assert!(dispatch_check(entry(SqlKind::QueryExpression), &context).is_ok());
        context.in_read_only_transaction = false;
        assert!(dispatch_check(entry(SqlKind::Insert), &context).is_ok());
    }

    #[test]
    fn read_only_database_respects_tristate() {
        let context = SessionContext {
            database_read_only: true,
            privileges: Privileges::superuser(),
            ..SessionContext::default()
        };
        // Explicit False rejects.
        assert!(dispatch_check(entry(SqlKind::TableDefinition), &context).is_err());
        // Unknown passes the check and is decided later.
        assert!(dispatch_check(entry(SqlKind::Insert), &context).is_ok());
        // Explicit True passes.
        assert!(dispatch_check(entry(SqlKind::AlterDatabase), &context).is_ok());
    }

    #[test]
    fn privileges_gate_dispatch() {
        let mut context = SessionContext::default();
        context.privileges.grant(PrivilegeCategory::Reference, privilege::SELECT);
        assert!(dispatch_check(entry(SqlKind::QueryExpression), &context).is_ok());
        assert!(dispatch_check(entry(SqlKind::Insert), &context).is_err());
        context.privileges.grant(PrivilegeCategory::Data, privilege::INSERT);
        assert!(dispatch_check(entry(SqlKind::Insert), &context).is_ok());
        context.privileges.revoke(PrivilegeCategory::Data, privilege::INSERT);
        assert!(dispatch_check(entry(SqlKind::Insert), &context).is_err());
    }

    #[test]
    fn ddl_logging_split() {
        // Database-level DDL goes to the system log, the rest to the
        // database log.
        assert!(entry(SqlKind::DatabaseDefinition).logged_in_system_log);
        assert!(!entry(SqlKind::DatabaseDefinition).logged_in_db_log);
        assert!(entry(SqlKind::TableDefinition).logged_in_db_log);
        assert!(!entry(SqlKind::TableDefinition).logged_in_system_log);
    }
}
