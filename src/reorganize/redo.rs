// Redo and undo of logged DDL against a catalog snapshot. Redo reapplies a
// record forward; undo reverses it from the pre-image it carries. Replay
// runs the system-log records first, then the per-database ones, each in
// log order.

use std::sync::Arc;

use tracing::info;

use crate::error::{DbError, Result};
use crate::schema::{IndexEntry, ObjectCategory, ObjectSnapshot, SchemaObject, TableEntry};

use super::log::DdlLog;

/// Reapply one DDL record.
pub fn redo(snapshot: &ObjectSnapshot, record: &DdlLog) -> Result<()> {
    match record {
        DdlLog::CreateDatabase { id, name, .. } => {
            snapshot.add_database(SchemaObject::new(
                *id,
                0,
                *id,
                name.clone(),
                ObjectCategory::Database,
            ));
        }
        DdlLog::DropDatabase { id, .. } => {
            snapshot.erase_database(*id);
        }
        DdlLog::MoveDatabase { id, .. } => {
            // The catalog keys by id; the path change happened on disk.
            require_database(snapshot, *id)?;
        }
        DdlLog::CreateArea {
            database,
            id,
            name,
            ..
        } => {
            require_database(snapshot, *database)?.areas.insert(Arc::new(
                SchemaObject::new(*id, *database, *database, name.clone(), ObjectCategory::Area),
            ));
        }
        DdlLog::DropArea { database, id, .. } => {
            require_database(snapshot, *database)?.areas.erase(*id);
        }
        DdlLog::AlterArea { database, id, .. } => {
            let entry = require_database(snapshot, *database)?;
            if entry.areas.get(*id).is_none() {
                return Err(DbError::Recovery(format!("area {id} missing for redo")));
            }
        }
        DdlLog::CreateTable { database, id, name } => {
            let entry = require_database(snapshot, *database)?;
            entry.tables.insert(Arc::new(TableEntry::new(
                SchemaObject::new(*id, *database, *database, name.clone(), ObjectCategory::Table),
                snapshot.pressure(),
            )));
        }
        DdlLog::DropTable { database, id, .. } => {
            require_database(snapshot, *database)?.tables.erase(*id);
        }
        DdlLog::AlterTable {
            database,
            id,
            to_name,
            ..
        } => {
            let entry = require_database(snapshot, *database)?;
            let table = entry
                .tables
                .erase(*id)
                .ok_or_else(|| DbError::Recovery(format!("table {id} missing for redo")))?;
            // Keep the subordinate maps across the rename; the erased Arc
            // is uniquely held here.
            let mut table = Arc::try_unwrap(table).unwrap_or_else(|shared| {
                TableEntry::new(shared.object.clone(), snapshot.pressure())
            });
            table.object.name = to_name.clone();
            entry.tables.insert(Arc::new(table));
        }
        DdlLog::CreateIndex {
            database,
            table,
            id,
            name,
            key_columns,
        } => {
            require_table(snapshot, *database, *table)?
                .indexes
                .insert(Arc::new(IndexEntry {
                    object: SchemaObject::new(
                        *id,
                        *table,
                        *database,
                        name.clone(),
                        ObjectCategory::Index,
                    ),
                    key_columns: key_columns.clone(),
                }));
        }
        DdlLog::DropIndex {
            database,
            table,
            id,
            ..
        } => {
            require_table(snapshot, *database, *table)?.indexes.erase(*id);
        }
        DdlLog::AlterIndex {
            database,
            table,
            id,
            to_name,
            ..
        } => {
            let table_entry = require_table(snapshot, *database, *table)?;
            let index = table_entry
                .indexes
                .erase(*id)
                .ok_or_else(|| DbError::Recovery(format!("index {id} missing for redo")))?;
            let mut object = index.object.clone();
            object.name = to_name.clone();
            table_entry.indexes.insert(Arc::new(IndexEntry {
                object,
                key_columns: index.key_columns.clone(),
            }));
        }
    }
    Ok(())
}

/// Reverse one DDL record from its pre-image.
pub fn undo(snapshot: &ObjectSnapshot, record: &DdlLog) -> Result<()> {
    match record {
        DdlLog::CreateDatabase { id, .. } => {
            snapshot.erase_database(*id);
            Ok(())
        }
        DdlLog::DropDatabase { id, name, path } => redo(
            snapshot,
            &DdlLog::CreateDatabase {
                id: *id,
                name: name.clone(),
                path: path.clone(),
            },
        ),
        DdlLog::MoveDatabase { id, from, to } => redo(
            snapshot,
            &DdlLog::MoveDatabase {
                id: *id,
                from: to.clone(),
                to: from.clone(),
            },
        ),
        DdlLog::CreateArea { database, id, .. } => {
            require_database(snapshot, *database)?.areas.erase(*id);
            Ok(())
        }
        DdlLog::DropArea {
            database,
            id,
            name,
            path,
        } => redo(
            snapshot,
            &DdlLog::CreateArea {
                database: *database,
                id: *id,
                name: name.clone(),
                path: path.clone(),
            },
        ),
        DdlLog::AlterArea {
            database,
            id,
            from_path,
            to_path,
        } => redo(
            snapshot,
            &DdlLog::AlterArea {
                database: *database,
                id: *id,
                from_path: to_path.clone(),
                to_path: from_path.clone(),
            },
        ),
        DdlLog::CreateTable { database, id, .. } => {
            require_database(snapshot, *database)?.tables.erase(*id);
            Ok(())
        }
        DdlLog::DropTable { database, id, name } => redo(
            snapshot,
            &DdlLog::CreateTable {
                database: *database,
                id: *id,
                name: name.clone(),
            },
        ),
        DdlLog::AlterTable {
            database,
            id,
            from_name,
            to_name,
        } => redo(
            snapshot,
            &DdlLog::AlterTable {
                database: *database,
                id: *id,
                from_name: to_name.clone(),
                to_name: from_name.clone(),
            },
        ),
        DdlLog::CreateIndex {
            database,
            table,
            id,
            ..
        } => {
            require_table(snapshot, *database, *table)?.indexes.erase(*id);
            Ok(())
        }
        DdlLog::DropIndex {
            database,
            table,
            id,
            name,
            key_columns,
        } => redo(
            snapshot,
            &DdlLog::CreateIndex {
                database: *database,
                table: *table,
                id: *id,
                name: name.clone(),
                key_columns: key_columns.clone(),
            },
        ),
        DdlLog::AlterIndex {
            database,
            table,
            id,
            from_name,
            to_name,
        } => redo(
            snapshot,
            &DdlLog::AlterIndex {
                database: *database,
                table: *table,
                id: *id,
                from_name: to_name.clone(),
                to_name: from_name.clone(),
            },
        ),
    }
}

/// Replay recovery: every system-log record, then every database-log
/// record, each set in log order.
pub fn replay(
    snapshot: &ObjectSnapshot,
    system_log: &[DdlLog],
    database_log: &[DdlLog],
) -> Result<()> {
    for record in system_log {
        debug_assert!(record.is_system_log());
        redo(snapshot, record)?;
    }
    for record in database_log {
        debug_assert!(!record.is_system_log());
        redo(snapshot, record)?;
    }
    info!(
        system = system_log.len(),
        database = database_log.len(),
        "replayed DDL logs"
    );
    Ok(())
}

fn require_database(
    snapshot: &ObjectSnapshot,
    id: crate::common::ObjectId,
) -> Result<Arc<crate::schema::DatabaseEntry>> {
    snapshot
        .get_database_by_id(id)
        .ok_or_else(|| DbError::Recovery(format!("database {id} missing for redo")))
}

fn require_table(
    snapshot: &ObjectSnapshot,
    database: crate::common::ObjectId,
    table: crate::common::ObjectId,
) -> Result<Arc<TableEntry>> {
    require_database(snapshot, database)?
        .tables
        .get(table)
        .ok_or_else(|| DbError::Recovery(format!("table {table} missing for redo")))
}
