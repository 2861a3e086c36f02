// DDL log records. Each carries what redo needs to reapply the operation
// and, for the destructive kinds, the pre-image undo consults.

use serde::{Deserialize, Serialize};

use crate::common::ObjectId;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum DdlLog {
    CreateDatabase {
        id: ObjectId,
        name: String,
        path: String,
    },
    DropDatabase {
        id: ObjectId,
        /// Pre-image for undo.
        name: String,
        path: String,
    },
    MoveDatabase {
        id: ObjectId,
        from: String,
        to: String,
    },
    CreateArea {
        database: ObjectId,
        id: ObjectId,
        name: String,
        path: String,
    },
    DropArea {
        database: ObjectId,
        id: ObjectId,
        name: String,
        path: String,
    },
    AlterArea {
        database: ObjectId,
        id: ObjectId,
        from_path: String,
        to_path: String,
    },
    CreateTable {
        database: ObjectId,
        id: ObjectId,
        name: String,
    },
    DropTable {
        database: ObjectId,
        id: ObjectId,
        /// Pre-image for undo.
        name: String,
    },
    AlterTable {
        database: ObjectId,
        id: ObjectId,
        from_name: String,
        to_name: String,
    },
    CreateIndex {
        database: ObjectId,
        table: ObjectId,
        id: ObjectId,
        name: String,
        key_columns: Vec<ObjectId>,
    },
    DropIndex {
        database: ObjectId,
        table: ObjectId,
        id: ObjectId,
        /// Pre-image for undo.
        name: String,
        key_columns: Vec<ObjectId>,
    },
    AlterIndex {
        database: ObjectId,
        table: ObjectId,
        id: ObjectId,
        from_name: String,
        to_name: String,
    },
}

impl DdlLog {
    /// Database-level records replay from the system log before any
    /// per-database log.
    pub fn is_system_log(&self) -> bool {
        matches!(
            self,
            DdlLog::CreateDatabase { .. }
                | DdlLog::DropDatabase { .. }
                | DdlLog::MoveDatabase { .. }
        )
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serde::encode_to_vec(
            self,
            bincode::config::standard(),
        )?)
    }

    pub fn decode(bytes: &[u8]) -> Result<DdlLog> {
        let (record, _) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
        Ok(record)
    }
}
