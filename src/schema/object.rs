// Schema objects: the common identity every catalog entity carries.

use serde::{Deserialize, Serialize};

use crate::common::ObjectId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectCategory {
    Unknown,
    Database,
    Area,
    Table,
    Column,
    Field,
    File,
    Index,
    Constraint,
    Cascade,
    Partition,
    Privilege,
    Function,
}

/// Identity shared by every catalog entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaObject {
    pub id: ObjectId,
    pub parent: ObjectId,
    pub database: ObjectId,
    pub name: String,
    pub category: ObjectCategory,
}

impl SchemaObject {
    pub fn new(
        id: ObjectId,
        parent: ObjectId,
        database: ObjectId,
        name: impl Into<String>,
        category: ObjectCategory,
    ) -> SchemaObject {
        SchemaObject {
            id,
            parent,
            database,
            name: name.into(),
            category,
        }
    }
}

/// Lookup surface the object maps need.
pub trait CatalogObject {
    fn object(&self) -> &SchemaObject;

    fn id(&self) -> ObjectId {
        self.object().id
    }

    fn name(&self) -> &str {
        &self.object().name
    }
}

impl CatalogObject for SchemaObject {
    fn object(&self) -> &SchemaObject {
        self
    }
}
