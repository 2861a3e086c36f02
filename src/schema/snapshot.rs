// A consistent view of the catalog. Each snapshot carries its own object
// maps; sessions bind to a snapshot and are released from it individually,
// so an old snapshot lives exactly as long as its last session.

use dashmap::DashMap;
use std::sync::Arc;

use crate::common::{ObjectId, SessionId};

use super::cache::ObjectCachePressure;
use super::map::ObjectMap;
use super::object::{CatalogObject, SchemaObject};

/// One index with its key columns.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub object: SchemaObject,
    pub key_columns: Vec<ObjectId>,
}

impl CatalogObject for IndexEntry {
    fn object(&self) -> &SchemaObject {
        &self.object
    }
}

/// One table with its subordinate object maps.
pub struct TableEntry {
    pub object: SchemaObject,
    pub columns: ObjectMap<SchemaObject>,
    pub fields: ObjectMap<SchemaObject>,
    pub files: ObjectMap<SchemaObject>,
    pub indexes: ObjectMap<IndexEntry>,
    pub constraints: ObjectMap<SchemaObject>,
}

impl TableEntry {
    pub fn new(object: SchemaObject, pressure: &Arc<ObjectCachePressure>) -> TableEntry {
        TableEntry {
            object,
            columns: ObjectMap::with_pressure(pressure.clone()),
            fields: ObjectMap::with_pressure(pressure.clone()),
            files: ObjectMap::with_pressure(pressure.clone()),
            indexes: ObjectMap::with_pressure(pressure.clone()),
            constraints: ObjectMap::with_pressure(pressure.clone()),
        }
    }
}

impl CatalogObject for TableEntry {
    fn object(&self) -> &SchemaObject {
        &self.object
    }
}

/// One database with its tables and database-scoped objects.
pub struct DatabaseEntry {
    pub object: SchemaObject,
    pub tables: ObjectMap<TableEntry>,
    pub areas: ObjectMap<SchemaObject>,
    pub cascades: ObjectMap<SchemaObject>,
    pub partitions: ObjectMap<SchemaObject>,
    pub privileges: ObjectMap<SchemaObject>,
    pub functions: ObjectMap<SchemaObject>,
}

impl DatabaseEntry {
    pub fn new(object: SchemaObject, pressure: &Arc<ObjectCachePressure>) -> DatabaseEntry {
        DatabaseEntry {
            object,
            tables: ObjectMap::with_pressure(pressure.clone()),
            areas: ObjectMap::with_pressure(pressure.clone()),
            cascades: ObjectMap::with_pressure(pressure.clone()),
            partitions: ObjectMap::with_pressure(pressure.clone()),
            privileges: ObjectMap::with_pressure(pressure.clone()),
            functions: ObjectMap::with_pressure(pressure.clone()),
        }
    }
}

impl CatalogObject for DatabaseEntry {
    fn object(&self) -> &SchemaObject {
        &self.object
    }
}

/// A catalog snapshot.
pub struct ObjectSnapshot {
    no_version: bool,
    pressure: Arc<ObjectCachePressure>,
    databases: ObjectMap<DatabaseEntry>,
    /// Which sessions pulled which databases through this snapshot.
    session_use: DashMap<SessionId, Vec<ObjectId>>,
}

impl ObjectSnapshot {
    pub fn create(no_version: bool, pressure: Arc<ObjectCachePressure>) -> Arc<ObjectSnapshot> {
        Arc::new(ObjectSnapshot {
            no_version,
            databases: ObjectMap::with_pressure(pressure.clone()),
            pressure,
            session_use: DashMap::new(),
        })
    }

    pub fn is_no_version(&self) -> bool {
        self.no_version
    }

    pub fn pressure(&self) -> &Arc<ObjectCachePressure> {
        &self.pressure
    }

    pub fn add_database(&self, object: SchemaObject) -> Arc<DatabaseEntry> {
        let entry = Arc::new(DatabaseEntry::new(object, &self.pressure));
        self.databases.insert(entry.clone());
        entry
    }

    /// Resolve a database for a session, recording the use so a later
    /// session release can drop what it pulled in.
    pub fn get_database(
        &self,
        session: SessionId,
        database: ObjectId,
    ) -> Option<Arc<DatabaseEntry>> {
        let entry = self.databases.get(database)?;
        let mut used = self.session_use.entry(session).or_default();
        if !used.contains(&database) {
            used.push(database);
        }
        Some(entry)
    }

    pub fn get_database_by_name(&self, name: &str) -> Option<Arc<DatabaseEntry>> {
        self.databases.get_by_name(name)
    }

    /// Resolve a database without binding it to a session; recovery and
    /// invalidation paths use this.
    pub fn get_database_by_id(&self, database: ObjectId) -> Option<Arc<DatabaseEntry>> {
        self.databases.get(database)
    }

    pub fn database_count(&self) -> usize {
        self.databases.len()
    }

    /// Forget the session's pulls. Called while no registry latch is held.
    pub fn release_session(&self, session: SessionId) {
        self.session_use.remove(&session);
    }

    pub fn erase_database(&self, database: ObjectId) {
        self.databases.erase(database);
    }

    pub fn erase_table(&self, database: ObjectId, table: ObjectId) {
        if let Some(entry) = self.databases.get(database) {
            entry.tables.erase(table);
        }
    }

    pub fn erase_index(&self, database: ObjectId, table: ObjectId, index: ObjectId) {
        if let Some(entry) = self.databases.get(database) {
            if let Some(table) = entry.tables.get(table) {
                table.indexes.erase(index);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ObjectCategory;

    fn snapshot() -> Arc<ObjectSnapshot> {
        ObjectSnapshot::create(false, Arc::new(ObjectCachePressure::new()))
    }

    fn database_object(id: u64, name: &str) -> SchemaObject {
        SchemaObject::new(id, 0, id, name, ObjectCategory::Database)
    }

    #[test]
    fn database_and_table_resolution() {
        let snapshot = snapshot();
        let db = snapshot.add_database(database_object(1, "main"));
        let table = Arc::new(TableEntry::new(
            SchemaObject::new(10, 1, 1, "users", ObjectCategory::Table),
            snapshot.pressure(),
        ));
        db.tables.insert(table);

        let found = snapshot.get_database(7, 1).unwrap();
        assert_eq!(found.object().name, "main");
        assert!(found.tables.get_by_name("users").is_some());
        assert!(snapshot.get_database(7, 9).is_none());
    }

    #[test]
    fn erase_propagates_down() {
        let snapshot = snapshot();
        let db = snapshot.add_database(database_object(1, "main"));
        let table = Arc::new(TableEntry::new(
            SchemaObject::new(10, 1, 1, "users", ObjectCategory::Table),
            snapshot.pressure(),
        ));
        table.indexes.insert(Arc::new(IndexEntry {
            object: SchemaObject::new(20, 10, 1, "users_pk", ObjectCategory::Index),
            key_columns: vec![],
        }));
        db.tables.insert(table);

        snapshot.erase_index(1, 10, 20);
        assert!(snapshot
            .databases
            .get(1)
            .unwrap()
            .tables
            .get(10)
            .unwrap()
            .indexes
            .is_empty());

        snapshot.erase_table(1, 10);
        assert!(snapshot.databases.get(1).unwrap().tables.is_empty());

        snapshot.erase_database(1);
        assert_eq!(snapshot.database_count(), 0);
    }
}
