// Lock names: (category, up to three parts) identifying the locked object
// within its parent, with the hash projection the lock manager keys on.

use serde::{Deserialize, Serialize};

use crate::common::ObjectId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockCategory {
    Unknown,
    Database,
    Table,
    Tuple,
    LogicalLog,
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockName {
    category: LockCategory,
    parts: [u32; 3],
}

impl LockName {
    pub fn database(db: ObjectId) -> LockName {
        LockName {
            category: LockCategory::Database,
            parts: [db as u32, 0, 0],
        }
    }

    pub fn table(db: ObjectId, table: ObjectId) -> LockName {
        LockName {
            category: LockCategory::Table,
            parts: [db as u32, table as u32, 0],
        }
    }

    pub fn tuple(db: ObjectId, table: ObjectId, tuple: u32) -> LockName {
        LockName {
            category: LockCategory::Tuple,
            parts: [db as u32, table as u32, tuple],
        }
    }

    pub fn logical_log(db: ObjectId) -> LockName {
        LockName {
            category: LockCategory::LogicalLog,
            parts: [db as u32, 0, 0],
        }
    }

    pub fn file(db: ObjectId, table: ObjectId, file: ObjectId) -> LockName {
        LockName {
            category: LockCategory::File,
            parts: [db as u32, table as u32, file as u32],
        }
    }

    pub fn category(&self) -> LockCategory {
        self.category
    }

    pub fn part(&self, index: usize) -> u32 {
        self.parts[index]
    }

    /// Name of the parent object.
    pub fn parent(&self) -> Option<LockName> {
        match self.category {
            LockCategory::Table | LockCategory::LogicalLog => {
                Some(LockName::database(self.parts[0] as ObjectId))
            }
            LockCategory::Tuple | LockCategory::File => Some(LockName::table(
                self.parts[0] as ObjectId,
                self.parts[1] as ObjectId,
            )),
            _ => None,
        }
    }

    /// Whether this object lies under `ancestor`.
    pub fn is_descendant(&self, ancestor: &LockName) -> bool {
        match ancestor.category {
            LockCategory::Database => {
                matches!(
                    self.category,
                    LockCategory::Table
                        | LockCategory::Tuple
                        | LockCategory::File
                        | LockCategory::LogicalLog
                ) && ancestor.parts[0] == self.parts[0]
            }
            LockCategory::Table => {
                matches!(self.category, LockCategory::Tuple | LockCategory::File)
                    && ancestor.parts[0] == self.parts[0]
                    && ancestor.parts[1] == self.parts[1]
            }
            _ => false,
        }
    }

    /// The lock manager's hash key: a per-category composition of the
    /// parts.
    pub fn value(&self) -> u32 {
        let [p0, p1, p2] = self.parts;
        match self.category {
            LockCategory::Database => p0,
            LockCategory::Table => (p0 << 8).wrapping_add(p1),
            LockCategory::Tuple => ((p0 << 4).wrapping_add(p1) << 16).wrapping_add(p2),
            LockCategory::LogicalLog => p0 << 12,
            LockCategory::File => ((p0 << 8).wrapping_add(p1) << 8).wrapping_add(p2),
            LockCategory::Unknown => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_compositions() {
        assert_eq!(LockName::database(7).value(), 7);
        assert_eq!(LockName::table(2, 3).value(), (2 << 8) + 3);
        assert_eq!(
            LockName::tuple(2, 3, 9).value(),
            (((2 << 4) + 3) << 16) + 9
        );
        assert_eq!(LockName::logical_log(5).value(), 5 << 12);
        assert_eq!(
            LockName::file(2, 3, 4).value(),
            (((2 << 8) + 3) << 8) + 4
        );
    }

    #[test]
    fn parent_chain() {
        let tuple = LockName::tuple(1, 2, 3);
        let table = tuple.parent().unwrap();
        assert_eq!(table, LockName::table(1, 2));
        let database = table.parent().unwrap();
        assert_eq!(database, LockName::database(1));
        assert!(database.parent().is_none());
        assert_eq!(
            LockName::logical_log(1).parent().unwrap(),
            LockName::database(1)
        );
    }

    #[test]
    fn descendants() {
        let database = LockName::database(1);
        let table = LockName::table(1, 2);
        let tuple = LockName::tuple(1, 2, 3);
        assert!(table.is_descendant(&database));
        assert!(tuple.is_descendant(&database));
        assert!(tuple.is_descendant(&table));
        assert!(!LockName::table(9, 2).is_descendant(&database));
        assert!(!database.is_descendant(&table));
    }
}
