// Name and path reservations taken while a DDL statement prepares. A
// conflicting reservation fails fast, before any on-disk state is examined;
// the guards withdraw the reservation on scope exit, so error paths clean
// up without bookkeeping.

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::common::ObjectId;
use crate::error::{DbError, Result};

use super::object::ObjectCategory;

/// Object names stay below this; a longer one would overflow the platform
/// path limit once it becomes a directory name.
const MAX_NAME_LENGTH: usize = 50;

/// Path reservations stay below this for the same reason.
const MAX_PATH_LENGTH: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
struct ReservedName {
    category: ObjectCategory,
    parent: ObjectId,
    database: ObjectId,
    name: String,
}

#[derive(Debug, Default)]
struct Inner {
    names: Vec<ReservedName>,
    paths: Vec<PathBuf>,
}

/// The reservation table, shared by every concurrent DDL preparation.
#[derive(Debug, Default)]
pub struct Reservations {
    inner: Arc<Mutex<Inner>>,
}

impl Reservations {
    pub fn new() -> Reservations {
        Reservations::default()
    }

    /// Reserve `(category, parent, name)` within a database. Fails with
    /// `AlreadyExists` when the same-category same-name tuple is taken.
    pub fn reserve_name(
        &self,
        category: ObjectCategory,
        parent: ObjectId,
        database: ObjectId,
        name: &str,
    ) -> Result<NameWithdraw> {
        if name.is_empty() || name.chars().count() > MAX_NAME_LENGTH {
            return Err(DbError::InvalidArgument(format!(
                "object name length {} out of range",
                name.chars().count()
            )));
        }
        let reserved = ReservedName {
            category,
            parent,
            database,
            name: name.to_string(),
        };
        let mut inner = self.inner.lock();
        if inner.names.contains(&reserved) {
            return Err(DbError::AlreadyExists(format!(
                "{category:?} '{name}' is being created"
            )));
        }
        inner.names.push(reserved.clone());
        Ok(NameWithdraw {
            inner: self.inner.clone(),
            reserved,
            armed: true,
        })
    }

    /// Reserve a directory tree. Fails when the path overlaps a reserved
    /// one in either direction.
    pub fn reserve_path(&self, path: &Path) -> Result<PathWithdraw> {
        if path.as_os_str().len() > MAX_PATH_LENGTH {
            return Err(DbError::InvalidArgument(format!(
                "path length {} out of range",
                path.as_os_str().len()
            )));
        }
        let mut inner = self.inner.lock();
        for existing in &inner.paths {
            if existing.starts_with(path) || path.starts_with(existing) {
                return Err(DbError::AlreadyExists(format!(
                    "path '{}' conflicts with a reserved tree",
                    path.display()
                )));
            }
        }
        inner.paths.push(path.to_path_buf());
        Ok(PathWithdraw {
            inner: self.inner.clone(),
            path: path.to_path_buf(),
            armed: true,
        })
    }

    pub fn reserved_name_count(&self) -> usize {
        self.inner.lock().names.len()
    }

    pub fn reserved_path_count(&self) -> usize {
        self.inner.lock().paths.len()
    }
}

/// Guard withdrawing a name reservation on drop. `persist` keeps the
/// reservation alive past the guard, for the commit path that replaces it
/// with the real catalog entry.
pub struct NameWithdraw {
    inner: Arc<Mutex<Inner>>,
    reserved: ReservedName,
    armed: bool,
}

impl NameWithdraw {
    pub fn persist(mut self) {
        self.armed = false;
    }

    /// Withdraw now rather than at scope exit.
    pub fn withdraw(self) {}
}

impl Drop for NameWithdraw {
    fn drop(&mut self) {
        if self.armed {
            let mut inner = self.inner.lock();
            if let Some(position) = inner.names.iter().position(|n| *n == self.reserved) {
                inner.names.remove(position);
            }
        }
    }
}

/// Guard withdrawing a path reservation on drop.
pub struct PathWithdraw {
    inner: Arc<Mutex<Inner>>,
    path: PathBuf,
    armed: bool,
}

impl PathWithdraw {
    pub fn persist(mut self) {
        self.armed = false;
    }

    pub fn withdraw(self) {}
}

impl Drop for PathWithdraw {
    fn drop(&mut self) {
        if self.armed {
            let mut inner = self.inner.lock();
            if let Some(position) = inner.paths.iter().position(|p| *p == self.path) {
                inner.paths.remove(position);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_name_fails_fast() {
        let reservations = Reservations::new();
        let _first = reservations
            .reserve_name(ObjectCategory::Table, 1, 1, "users")
            .unwrap();
        let second = reservations.reserve_name(ObjectCategory::Table, 1, 1, "users");
        assert!(matches!(second, Err(DbError::AlreadyExists(_))));
        // A different category may share the name.
        assert!(reservations
            .reserve_name(ObjectCategory::Index, 1, 1, "users")
            .is_ok());
    }

    #[test]
    fn guard_withdraws_on_drop() {
        let reservations = Reservations::new();
        {
            let _guard = reservations
                .reserve_name(ObjectCategory::Table, 1, 1, "t")
                .unwrap();
            assert_eq!(reservations.reserved_name_count(), 1);
        }
        assert_eq!(reservations.reserved_name_count(), 0);
        assert!(reservations
            .reserve_name(ObjectCategory::Table, 1, 1, "t")
            .is_ok());
    }

    #[test]
    fn persist_keeps_reservation() {
        let reservations = Reservations::new();
        let guard = reservations
            .reserve_name(ObjectCategory::Table, 1, 1, "t")
            .unwrap();
        guard.persist();
        assert_eq!(reservations.reserved_name_count(), 1);
    }

    #[test]
    fn overlapping_paths_conflict() {
        let reservations = Reservations::new();
        let _guard = reservations.reserve_path(Path::new("/data/db1")).unwrap();
        assert!(reservations.reserve_path(Path::new("/data/db1/t")).is_err());
        assert!(reservations.reserve_path(Path::new("/data")).is_err());
        assert!(reservations.reserve_path(Path::new("/data/db2")).is_ok());
    }

    #[test]
    fn too_long_name_rejected() {
        let reservations = Reservations::new();
        let long = "x".repeat(51);
        assert!(matches!(
            reservations.reserve_name(ObjectCategory::Table, 1, 1, &long),
            Err(DbError::InvalidArgument(_))
        ));
    }
}
