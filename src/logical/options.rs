// Typed key-value configuration of one logical file, as handed down by the
// catalog when a file is attached. Integer-valued options use named keys so
// the optimizer can set them without knowing the file kind.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::common::FileId;
use crate::error::{DbError, Result};
use crate::lock::LockName;
use crate::version::VersionFileConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileOptionKey {
    PageSize,
    Mounted,
    ReadOnly,
    Temporary,
    Path,
    LockName,
    AreaIds,
    VectorPageSize,
    /// Element size of vector field `i`.
    VectorElementSize(u32),
    /// Horizontal partition count of an inverted file.
    UnitCount,
    CacheSize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FileOptionValue {
    Int(i64),
    Bool(bool),
    Str(String),
    Path(PathBuf),
    IntList(Vec<i64>),
    Lock(LockName),
}

/// The configuration map of one logical file.
#[derive(Debug, Clone, Default)]
pub struct FileOptions {
    values: HashMap<FileOptionKey, FileOptionValue>,
}

impl FileOptions {
    pub fn new() -> FileOptions {
        FileOptions::default()
    }

    pub fn set(&mut self, key: FileOptionKey, value: FileOptionValue) -> &mut Self {
        self.values.insert(key, value);
        self
    }

    pub fn get(&self, key: FileOptionKey) -> Option<&FileOptionValue> {
        self.values.get(&key)
    }

    pub fn integer(&self, key: FileOptionKey) -> Result<i64> {
        match self.values.get(&key) {
            Some(FileOptionValue::Int(v)) => Ok(*v),
            Some(_) => Err(DbError::InvalidArgument(format!(
                "option {key:?} is not an integer"
            ))),
            None => Err(DbError::NotFound(format!("option {key:?}"))),
        }
    }

    pub fn integer_or(&self, key: FileOptionKey, default: i64) -> i64 {
        self.integer(key).unwrap_or(default)
    }

    pub fn boolean(&self, key: FileOptionKey, default: bool) -> bool {
        match self.values.get(&key) {
            Some(FileOptionValue::Bool(v)) => *v,
            _ => default,
        }
    }

    pub fn path(&self) -> Result<PathBuf> {
        match self.values.get(&FileOptionKey::Path) {
            Some(FileOptionValue::Path(p)) => Ok(p.clone()),
            Some(FileOptionValue::Str(s)) => Ok(PathBuf::from(s)),
            _ => Err(DbError::NotFound("option Path".into())),
        }
    }

    pub fn lock_name(&self) -> Option<LockName> {
        match self.values.get(&FileOptionKey::LockName) {
            Some(FileOptionValue::Lock(name)) => Some(*name),
            _ => None,
        }
    }

    pub fn page_size(&self) -> usize {
        self.integer_or(FileOptionKey::PageSize, 4096) as usize
    }

    pub fn is_mounted(&self) -> bool {
        self.boolean(FileOptionKey::Mounted, true)
    }

    pub fn is_read_only(&self) -> bool {
        self.boolean(FileOptionKey::ReadOnly, false)
    }

    pub fn is_temporary(&self) -> bool {
        self.boolean(FileOptionKey::Temporary, false)
    }

    pub fn cache_size(&self, default: usize) -> usize {
        self.integer_or(FileOptionKey::CacheSize, default as i64) as usize
    }

    /// The version-file configuration every kind's attach starts from.
    pub fn version_config(&self, file_id: FileId) -> Result<VersionFileConfig> {
        Ok(VersionFileConfig {
            file_id,
            page_size: self.page_size(),
            path: self.path()?,
            read_only: self.is_read_only(),
            temporary: self.is_temporary(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_access() {
        let mut options = FileOptions::new();
        options
            .set(FileOptionKey::PageSize, FileOptionValue::Int(8192))
            .set(FileOptionKey::Temporary, FileOptionValue::Bool(true))
            .set(
                FileOptionKey::Path,
                FileOptionValue::Path(PathBuf::from("/tmp/x")),
            );
        assert_eq!(options.page_size(), 8192);
        assert!(options.is_temporary());
        assert!(!options.is_read_only());
        assert_eq!(options.path().unwrap(), PathBuf::from("/tmp/x"));
        assert!(options.integer(FileOptionKey::CacheSize).is_err());
        assert!(matches!(
            options.integer(FileOptionKey::Temporary),
            Err(DbError::InvalidArgument(_))
        ));
    }

    #[test]
    fn version_config_from_options() {
        let mut options = FileOptions::new();
        options
            .set(FileOptionKey::PageSize, FileOptionValue::Int(4096))
            .set(FileOptionKey::ReadOnly, FileOptionValue::Bool(true))
            .set(
                FileOptionKey::Path,
                FileOptionValue::Path(PathBuf::from("/data/t/FullText")),
            );
        let config = options.version_config(42).unwrap();
        assert_eq!(config.file_id, 42);
        assert_eq!(config.page_size, 4096);
        assert!(config.read_only);
        assert!(!config.temporary);
        assert_eq!(config.path, PathBuf::from("/data/t/FullText"));

        // Without a path the configuration cannot be built.
        assert!(FileOptions::new().version_config(1).is_err());
    }
}
