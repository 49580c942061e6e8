//! Migration stores - append-only destinations for rendered migrations

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{OrmError, OrmResult};

/// Append-only migration destination
///
/// Filenames carry a `YYYYMMDDHHMMSS` prefix so lexical order is application order.
pub trait MigrationStore {
    /// Write a new migration; an existing filename is never overwritten
    fn write(&mut self, filename: &str, content: &str) -> OrmResult<()>;

    fn exists(&self, filename: &str) -> bool;

    /// Stored filenames in chronological order
    fn list(&self) -> OrmResult<Vec<String>>;
}

/// Directory-backed store
#[derive(Debug, Clone)]
pub struct FileMigrationStore {
    dir: PathBuf,
}

impl FileMigrationStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl MigrationStore for FileMigrationStore {
    fn write(&mut self, filename: &str, content: &str) -> OrmResult<()> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            OrmError::Migration(format!("Failed to create migrations directory: {}", e))
        })?;

        let path = self.dir.join(filename);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => {
                    OrmError::Migration(format!("Migration file already exists: {}", filename))
                }
                _ => OrmError::Migration(format!("Failed to write migration file: {}", e)),
            })?;
        file.write_all(content.as_bytes())?;

        debug!("Wrote migration {}", path.display());
        Ok(())
    }

    fn exists(&self, filename: &str) -> bool {
        self.dir.join(filename).exists()
    }

    fn list(&self) -> OrmResult<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("sql") {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
                files.push(name.to_string());
            }
        }
        files.sort();
        Ok(files)
    }
}

/// In-memory store, mainly for tests
#[derive(Debug, Clone, Default)]
pub struct MemoryMigrationStore {
    files: IndexMap<String, String>,
}

impl MemoryMigrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, filename: &str) -> Option<&str> {
        self.files.get(filename).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl MigrationStore for MemoryMigrationStore {
    fn write(&mut self, filename: &str, content: &str) -> OrmResult<()> {
        if self.files.contains_key(filename) {
            return Err(OrmError::Migration(format!(
                "Migration file already exists: {}",
                filename
            )));
        }
        self.files.insert(filename.to_string(), content.to_string());
        Ok(())
    }

    fn exists(&self, filename: &str) -> bool {
        self.files.contains_key(filename)
    }

    fn list(&self) -> OrmResult<Vec<String>> {
        let mut files: Vec<String> = self.files.keys().cloned().collect();
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileMigrationStore::new(dir.path().join("migrations"));

        store.write("20240101000000_create_users_table.sql", "-- one").unwrap();
        let err = store
            .write("20240101000000_create_users_table.sql", "-- two")
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));

        let content =
            fs::read_to_string(dir.path().join("migrations/20240101000000_create_users_table.sql")).unwrap();
        assert_eq!(content, "-- one");
    }

    #[test]
    fn test_file_store_lists_sql_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileMigrationStore::new(dir.path());
        store.write("20240102000000_update_users_table.sql", "").unwrap();
        store.write("20240101000000_create_users_table.sql", "").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        assert_eq!(
            store.list().unwrap(),
            vec![
                "20240101000000_create_users_table.sql",
                "20240102000000_update_users_table.sql"
            ]
        );
    }

    #[test]
    fn test_memory_store_is_append_only() {
        let mut store = MemoryMigrationStore::new();
        store.write("a.sql", "x").unwrap();
        assert!(store.write("a.sql", "y").is_err());
        assert_eq!(store.get("a.sql"), Some("x"));
    }
}
