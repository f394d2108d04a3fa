//! Short-lived per-session storage used to hand a computed report from the
//! report step to the download step.
//!
//! A stored result is meant to be taken at most once: [`SessionStore::take`]
//! reads and deletes in one call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::debug;

use crate::error::BoxError;
use crate::report::ReportTable;

/// What the report step leaves behind for the download step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingDownload {
    pub filename: String,
    pub table: ReportTable,
    pub created_at: DateTime<Utc>,
}

impl PendingDownload {
    pub fn new(filename: String, table: ReportTable) -> Self {
        Self {
            filename,
            table,
            created_at: Utc::now(),
        }
    }
}

pub trait SessionStore: Send + Sync {
    fn get(&self, session: &str) -> Result<Option<PendingDownload>, BoxError>;
    fn set(&self, session: &str, value: PendingDownload) -> Result<(), BoxError>;
    fn delete(&self, session: &str) -> Result<(), BoxError>;

    /// Pop-once read: the value is gone afterwards whether or not it existed.
    fn take(&self, session: &str) -> Result<Option<PendingDownload>, BoxError> {
        let value = self.get(session)?;
        self.delete(session)?;
        Ok(value)
    }
}

#[derive(Default)]
pub struct MemorySessionStore {
    values: Mutex<HashMap<String, PendingDownload>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, session: &str) -> Result<Option<PendingDownload>, BoxError> {
        let values = self.values.lock().map_err(|e| e.to_string())?;
        Ok(values.get(session).cloned())
    }

    fn set(&self, session: &str, value: PendingDownload) -> Result<(), BoxError> {
        let mut values = self.values.lock().map_err(|e| e.to_string())?;
        values.insert(session.to_string(), value);
        Ok(())
    }

    fn delete(&self, session: &str) -> Result<(), BoxError> {
        let mut values = self.values.lock().map_err(|e| e.to_string())?;
        values.remove(session);
        Ok(())
    }
}

/// One JSON file per session under a directory, so the download can run in
/// a later process than the report.
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, BoxError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path(&self, session: &str) -> Result<PathBuf, BoxError> {
        let valid = !session.is_empty()
            && session
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(format!("invalid session id '{session}'").into());
        }
        Ok(self.dir.join(format!("{session}.json")))
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, session: &str) -> Result<Option<PendingDownload>, BoxError> {
        let path = self.path(session)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, session: &str, value: PendingDownload) -> Result<(), BoxError> {
        let path = self.path(session)?;
        std::fs::write(&path, serde_json::to_vec(&value)?)?;
        debug!(path = %path.display(), "Session data stored");
        Ok(())
    }

    fn delete(&self, session: &str) -> Result<(), BoxError> {
        let path = self.path(session)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Cell;

    fn pending() -> PendingDownload {
        PendingDownload::new(
            "Chemist7_FilteredData_ALL_Data.xlsx".into(),
            ReportTable {
                title: "7 (Corner Pharmacy)".into(),
                headers: vec!["Year".into(), "Items C7".into(), "Rolling Avg C7".into()],
                rows: vec![vec![Cell::Integer(2023), Cell::Number(20.5), Cell::Missing]],
            },
        )
    }

    fn assert_pop_once(store: &dyn SessionStore) {
        assert!(store.take("abc").unwrap().is_none());

        let stored = pending();
        store.set("abc", stored.clone()).unwrap();
        assert_eq!(store.get("abc").unwrap(), Some(stored.clone()));

        let taken = store.take("abc").unwrap().unwrap();
        assert_eq!(taken.table, pending().table);
        assert!(store.take("abc").unwrap().is_none());
    }

    #[test]
    fn test_memory_store_pop_once() {
        assert_pop_once(&MemorySessionStore::new());
    }

    #[test]
    fn test_file_store_pop_once() {
        let dir = tempfile::tempdir().unwrap();
        assert_pop_once(&FileSessionStore::new(dir.path()).unwrap());
    }

    #[test]
    fn test_file_store_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        FileSessionStore::new(dir.path()).unwrap().set("s1", pending()).unwrap();

        let reopened = FileSessionStore::new(dir.path()).unwrap();
        let taken = reopened.take("s1").unwrap().unwrap();
        assert_eq!(taken.filename, "Chemist7_FilteredData_ALL_Data.xlsx");
        assert_eq!(taken.table.rows[0][1], Cell::Number(20.5));
    }

    #[test]
    fn test_file_store_rejects_path_like_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path()).unwrap();
        assert!(store.set("../escape", pending()).is_err());
        assert!(store.get("").is_err());
    }
}
