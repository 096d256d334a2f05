//! The KVDB collaborator (`spec.md` §6): `open`/`get`/`delete`/`exists`
//! against a named key-value database.

use std::collections::HashMap;

use miette::Diagnostic;
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KvdbError {
    #[error("kvdb \"{0}\" does not exist and create_if_missing was false")]
    #[diagnostic(code(eventcascade::kvdb::no_such_database))]
    NoSuchDatabase(String),
    #[error("kvdb \"{0}\" I/O error: {1}")]
    #[diagnostic(code(eventcascade::kvdb::io))]
    Io(String, String),
}

/// An opaque handle to an opened database. Equality is by database name,
/// matching the reference semantics of the collaborator described in
/// `spec.md` §6 (handles are cheap to hold and compare, not file descriptors
/// the caller must manage).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct KvdbHandle(String);

impl KvdbHandle {
    pub fn name(&self) -> &str {
        &self.0
    }
}

pub trait Kvdb: Send + Sync {
    fn open(&self, db_name: &str, create_if_missing: bool) -> Result<KvdbHandle, KvdbError>;
    fn get(&self, handle: &KvdbHandle, key: &str) -> Result<Option<Value>, KvdbError>;
    fn delete(&self, handle: &KvdbHandle, key: &str) -> Result<(), KvdbError>;
    fn exists(&self, handle: &KvdbHandle, key: &str) -> Result<bool, KvdbError>;
}

/// An in-process KVDB backed by a `HashMap` of databases. The real on-disk
/// KVDB is out of scope (`spec.md` §1); this gives `kvdb_get`/`kvdb_match`/
/// `kvdb_delete` a working default so the helper family is fully
/// exercisable without an external process.
#[derive(Default)]
pub struct MemoryKvdb {
    databases: Mutex<HashMap<String, HashMap<String, Value>>>,
}

impl MemoryKvdb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a database with entries, for tests and fixture loading.
    pub fn seed(&self, db_name: &str, entries: impl IntoIterator<Item = (String, Value)>) {
        let mut dbs = self.databases.lock();
        dbs.entry(db_name.to_string())
            .or_default()
            .extend(entries);
    }
}

impl Kvdb for MemoryKvdb {
    fn open(&self, db_name: &str, create_if_missing: bool) -> Result<KvdbHandle, KvdbError> {
        let mut dbs = self.databases.lock();
        if !dbs.contains_key(db_name) {
            if !create_if_missing {
                return Err(KvdbError::NoSuchDatabase(db_name.to_string()));
            }
            dbs.insert(db_name.to_string(), HashMap::new());
        }
        Ok(KvdbHandle(db_name.to_string()))
    }

    fn get(&self, handle: &KvdbHandle, key: &str) -> Result<Option<Value>, KvdbError> {
        let dbs = self.databases.lock();
        Ok(dbs.get(handle.name()).and_then(|db| db.get(key)).cloned())
    }

    fn delete(&self, handle: &KvdbHandle, key: &str) -> Result<(), KvdbError> {
        let mut dbs = self.databases.lock();
        if let Some(db) = dbs.get_mut(handle.name()) {
            db.remove(key);
        }
        Ok(())
    }

    fn exists(&self, handle: &KvdbHandle, key: &str) -> Result<bool, KvdbError> {
        let dbs = self.databases.lock();
        Ok(dbs.get(handle.name()).is_some_and(|db| db.contains_key(key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn open_with_create_if_missing_false_fails_on_unknown_db() {
        let kvdb = MemoryKvdb::new();
        assert!(kvdb.open("unknown", false).is_err());
    }

    #[test]
    fn get_set_delete_round_trip() {
        let kvdb = MemoryKvdb::new();
        kvdb.seed("db", [("k".to_string(), json!("v"))]);
        let handle = kvdb.open("db", true).unwrap();
        assert_eq!(kvdb.get(&handle, "k").unwrap(), Some(json!("v")));
        assert!(kvdb.exists(&handle, "k").unwrap());
        kvdb.delete(&handle, "k").unwrap();
        assert_eq!(kvdb.get(&handle, "k").unwrap(), None);
        assert!(!kvdb.exists(&handle, "k").unwrap());
    }
}
