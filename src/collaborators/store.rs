//! The asset/config store collaborator (`spec.md` §6): `get(name) →
//! Document | Error`, where `name` is a dotted triplet such as
//! `schema.wazuh-asset.0`.
//!
//! `original_source/` retained no code for the original store (filtered to
//! zero kept files), so its on-disk layout is unspecified here beyond the
//! store contract itself. [`FileAssetStore`] supplies a concrete,
//! testable backend: a dotted name resolves to `<root>/<name>.yml`.

use std::fs;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("asset \"{0}\" not found")]
    #[diagnostic(code(eventcascade::store::not_found))]
    NotFound(String),
    #[error("asset \"{0}\" could not be read: {1}")]
    #[diagnostic(code(eventcascade::store::io))]
    Io(String, String),
    #[error("asset \"{0}\" is not valid YAML: {1}")]
    #[diagnostic(code(eventcascade::store::parse))]
    Parse(String, String),
}

/// Read-only key → document lookup. The core never writes to the store
/// (`spec.md` §6).
pub trait AssetStore: Send + Sync {
    fn get(&self, name: &str) -> Result<serde_yaml::Value, StoreError>;
}

/// A directory of `<name>.yml` files, one per asset.
pub struct FileAssetStore {
    root: PathBuf,
}

impl FileAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.yml"))
    }
}

impl AssetStore for FileAssetStore {
    fn get(&self, name: &str) -> Result<serde_yaml::Value, StoreError> {
        let path = self.path_for(name);
        let raw = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(name.to_string())
            } else {
                StoreError::Io(name.to_string(), e.to_string())
            }
        })?;
        serde_yaml::from_str(&raw).map_err(|e| StoreError::Parse(name.to_string(), e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_and_parses_an_existing_asset() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("schema.wazuh-asset.0.yml"), "name: foo\ncheck: []\n").unwrap();
        let store = FileAssetStore::new(dir.path());
        let doc = store.get("schema.wazuh-asset.0").unwrap();
        assert_eq!(doc.get("name").and_then(|v| v.as_str()), Some("foo"));
    }

    #[test]
    fn missing_asset_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAssetStore::new(dir.path());
        assert!(matches!(store.get("missing.asset.0"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.asset.0.yml"), "::: not yaml :::").unwrap();
        let store = FileAssetStore::new(dir.path());
        assert!(matches!(store.get("bad.asset.0"), Err(StoreError::Parse(_, _))));
    }
}
