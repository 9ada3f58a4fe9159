//! Source trees handed to the artifact builder.
//!
//! A source tree is anything that can enumerate its files and read them
//! by relative path: a checkout on disk, an in-memory map, or a prefix
//! inside an object store. Paths are relative and `/`-separated.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use modproxy_store::ObjectStore;

use crate::error::BuildError;

/// Failure to enumerate or read a source tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("source '{path}': {detail}")]
pub struct SourceError {
    /// Relative path (or tree root) that failed.
    pub path: String,
    /// What went wrong.
    pub detail: String,
}

impl SourceError {
    fn new(path: impl Into<String>, detail: impl ToString) -> Self {
        SourceError {
            path: path.into(),
            detail: detail.to_string(),
        }
    }
}

impl From<SourceError> for BuildError {
    fn from(e: SourceError) -> Self {
        BuildError::SourceUnreadable {
            path: e.path,
            detail: e.detail,
        }
    }
}

/// Read capability over a module's file tree.
pub trait SourceTree {
    /// Every regular file in the tree, as relative `/`-separated paths.
    fn entries(&self) -> Result<Vec<String>, SourceError>;

    /// Read one file. Returns `Ok(None)` if it does not exist.
    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, SourceError>;
}

/// A source tree in a local directory.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    /// Create a source rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirSource { root: root.into() }
    }

    /// Get the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn walk(&self, dir: &Path, rel: &str, out: &mut Vec<String>) -> Result<(), SourceError> {
        let label = if rel.is_empty() { "." } else { rel };
        let entries = std::fs::read_dir(dir).map_err(|e| SourceError::new(label, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| SourceError::new(label, e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                return Err(SourceError::new(
                    label,
                    format!("non UTF-8 file name {name:?}"),
                ));
            };
            let child = if rel.is_empty() {
                name.to_string()
            } else {
                format!("{rel}/{name}")
            };
            // Symlinks and other irregular files are not packaged.
            let file_type = entry.file_type().map_err(|e| SourceError::new(&child, e))?;
            if file_type.is_dir() {
                self.walk(&entry.path(), &child, out)?;
            } else if file_type.is_file() {
                out.push(child);
            }
        }
        Ok(())
    }
}

impl SourceTree for DirSource {
    fn entries(&self) -> Result<Vec<String>, SourceError> {
        if !self.root.is_dir() {
            return Err(SourceError::new(
                self.root.display().to_string(),
                "not a directory",
            ));
        }
        let mut out = Vec::new();
        self.walk(&self.root, "", &mut out)?;
        out.sort();
        Ok(out)
    }

    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, SourceError> {
        let full = path.split('/').fold(self.root.clone(), |p, s| p.join(s));
        match std::fs::read(&full) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SourceError::new(path, e)),
        }
    }
}

/// A source tree held in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySource {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemorySource {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file, builder style.
    pub fn with_file(mut self, path: &str, data: impl Into<Vec<u8>>) -> Self {
        self.insert(path, data);
        self
    }

    /// Add or replace a file.
    pub fn insert(&mut self, path: &str, data: impl Into<Vec<u8>>) {
        self.files.insert(path.to_string(), data.into());
    }
}

impl SourceTree for MemorySource {
    fn entries(&self) -> Result<Vec<String>, SourceError> {
        Ok(self.files.keys().cloned().collect())
    }

    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, SourceError> {
        Ok(self.files.get(path).cloned())
    }
}

/// A source tree stored under a key prefix of an object store.
pub struct StoreSource<'a> {
    store: &'a dyn ObjectStore,
    prefix: String,
}

impl<'a> StoreSource<'a> {
    /// Expose every object under `prefix/` as a source file.
    pub fn new(store: &'a dyn ObjectStore, prefix: &str) -> Self {
        StoreSource {
            store,
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    fn key(&self, path: &str) -> String {
        format!("{}/{path}", self.prefix)
    }
}

impl SourceTree for StoreSource<'_> {
    fn entries(&self) -> Result<Vec<String>, SourceError> {
        let prefix = format!("{}/", self.prefix);
        let keys = self
            .store
            .list(&prefix)
            .map_err(|e| SourceError::new(&self.prefix, e))?;
        Ok(keys
            .into_iter()
            .filter_map(|k| k.strip_prefix(&prefix).map(str::to_string))
            .collect())
    }

    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, SourceError> {
        self.store
            .get(&self.key(path))
            .map_err(|e| SourceError::new(path, e))
    }
}
