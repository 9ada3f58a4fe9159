//! Backing object store adapter for the modproxy module proxy.
//!
//! The proxy engine treats storage as an external key/blob collaborator:
//! keys are `/`-separated relative paths, values are opaque byte blobs.
//! This crate defines the [`ObjectStore`] contract and ships two
//! implementations:
//! - [`FsStore`]: a directory tree, laid out so that the store root can be
//!   served directly as `GOPROXY=file://<root>`
//! - [`MemoryStore`]: an in-process map for tests and embedding
//!
//! Stores are stateless conduits. They impose no locking of their own; the
//! engine serializes writers per module.

pub mod error;
pub mod fs;
pub mod key;
pub mod memory;

use std::sync::Arc;

// Re-exports for convenience.
pub use error::{Result, StoreError};
pub use fs::FsStore;
pub use key::validate_key;
pub use memory::MemoryStore;

/// Abstract key/blob store.
///
/// Implementations must be safe to share between threads. Individual
/// operations are expected to be atomic per key: a concurrent `get` observes
/// either the previous value or the new one, never a torn write.
pub trait ObjectStore: Send + Sync {
    /// Read the value stored at `key`, or `None` if the key is absent.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `data` at `key`, replacing any previous value.
    fn put(&self, key: &str, data: &[u8]) -> Result<()>;

    /// List every key starting with `prefix`, sorted lexicographically.
    fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Delete `key`. Returns `false` if it did not exist.
    fn delete(&self, key: &str) -> Result<bool>;

    /// Check whether `key` holds a value.
    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

impl<S: ObjectStore + ?Sized> ObjectStore for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        (**self).put(key, data)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        (**self).list(prefix)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        (**self).delete(key)
    }

    fn exists(&self, key: &str) -> Result<bool> {
        (**self).exists(key)
    }
}
