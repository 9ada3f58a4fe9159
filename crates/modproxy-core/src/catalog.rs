//! Per-module version catalog.
//!
//! The catalog is the `@v/list` object: one version per line, in publish
//! order, never containing duplicates. It is the commit marker of a
//! publish. A version appears here only after its artifacts are stored,
//! so anything listed is safe to serve.
//!
//! Appends are read-modify-write against the store. Callers must hold the
//! module's exclusive section (see [`crate::section`]) while appending.

use modproxy_store::{ObjectStore, StoreError};
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::{NotFound, PublishError, ReadError};
use crate::layout::ModuleLayout;
use crate::path::ModulePath;
use crate::retry::{with_retry, Exhausted};
use crate::version::{self, ModuleVersion};

/// Catalog failures.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The module has no published versions.
    #[error("module '{module}' has no published versions")]
    NoVersions { module: String },

    /// Reading the listing failed after retries.
    #[error("reading '{key}' failed after {attempts} attempt(s): {source}")]
    ReadFailed {
        key: String,
        attempts: u32,
        #[source]
        source: StoreError,
    },

    /// Writing the listing failed after retries.
    #[error("writing '{key}' failed after {attempts} attempt(s): {source}")]
    WriteFailed {
        key: String,
        attempts: u32,
        #[source]
        source: StoreError,
    },

    /// The listing holds something that is not a version.
    #[error("listing '{key}' is corrupt: {detail}")]
    Corrupt { key: String, detail: String },
}

impl CatalogError {
    fn read(key: &str, e: Exhausted) -> Self {
        CatalogError::ReadFailed {
            key: key.to_string(),
            attempts: e.attempts,
            source: e.error,
        }
    }

    fn write(key: &str, e: Exhausted) -> Self {
        CatalogError::WriteFailed {
            key: key.to_string(),
            attempts: e.attempts,
            source: e.error,
        }
    }
}

impl From<CatalogError> for PublishError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::ReadFailed {
                key,
                attempts,
                source,
            } => PublishError::StoreReadFailed {
                key,
                attempts,
                source,
            },
            CatalogError::WriteFailed {
                key,
                attempts,
                source,
            } => PublishError::StoreWriteFailed {
                key,
                attempts,
                source,
            },
            CatalogError::Corrupt { key, detail } => PublishError::CorruptCatalog { key, detail },
            CatalogError::NoVersions { module } => PublishError::CorruptCatalog {
                key: module,
                detail: "listing vanished during publish".to_string(),
            },
        }
    }
}

impl From<CatalogError> for ReadError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::NoVersions { module } => NotFound::Module { module }.into(),
            CatalogError::ReadFailed {
                key,
                attempts,
                source,
            }
            | CatalogError::WriteFailed {
                key,
                attempts,
                source,
            } => ReadError::StoreReadFailed {
                key,
                attempts,
                source,
            },
            CatalogError::Corrupt { key, detail } => ReadError::Corrupt { key, detail },
        }
    }
}

/// Outcome of [`VersionCatalog::append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The version is now listed.
    Appended,
    /// The version was already listed; the listing was left untouched.
    AlreadyPublished,
}

/// Render a listing: each version followed by a newline.
pub fn render_listing(versions: &[ModuleVersion]) -> String {
    versions.iter().map(|v| format!("{v}\n")).collect()
}

/// Parse a stored listing. Blank lines are ignored.
pub fn parse_listing(bytes: &[u8]) -> Result<Vec<ModuleVersion>, String> {
    let text = std::str::from_utf8(bytes).map_err(|e| format!("not UTF-8: {e}"))?;
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| ModuleVersion::parse(l).map_err(|e| e.to_string()))
        .collect()
}

/// Catalog access over a backing store.
pub struct VersionCatalog<'a> {
    store: &'a dyn ObjectStore,
    retry: RetryConfig,
}

impl<'a> VersionCatalog<'a> {
    /// Catalog view over `store`, retrying transient faults per `retry`.
    pub fn new(store: &'a dyn ObjectStore, retry: RetryConfig) -> Self {
        VersionCatalog { store, retry }
    }

    /// Published versions in publish order, or `None` if the module has
    /// never been published.
    pub fn load(&self, module: &ModulePath) -> Result<Option<Vec<ModuleVersion>>, CatalogError> {
        let key = ModuleLayout::new(module).list_key();
        let bytes = with_retry(&self.retry, "read catalog", || self.store.get(&key))
            .map_err(|e| CatalogError::read(&key, e))?;
        match bytes {
            None => Ok(None),
            Some(bytes) => parse_listing(&bytes)
                .map(Some)
                .map_err(|detail| CatalogError::Corrupt { key, detail }),
        }
    }

    /// Published versions in publish order; empty if none.
    pub fn list(&self, module: &ModulePath) -> Result<Vec<ModuleVersion>, CatalogError> {
        Ok(self.load(module)?.unwrap_or_default())
    }

    /// Whether `version` is listed.
    pub fn contains(
        &self,
        module: &ModulePath,
        version: &ModuleVersion,
    ) -> Result<bool, CatalogError> {
        Ok(self.list(module)?.contains(version))
    }

    /// Append `version` to the listing.
    ///
    /// Conflict-detecting: a version that is already listed is reported,
    /// never duplicated. The whole read-modify-write is retried on
    /// transient faults. If the previous attempt failed while writing and a
    /// retry then finds the version present, that write landed despite
    /// reporting failure, and the append counts as done. After a failed
    /// read nothing was written, so a listed version was put there by
    /// another writer.
    pub fn append(
        &self,
        module: &ModulePath,
        version: &ModuleVersion,
    ) -> Result<AppendOutcome, CatalogError> {
        let key = ModuleLayout::new(module).list_key();
        let attempts = self.retry.attempts.max(1);
        let mut attempt = 1;
        let mut wrote = false;
        loop {
            let result = self.append_once(&key, module, version);
            match result {
                Ok(AppendOutcome::AlreadyPublished) if wrote => {
                    debug!(%module, %version, "catalog write from earlier attempt landed");
                    return Ok(AppendOutcome::Appended);
                }
                Ok(outcome) => return Ok(outcome),
                Err(AppendFault::Store(error, write)) if error.is_transient() && attempt < attempts => {
                    warn!(
                        %module,
                        %version,
                        attempt,
                        attempts,
                        %error,
                        "catalog append failed, retrying"
                    );
                    std::thread::sleep(self.retry.backoff(attempt));
                    wrote = write;
                    attempt += 1;
                }
                Err(AppendFault::Store(error, write)) => {
                    let exhausted = Exhausted {
                        error,
                        attempts: attempt,
                    };
                    return Err(if write {
                        CatalogError::write(&key, exhausted)
                    } else {
                        CatalogError::read(&key, exhausted)
                    });
                }
                Err(AppendFault::Corrupt(detail)) => {
                    return Err(CatalogError::Corrupt { key, detail });
                }
            }
        }
    }

    fn append_once(
        &self,
        key: &str,
        module: &ModulePath,
        version: &ModuleVersion,
    ) -> Result<AppendOutcome, AppendFault> {
        let current = self
            .store
            .get(key)
            .map_err(|e| AppendFault::Store(e, false))?;
        let mut versions = match current {
            Some(bytes) => parse_listing(&bytes).map_err(AppendFault::Corrupt)?,
            None => Vec::new(),
        };
        if versions.contains(version) {
            return Ok(AppendOutcome::AlreadyPublished);
        }
        versions.push(version.clone());
        self.store
            .put(key, render_listing(&versions).as_bytes())
            .map_err(|e| AppendFault::Store(e, true))?;
        debug!(%module, %version, total = versions.len(), "catalog extended");
        Ok(AppendOutcome::Appended)
    }

    /// The version reported as latest.
    pub fn resolve_latest(
        &self,
        module: &ModulePath,
        include_prerelease: bool,
    ) -> Result<ModuleVersion, CatalogError> {
        let versions = self.list(module)?;
        version::resolve_latest(&versions, include_prerelease)
            .cloned()
            .ok_or_else(|| CatalogError::NoVersions {
                module: module.to_string(),
            })
    }
}

/// A single append attempt's failure; the flag marks the write phase.
enum AppendFault {
    Store(StoreError, bool),
    Corrupt(String),
}
