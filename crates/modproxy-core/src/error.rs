//! Engine error types.
//!
//! Each concern has its own enum so callers can match on exactly the
//! failures an operation can produce. Store faults keep the underlying
//! [`StoreError`] as their source.

use std::path::PathBuf;

use modproxy_store::StoreError;

/// A module path or escaped path that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed module path '{path}': {reason}")]
pub struct PathError {
    /// The offending input.
    pub path: String,
    /// Why it was rejected.
    pub reason: String,
}

/// Errors produced by the artifact builder.
///
/// None of these are retried: they describe a bad request, not a
/// transient fault.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The version is not a well-formed semantic version.
    #[error("invalid version '{version}': {detail}")]
    InvalidVersion { version: String, detail: String },

    /// The module path is malformed.
    #[error(transparent)]
    InvalidModulePath(#[from] PathError),

    /// The source tree could not be enumerated or read.
    #[error("source tree unreadable at '{path}': {detail}")]
    SourceUnreadable { path: String, detail: String },

    /// The root `go.mod` declares a different module.
    #[error("go.mod declares module '{declared}', expected '{expected}'")]
    ModulePathMismatch { expected: String, declared: String },

    /// The archive could not be produced.
    #[error("packaging failed for '{module}@{version}': {detail}")]
    PackagingFailure {
        module: String,
        version: String,
        detail: String,
    },
}

/// Errors produced by the update coordinator.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The version is already in the module's catalog. Nothing was written.
    #[error("module '{module}@{version}' already published")]
    AlreadyPublished { module: String, version: String },

    /// The module path is malformed. Nothing was written.
    #[error(transparent)]
    InvalidModulePath(#[from] PathError),

    /// Building the artifact set failed. Nothing was written.
    #[error("build of '{module}@{version}' failed: {source}")]
    BuildFailed {
        module: String,
        version: String,
        #[source]
        source: BuildError,
    },

    /// A store write kept failing after every retry.
    #[error("store write to '{key}' failed after {attempts} attempt(s): {source}")]
    StoreWriteFailed {
        key: String,
        attempts: u32,
        #[source]
        source: StoreError,
    },

    /// A store read kept failing after every retry.
    #[error("store read of '{key}' failed after {attempts} attempt(s): {source}")]
    StoreReadFailed {
        key: String,
        attempts: u32,
        #[source]
        source: StoreError,
    },

    /// The stored catalog could not be decoded.
    #[error("catalog '{key}' is corrupt: {detail}")]
    CorruptCatalog { key: String, detail: String },
}

impl PublishError {
    /// Whether this result only reports an existing publish.
    ///
    /// Callers retrying a publish idempotently treat this as success.
    pub fn is_already_published(&self) -> bool {
        matches!(self, PublishError::AlreadyPublished { .. })
    }
}

/// A read addressed something that has never been published.
///
/// Both variants are one error kind; the split exists for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotFound {
    /// No version of the module was ever published.
    #[error("module '{module}' has never been published")]
    Module { module: String },

    /// The module exists, but not at this version.
    #[error("version {version} of module '{module}' has never been published")]
    Version { module: String, version: String },
}

/// Errors produced by the read protocol handler.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    /// The module or version is unknown.
    #[error(transparent)]
    NotFound(#[from] NotFound),

    /// A store read kept failing after every retry.
    #[error("store read of '{key}' failed after {attempts} attempt(s): {source}")]
    StoreReadFailed {
        key: String,
        attempts: u32,
        #[source]
        source: StoreError,
    },

    /// A committed object failed to decode.
    #[error("stored object '{key}' is corrupt: {detail}")]
    Corrupt { key: String, detail: String },

    /// The request path does not name a protocol resource.
    #[error("bad request '{path}': {detail}")]
    BadRequest { path: String, detail: String },
}

impl ReadError {
    /// Whether this is the not-found kind, whichever side was missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ReadError::NotFound(_))
    }
}

/// Configuration loading and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Reading the config file failed.
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid configuration: {detail}")]
    Invalid { detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_messages_distinguish_cause() {
        let module = ReadError::from(NotFound::Module {
            module: "example.com/a".to_string(),
        });
        let version = ReadError::from(NotFound::Version {
            module: "example.com/a".to_string(),
            version: "v1.0.0".to_string(),
        });

        assert!(module.is_not_found());
        assert!(version.is_not_found());
        assert!(module.to_string().contains("never been published"));
        assert!(version.to_string().contains("v1.0.0"));
        assert_ne!(module.to_string(), version.to_string());
    }

    #[test]
    fn build_failure_keeps_kind() {
        let err = PublishError::BuildFailed {
            module: "example.com/a".to_string(),
            version: "v1.0.0".to_string(),
            source: BuildError::InvalidVersion {
                version: "x".to_string(),
                detail: "bad".to_string(),
            },
        };
        assert!(!err.is_already_published());
        assert!(matches!(
            err,
            PublishError::BuildFailed {
                source: BuildError::InvalidVersion { .. },
                ..
            }
        ));
    }
}
