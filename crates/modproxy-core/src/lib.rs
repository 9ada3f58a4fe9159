//! Publish engine and read protocol for the modproxy Go module proxy.
//!
//! Publishing a `(module, version, source tree)` materializes the artifact
//! set the module proxy protocol serves and stores it so that a plain
//! path-addressed GET (or `GOPROXY=file://<store-root>`) can fetch it.
//!
//! # Architecture
//!
//! - **Artifact Builder** ([`builder`], [`archive`], [`manifest`]): pure
//!   function from source tree to `.info`, `.mod` and `.zip`
//! - **Version Catalog** ([`catalog`], [`version`]): append-only
//!   `@v/list` per module, and latest resolution
//! - **Update Coordinator** ([`coordinator`], [`section`]): per-module
//!   exclusion and the artifacts-then-catalog write order
//! - **Read Protocol Handler** ([`proxy`]): serves committed data only
//!
//! The backing store is the external [`modproxy_store::ObjectStore`].

pub mod archive;
pub mod builder;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod integrity;
pub mod layout;
pub mod manifest;
pub mod path;
pub mod proxy;
pub mod retry;
pub mod section;
pub mod source;
pub mod version;

// Re-exports for convenience.
pub use builder::{ArtifactBuilder, ArtifactSet, VersionInfo};
pub use catalog::{AppendOutcome, CatalogError, VersionCatalog};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::ProxyConfig;
pub use coordinator::{PublishResult, SweepReport, UpdateCoordinator};
pub use error::{BuildError, ConfigError, NotFound, PathError, PublishError, ReadError};
pub use integrity::{ArtifactDigest, ContentHash, DirHash};
pub use path::ModulePath;
pub use proxy::{IntegrityReport, ModuleProxy, ProxyRequest, ProxyResponse};
pub use source::{DirSource, MemorySource, SourceError, SourceTree, StoreSource};
pub use version::{resolve_latest, ModuleVersion};
