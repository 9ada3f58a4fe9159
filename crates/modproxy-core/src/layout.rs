//! Store key layout of the read protocol.
//!
//! ```text
//! <escaped-module>/@v/list
//! <escaped-module>/@v/<escaped-version>.info
//! <escaped-module>/@v/<escaped-version>.mod
//! <escaped-module>/@v/<escaped-version>.zip
//! <escaped-module>/@latest
//! ```
//!
//! Keys and request paths are identical, so a static file server over the
//! store root speaks the protocol unchanged.

use crate::path::{escape, ModulePath};
use crate::version::ModuleVersion;

/// One of the three per-version objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// `.info` metadata document.
    Info,
    /// `.mod` manifest.
    Mod,
    /// `.zip` archive.
    Zip,
}

impl ArtifactKind {
    /// All kinds, in the order they are written.
    pub const ALL: [ArtifactKind; 3] = [ArtifactKind::Mod, ArtifactKind::Zip, ArtifactKind::Info];

    /// File extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Info => "info",
            ArtifactKind::Mod => "mod",
            ArtifactKind::Zip => "zip",
        }
    }

    /// Map an extension back to its kind.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "info" => Some(ArtifactKind::Info),
            "mod" => Some(ArtifactKind::Mod),
            "zip" => Some(ArtifactKind::Zip),
            _ => None,
        }
    }

    /// MIME type served for this kind.
    pub fn content_type(&self) -> &'static str {
        match self {
            ArtifactKind::Info => "application/json",
            ArtifactKind::Mod => "text/plain; charset=utf-8",
            ArtifactKind::Zip => "application/zip",
        }
    }
}

/// Key builder for one module's namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleLayout {
    escaped: String,
}

impl ModuleLayout {
    /// Layout for `module`.
    pub fn new(module: &ModulePath) -> Self {
        ModuleLayout {
            escaped: module.escaped(),
        }
    }

    /// Key of the version listing.
    pub fn list_key(&self) -> String {
        format!("{}/@v/list", self.escaped)
    }

    /// Key of the materialized latest pointer.
    pub fn latest_key(&self) -> String {
        format!("{}/@latest", self.escaped)
    }

    /// Prefix shared by every per-version object and the listing.
    pub fn version_prefix(&self) -> String {
        format!("{}/@v/", self.escaped)
    }

    /// Key of one artifact.
    pub fn artifact_key(&self, version: &ModuleVersion, kind: ArtifactKind) -> String {
        format!(
            "{}/@v/{}.{}",
            self.escaped,
            escape(&version.to_string()),
            kind.extension()
        )
    }

    /// Split an artifact key of this module into escaped version and kind.
    pub fn parse_artifact_key<'k>(&self, key: &'k str) -> Option<(&'k str, ArtifactKind)> {
        let file = key.strip_prefix(&self.version_prefix())?;
        if file.contains('/') {
            return None;
        }
        let (version, ext) = file.rsplit_once('.')?;
        Some((version, ArtifactKind::from_extension(ext)?))
    }
}
