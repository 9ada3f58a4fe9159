//! Artifact builder.
//!
//! Turns a module path, a version and a source tree into the three objects
//! the read protocol serves: the `.info` metadata document, the `.mod`
//! manifest and the `.zip` archive. Building performs no store I/O; the
//! only reads are against the source tree.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::archive::{self, Archive};
use crate::config::ArchiveLimits;
use crate::error::BuildError;
use crate::integrity::{ArtifactDigest, DirHash};
use crate::manifest::{Manifest, MANIFEST_FILE};
use crate::path::ModulePath;
use crate::source::SourceTree;
use crate::version::ModuleVersion;

/// The `.info` metadata document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Canonical version, `v`-prefixed.
    #[serde(rename = "Version")]
    pub version: ModuleVersion,
    /// Publish time, RFC 3339 in UTC.
    #[serde(rename = "Time", with = "rfc3339_seconds")]
    pub time: DateTime<Utc>,
    /// Content digest of the manifest and archive.
    #[serde(rename = "Digest", default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<ArtifactDigest>,
}

impl VersionInfo {
    /// Encode as the stored JSON document.
    pub fn to_json(&self) -> Vec<u8> {
        // Serializing plain strings into a Vec cannot fail.
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Decode a stored JSON document.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// `Time` is always written as `2006-01-02T15:04:05Z`.
mod rfc3339_seconds {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&time.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|t| t.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// Everything published for one (module, version).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSet {
    /// Module the set belongs to.
    pub module: ModulePath,
    /// Metadata document.
    pub info: VersionInfo,
    /// Manifest text.
    pub manifest: Manifest,
    /// Archive.
    pub archive: Archive,
}

impl ArtifactSet {
    /// The published version.
    pub fn version(&self) -> &ModuleVersion {
        &self.info.version
    }

    /// Encoded `.info` bytes.
    pub fn info_bytes(&self) -> Vec<u8> {
        self.info.to_json()
    }

    /// The content digest stored with the metadata.
    pub fn digest(&self) -> Option<&ArtifactDigest> {
        self.info.digest.as_ref()
    }
}

/// Hash of a manifest, as Go computes it for `go.sum` `/go.mod` lines.
///
/// The manifest is hashed as a lone file named `go.mod`, without the
/// `<module>@<version>/` prefix archive entries carry.
pub fn manifest_digest(text: &[u8]) -> DirHash {
    DirHash::compute([(MANIFEST_FILE, text)])
}

/// Builds artifact sets.
#[derive(Debug, Clone, Default)]
pub struct ArtifactBuilder {
    limits: ArchiveLimits,
}

impl ArtifactBuilder {
    /// Create a builder enforcing the given archive limits.
    pub fn new(limits: ArchiveLimits) -> Self {
        ArtifactBuilder { limits }
    }

    /// Parse `version` and build the artifact set.
    pub fn build(
        &self,
        module: &ModulePath,
        version: &str,
        source: &dyn SourceTree,
        published_at: DateTime<Utc>,
    ) -> Result<ArtifactSet, BuildError> {
        let version = ModuleVersion::parse(version)?;
        self.build_version(module, &version, source, published_at)
    }

    /// Build the artifact set for an already parsed version.
    pub fn build_version(
        &self,
        module: &ModulePath,
        version: &ModuleVersion,
        source: &dyn SourceTree,
        published_at: DateTime<Utc>,
    ) -> Result<ArtifactSet, BuildError> {
        let version_str = version.to_string();
        let root_go_mod = source.read(MANIFEST_FILE)?;
        let manifest = Manifest::for_module(module, &version_str, root_go_mod.as_deref())?;
        let archive = archive::package(module.as_str(), &version_str, source, &self.limits)?;

        let digest = ArtifactDigest {
            manifest: manifest_digest(manifest.text.as_bytes()),
            archive: archive.digest.clone(),
        };

        // Sub-second precision is dropped so the stored document and the
        // in-memory value compare equal.
        let time = published_at.with_nanosecond(0).unwrap_or(published_at);

        Ok(ArtifactSet {
            module: module.clone(),
            info: VersionInfo {
                version: version.clone(),
                time,
                digest: Some(digest),
            },
            manifest,
            archive,
        })
    }
}
