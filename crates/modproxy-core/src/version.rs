//! Module versions and latest resolution.
//!
//! Wraps the `semver` crate. The Go toolchain spells versions with a
//! leading `v`; input is accepted with or without it and always rendered
//! with it.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::BuildError;

/// A published module version, e.g. `v0.0.123`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleVersion(semver::Version);

impl ModuleVersion {
    /// Parse `1.2.3`, `v1.2.3`, `v1.2.3-rc.1+build.5`, ...
    pub fn parse(s: &str) -> Result<Self, BuildError> {
        let bare = s.strip_prefix('v').unwrap_or(s);
        semver::Version::parse(bare)
            .map(ModuleVersion)
            .map_err(|e| BuildError::InvalidVersion {
                version: s.to_string(),
                detail: e.to_string(),
            })
    }

    /// The underlying semantic version.
    pub fn semver(&self) -> &semver::Version {
        &self.0
    }

    /// Whether this is a pre-release (`-alpha`, `-rc.1`, ...).
    pub fn is_prerelease(&self) -> bool {
        !self.0.pre.is_empty()
    }

    /// Compare by semantic-version precedence, ignoring build metadata.
    pub fn cmp_precedence(&self, other: &Self) -> Ordering {
        let a = &self.0;
        let b = &other.0;
        (a.major, a.minor, a.patch)
            .cmp(&(b.major, b.minor, b.patch))
            .then_with(|| a.pre.cmp(&b.pre))
    }
}

impl fmt::Display for ModuleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl FromStr for ModuleVersion {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ModuleVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ModuleVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ModuleVersion::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Pick the version reported as "latest" from a publish-ordered list.
///
/// The highest-precedence release wins; when several share that
/// precedence (differing only in build metadata) the most recently
/// published one wins. Pre-releases are only candidates when
/// `include_prerelease` is set. If nothing qualifies the most recently
/// published entry is returned; an empty list yields `None`.
pub fn resolve_latest(
    published: &[ModuleVersion],
    include_prerelease: bool,
) -> Option<&ModuleVersion> {
    let mut best: Option<&ModuleVersion> = None;
    for candidate in published {
        if candidate.is_prerelease() && !include_prerelease {
            continue;
        }
        // `>=` so that later entries win ties.
        if best.map_or(true, |b| candidate.cmp_precedence(b) != Ordering::Less) {
            best = Some(candidate);
        }
    }
    best.or_else(|| published.last())
}
