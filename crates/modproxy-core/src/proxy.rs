//! Read protocol handler.
//!
//! Serves the five read resources straight from stored objects. A version
//! is only visible once the catalog lists it; artifacts of uncommitted
//! publishes are never returned, even when they already exist in the store.

use std::sync::Arc;

use modproxy_store::ObjectStore;

use crate::archive::digest_archive;
use crate::builder::{manifest_digest, VersionInfo};
use crate::catalog::{render_listing, VersionCatalog};
use crate::config::{ProxyConfig, RetryConfig};
use crate::error::{NotFound, ReadError};
use crate::integrity::ArtifactDigest;
use crate::layout::{ArtifactKind, ModuleLayout};
use crate::path::{unescape, ModulePath};
use crate::retry::with_retry;
use crate::version::ModuleVersion;

/// A parsed read-surface request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyRequest {
    /// `<module>/@v/list`
    List(ModulePath),
    /// `<module>/@v/<version>.info|.mod|.zip`
    Artifact(ModulePath, ModuleVersion, ArtifactKind),
    /// `<module>/@latest`
    Latest(ModulePath),
}

impl ProxyRequest {
    /// Parse a case-escaped request path. A leading `/` is ignored.
    pub fn parse(path: &str) -> Result<Self, ReadError> {
        let bad = |detail: &str| ReadError::BadRequest {
            path: path.to_string(),
            detail: detail.to_string(),
        };
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        let module_of = |escaped: &str| {
            ModulePath::from_escaped(escaped).map_err(|e| ReadError::BadRequest {
                path: path.to_string(),
                detail: e.reason,
            })
        };

        if let Some(module) = trimmed.strip_suffix("/@latest") {
            return Ok(ProxyRequest::Latest(module_of(module)?));
        }

        let (module, file) = trimmed
            .rsplit_once("/@v/")
            .ok_or_else(|| bad("expected '<module>/@v/<file>' or '<module>/@latest'"))?;
        let module = module_of(module)?;
        if file == "list" {
            return Ok(ProxyRequest::List(module));
        }

        let (version, ext) = file
            .rsplit_once('.')
            .ok_or_else(|| bad("missing file extension"))?;
        let kind = ArtifactKind::from_extension(ext).ok_or_else(|| bad("unknown resource"))?;
        let version = unescape(version).map_err(|e| bad(&e.reason))?;
        let version = ModuleVersion::parse(&version).map_err(|e| bad(&e.to_string()))?;
        Ok(ProxyRequest::Artifact(module, version, kind))
    }
}

/// A served resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyResponse {
    /// MIME type.
    pub content_type: &'static str,
    /// Body bytes.
    pub body: Vec<u8>,
}

/// Result of re-hashing a stored version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityReport {
    /// Version checked.
    pub version: ModuleVersion,
    /// Digest recorded at publish time, if any.
    pub recorded: Option<ArtifactDigest>,
    /// Digest of the bytes currently stored.
    pub actual: ArtifactDigest,
}

impl IntegrityReport {
    /// Whether the stored bytes still match the recorded digest.
    pub fn is_intact(&self) -> bool {
        self.recorded.as_ref() == Some(&self.actual)
    }
}

/// Read-only view of the proxy.
pub struct ModuleProxy {
    store: Arc<dyn ObjectStore>,
    retry: RetryConfig,
    include_prerelease: bool,
}

impl ModuleProxy {
    /// Create a reader over `store`.
    pub fn new(store: Arc<dyn ObjectStore>, config: &ProxyConfig) -> Self {
        ModuleProxy {
            store,
            retry: config.retry,
            include_prerelease: config.catalog.include_prerelease_in_latest,
        }
    }

    fn catalog(&self) -> VersionCatalog<'_> {
        VersionCatalog::new(self.store.as_ref(), self.retry)
    }

    fn module(module: &str) -> Result<ModulePath, ReadError> {
        ModulePath::parse(module).map_err(|e| ReadError::BadRequest {
            path: module.to_string(),
            detail: e.reason,
        })
    }

    fn version(version: &str) -> Result<ModuleVersion, ReadError> {
        ModuleVersion::parse(version).map_err(|e| ReadError::BadRequest {
            path: version.to_string(),
            detail: e.to_string(),
        })
    }

    /// Committed versions, failing with `NotFound` for unknown modules.
    fn committed(&self, module: &ModulePath) -> Result<Vec<ModuleVersion>, ReadError> {
        self.catalog()
            .load(module)?
            .ok_or_else(|| {
                NotFound::Module {
                    module: module.to_string(),
                }
                .into()
            })
    }

    fn read_artifact(
        &self,
        module: &ModulePath,
        version: &ModuleVersion,
        kind: ArtifactKind,
    ) -> Result<Vec<u8>, ReadError> {
        if !self.committed(module)?.contains(version) {
            return Err(NotFound::Version {
                module: module.to_string(),
                version: version.to_string(),
            }
            .into());
        }
        let key = ModuleLayout::new(module).artifact_key(version, kind);
        self.fetch(&key)?.ok_or_else(|| ReadError::Corrupt {
            key,
            detail: "listed version is missing this artifact".to_string(),
        })
    }

    fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, ReadError> {
        with_retry(&self.retry, "read artifact", || self.store.get(key)).map_err(|e| {
            ReadError::StoreReadFailed {
                key: key.to_string(),
                attempts: e.attempts,
                source: e.error,
            }
        })
    }

    /// `<module>/@v/list`: one version per line, in publish order.
    pub fn list_versions(&self, module: &str) -> Result<String, ReadError> {
        let module = Self::module(module)?;
        Ok(render_listing(&self.committed(&module)?))
    }

    /// `<module>/@v/<version>.info` as stored.
    pub fn get_info(&self, module: &str, version: &str) -> Result<Vec<u8>, ReadError> {
        let module = Self::module(module)?;
        let version = Self::version(version)?;
        self.read_artifact(&module, &version, ArtifactKind::Info)
    }

    /// `<module>/@v/<version>.info`, decoded.
    pub fn info(&self, module: &str, version: &str) -> Result<VersionInfo, ReadError> {
        let module_path = Self::module(module)?;
        let version = Self::version(version)?;
        let bytes = self.read_artifact(&module_path, &version, ArtifactKind::Info)?;
        decode_info(&module_path, &version, &bytes)
    }

    /// `<module>/@v/<version>.mod`.
    pub fn get_manifest(&self, module: &str, version: &str) -> Result<String, ReadError> {
        let module_path = Self::module(module)?;
        let version = Self::version(version)?;
        let bytes = self.read_artifact(&module_path, &version, ArtifactKind::Mod)?;
        String::from_utf8(bytes).map_err(|e| ReadError::Corrupt {
            key: ModuleLayout::new(&module_path).artifact_key(&version, ArtifactKind::Mod),
            detail: e.to_string(),
        })
    }

    /// `<module>/@v/<version>.zip`.
    pub fn get_archive(&self, module: &str, version: &str) -> Result<Vec<u8>, ReadError> {
        let module = Self::module(module)?;
        let version = Self::version(version)?;
        self.read_artifact(&module, &version, ArtifactKind::Zip)
    }

    /// The version `@latest` resolves to.
    pub fn latest_version(&self, module: &str) -> Result<ModuleVersion, ReadError> {
        let module = Self::module(module)?;
        Ok(self.catalog().resolve_latest(&module, self.include_prerelease)?)
    }

    /// `<module>/@latest`: the metadata document of the latest version.
    ///
    /// Resolved from the catalog, so it is correct even if the stored
    /// pointer object lags behind.
    pub fn get_latest(&self, module: &str) -> Result<Vec<u8>, ReadError> {
        let module_path = Self::module(module)?;
        let latest = self
            .catalog()
            .resolve_latest(&module_path, self.include_prerelease)?;
        self.read_artifact(&module_path, &latest, ArtifactKind::Info)
    }

    /// Serve a raw, case-escaped request path.
    pub fn serve(&self, path: &str) -> Result<ProxyResponse, ReadError> {
        match ProxyRequest::parse(path)? {
            ProxyRequest::List(module) => Ok(ProxyResponse {
                content_type: "text/plain; charset=utf-8",
                body: render_listing(&self.committed(&module)?).into_bytes(),
            }),
            ProxyRequest::Latest(module) => {
                let latest = self
                    .catalog()
                    .resolve_latest(&module, self.include_prerelease)?;
                Ok(ProxyResponse {
                    content_type: ArtifactKind::Info.content_type(),
                    body: self.read_artifact(&module, &latest, ArtifactKind::Info)?,
                })
            }
            ProxyRequest::Artifact(module, version, kind) => Ok(ProxyResponse {
                content_type: kind.content_type(),
                body: self.read_artifact(&module, &version, kind)?,
            }),
        }
    }

    /// Every module that has a listing, sorted.
    pub fn modules(&self) -> Result<Vec<ModulePath>, ReadError> {
        let keys = with_retry(&self.retry, "list modules", || self.store.list("")).map_err(
            |e| ReadError::StoreReadFailed {
                key: String::new(),
                attempts: e.attempts,
                source: e.error,
            },
        )?;
        let mut modules: Vec<ModulePath> = keys
            .iter()
            .filter_map(|k| k.strip_suffix("/@v/list"))
            .filter_map(|escaped| ModulePath::from_escaped(escaped).ok())
            .collect();
        modules.sort();
        Ok(modules)
    }

    /// Re-hash a committed version's manifest and archive.
    pub fn verify(&self, module: &str, version: &str) -> Result<IntegrityReport, ReadError> {
        let module_path = Self::module(module)?;
        let version = Self::version(version)?;

        let info_bytes = self.read_artifact(&module_path, &version, ArtifactKind::Info)?;
        let info = decode_info(&module_path, &version, &info_bytes)?;
        let manifest = self.read_artifact(&module_path, &version, ArtifactKind::Mod)?;
        let archive = self.read_artifact(&module_path, &version, ArtifactKind::Zip)?;

        let archive_hash = digest_archive(&archive).map_err(|detail| ReadError::Corrupt {
            key: ModuleLayout::new(&module_path).artifact_key(&version, ArtifactKind::Zip),
            detail,
        })?;

        Ok(IntegrityReport {
            actual: ArtifactDigest {
                manifest: manifest_digest(&manifest),
                archive: archive_hash,
            },
            recorded: info.digest,
            version,
        })
    }
}

fn decode_info(
    module: &ModulePath,
    version: &ModuleVersion,
    bytes: &[u8],
) -> Result<VersionInfo, ReadError> {
    VersionInfo::from_json(bytes).map_err(|e| ReadError::Corrupt {
        key: ModuleLayout::new(module).artifact_key(version, ArtifactKind::Info),
        detail: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::UpdateCoordinator;
    use crate::source::MemorySource;
    use modproxy_store::MemoryStore;

    const MODULE: &str = "example.com/foo/bar";

    fn setup() -> (Arc<MemoryStore>, UpdateCoordinator, ModuleProxy) {
        let store = Arc::new(MemoryStore::new());
        let config = ProxyConfig::default();
        let coordinator = UpdateCoordinator::new(store.clone(), &config);
        let proxy = ModuleProxy::new(store.clone(), &config);
        (store, coordinator, proxy)
    }

    fn tree() -> MemorySource {
        MemorySource::new()
            .with_file("go.mod", format!("module {MODULE}\n"))
            .with_file("bar.go", "package bar\n")
    }

    #[test]
    fn parse_request_paths() {
        let m = ModulePath::parse("github.com/Azure/sdk").unwrap();
        assert_eq!(
            ProxyRequest::parse("/github.com/!azure/sdk/@v/list").unwrap(),
            ProxyRequest::List(m.clone())
        );
        assert_eq!(
            ProxyRequest::parse("github.com/!azure/sdk/@latest").unwrap(),
            ProxyRequest::Latest(m.clone())
        );
        assert_eq!(
            ProxyRequest::parse("github.com/!azure/sdk/@v/v1.0.0-!r!c1.zip").unwrap(),
            ProxyRequest::Artifact(
                m,
                ModuleVersion::parse("1.0.0-RC1").unwrap(),
                ArtifactKind::Zip
            )
        );
    }

    #[test]
    fn reject_bad_request_paths() {
        for p in [
            "example.com/foo",
            "example.com/foo/@v/v1.0.0",
            "example.com/foo/@v/v1.0.0.tar",
            "example.com/foo/@v/banana.zip",
            "github.com/Azure/sdk/@v/list",
        ] {
            assert!(
                matches!(ProxyRequest::parse(p), Err(ReadError::BadRequest { .. })),
                "{p}"
            );
        }
    }

    #[test]
    fn not_found_distinguishes_module_and_version() {
        let (_store, coordinator, proxy) = setup();
        let err = proxy.get_info(MODULE, "1.0.0").unwrap_err();
        assert!(matches!(err, ReadError::NotFound(NotFound::Module { .. })));

        coordinator.publish(MODULE, "1.0.0", &tree()).unwrap();
        let err = proxy.get_info(MODULE, "2.0.0").unwrap_err();
        assert!(matches!(err, ReadError::NotFound(NotFound::Version { .. })));
        assert!(proxy.list_versions("example.com/unknown").unwrap_err().is_not_found());
        assert!(proxy.get_latest("example.com/unknown").unwrap_err().is_not_found());
    }

    #[test]
    fn uncommitted_artifacts_are_invisible() {
        let (store, coordinator, proxy) = setup();
        coordinator.publish(MODULE, "1.0.0", &tree()).unwrap();
        store
            .put("example.com/foo/bar/@v/v1.1.0.zip", b"half-published")
            .unwrap();

        assert!(proxy.get_archive(MODULE, "1.1.0").unwrap_err().is_not_found());
        assert!(proxy
            .serve("example.com/foo/bar/@v/v1.1.0.zip")
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn serve_matches_typed_reads() {
        let (_store, coordinator, proxy) = setup();
        coordinator.publish(MODULE, "1.0.0", &tree()).unwrap();

        let list = proxy.serve("/example.com/foo/bar/@v/list").unwrap();
        assert_eq!(list.body, b"v1.0.0\n");

        let zip = proxy.serve("example.com/foo/bar/@v/v1.0.0.zip").unwrap();
        assert_eq!(zip.content_type, "application/zip");
        assert_eq!(zip.body, proxy.get_archive(MODULE, "v1.0.0").unwrap());

        let latest = proxy.serve("example.com/foo/bar/@latest").unwrap();
        assert_eq!(latest.body, proxy.get_info(MODULE, "1.0.0").unwrap());

        let manifest = proxy.get_manifest(MODULE, "1.0.0").unwrap();
        assert_eq!(manifest, format!("module {MODULE}\n"));
    }

    #[test]
    fn missing_artifact_of_listed_version_is_corrupt() {
        let (store, coordinator, proxy) = setup();
        coordinator.publish(MODULE, "1.0.0", &tree()).unwrap();
        store.delete("example.com/foo/bar/@v/v1.0.0.mod").unwrap();

        assert!(matches!(
            proxy.get_manifest(MODULE, "1.0.0"),
            Err(ReadError::Corrupt { .. })
        ));
    }

    #[test]
    fn verify_detects_tampering() {
        let (store, coordinator, proxy) = setup();
        coordinator.publish(MODULE, "1.0.0", &tree()).unwrap();
        assert!(proxy.verify(MODULE, "1.0.0").unwrap().is_intact());

        store
            .put("example.com/foo/bar/@v/v1.0.0.mod", b"module example.com/evil\n")
            .unwrap();
        let report = proxy.verify(MODULE, "1.0.0").unwrap();
        assert!(!report.is_intact());
        assert_ne!(
            report.recorded.unwrap().manifest,
            report.actual.manifest
        );
    }

    #[test]
    fn modules_lists_published_paths() {
        let (_store, coordinator, proxy) = setup();
        assert!(proxy.modules().unwrap().is_empty());
        coordinator.publish(MODULE, "1.0.0", &tree()).unwrap();
        coordinator
            .publish(
                "github.com/Azure/sdk",
                "0.1.0",
                &MemorySource::new().with_file("a.go", "package a\n"),
            )
            .unwrap();

        let modules: Vec<String> = proxy.modules().unwrap().iter().map(|m| m.to_string()).collect();
        assert_eq!(modules, vec!["example.com/foo/bar", "github.com/Azure/sdk"]);
    }
}
