//! Update coordinator: the only writer of catalogs and artifact sets.
//!
//! A publish runs inside the module's exclusive section and writes in a
//! fixed order:
//!
//! 1. check the catalog; a listed version fails fast with `AlreadyPublished`
//! 2. build the artifact set (no store I/O)
//! 3. store `.mod`, `.zip`, `.info`
//! 4. append the version to the catalog (the commit point)
//! 5. rewrite the `@latest` pointer
//!
//! A crash before step 4 leaves unreferenced artifacts, which readers never
//! see and [`UpdateCoordinator::sweep_orphans`] may remove. A catalog entry
//! never points at missing artifacts.

use std::collections::HashSet;
use std::sync::Arc;

use modproxy_store::ObjectStore;
use tracing::{debug, info, warn};

use crate::builder::{ArtifactBuilder, ArtifactSet, VersionInfo};
use crate::catalog::{AppendOutcome, VersionCatalog};
use crate::clock::{Clock, SystemClock};
use crate::config::{ProxyConfig, RetryConfig};
use crate::error::{BuildError, PublishError};
use crate::layout::{ArtifactKind, ModuleLayout};
use crate::path::{escape, ModulePath};
use crate::retry::with_retry;
use crate::section::ModuleSections;
use crate::source::SourceTree;
use crate::version::{self, ModuleVersion};

/// A committed publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishResult {
    /// Module published to.
    pub module: ModulePath,
    /// Metadata document now served for the version.
    pub info: VersionInfo,
    /// Latest version after this publish.
    pub latest: ModuleVersion,
    /// Whether the `@latest` pointer object was rewritten. The catalog is
    /// authoritative either way.
    pub latest_pointer_written: bool,
}

impl PublishResult {
    /// The version that was published.
    pub fn version(&self) -> &ModuleVersion {
        &self.info.version
    }
}

/// What an orphan sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Keys deleted because their version is not in the catalog.
    pub removed: Vec<String>,
    /// Artifact keys left in place because they are referenced.
    pub retained: usize,
}

/// Serializes publishes per module and performs the ordered writes.
pub struct UpdateCoordinator {
    store: Arc<dyn ObjectStore>,
    builder: ArtifactBuilder,
    retry: RetryConfig,
    include_prerelease: bool,
    clock: Arc<dyn Clock>,
    sections: ModuleSections,
}

impl UpdateCoordinator {
    /// Create a coordinator writing to `store`.
    pub fn new(store: Arc<dyn ObjectStore>, config: &ProxyConfig) -> Self {
        UpdateCoordinator {
            store,
            builder: ArtifactBuilder::new(config.archive),
            retry: config.retry,
            include_prerelease: config.catalog.include_prerelease_in_latest,
            clock: Arc::new(SystemClock),
            sections: ModuleSections::new(),
        }
    }

    /// Replace the clock used for publish timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The exclusive sections, for inspection.
    pub fn sections(&self) -> &ModuleSections {
        &self.sections
    }

    fn catalog(&self) -> VersionCatalog<'_> {
        VersionCatalog::new(self.store.as_ref(), self.retry)
    }

    /// Publish `version` of `module` from `source`.
    pub fn publish(
        &self,
        module: &str,
        version: &str,
        source: &dyn SourceTree,
    ) -> Result<PublishResult, PublishError> {
        let build_failed = |source: BuildError| PublishError::BuildFailed {
            module: module.to_string(),
            version: version.to_string(),
            source,
        };
        let module = ModulePath::parse(module)?;
        let version = ModuleVersion::parse(version).map_err(build_failed)?;

        let _section = self.sections.enter(&module);
        debug!(%module, %version, "entered module section");

        let catalog = self.catalog();
        if catalog.contains(&module, &version)? {
            return Err(PublishError::AlreadyPublished {
                module: module.to_string(),
                version: version.to_string(),
            });
        }

        let set = self
            .builder
            .build_version(&module, &version, source, self.clock.now())
            .map_err(build_failed)?;

        let layout = ModuleLayout::new(&module);
        self.write_artifacts(&layout, &set)?;

        match catalog.append(&module, &version)? {
            AppendOutcome::Appended => {}
            AppendOutcome::AlreadyPublished => {
                // Another process sharing the store committed first.
                return Err(PublishError::AlreadyPublished {
                    module: module.to_string(),
                    version: version.to_string(),
                });
            }
        }

        let versions = catalog.list(&module)?;
        let latest = version::resolve_latest(&versions, self.include_prerelease)
            .cloned()
            .unwrap_or_else(|| version.clone());
        let latest_pointer_written = self.write_latest_pointer(&layout, &latest, &set);

        info!(
            %module,
            %version,
            %latest,
            zip_bytes = set.archive.bytes.len(),
            "published module version"
        );

        Ok(PublishResult {
            module,
            info: set.info,
            latest,
            latest_pointer_written,
        })
    }

    fn write_artifacts(&self, layout: &ModuleLayout, set: &ArtifactSet) -> Result<(), PublishError> {
        let info = set.info_bytes();
        for kind in ArtifactKind::ALL {
            let key = layout.artifact_key(set.version(), kind);
            let data: &[u8] = match kind {
                ArtifactKind::Mod => set.manifest.text.as_bytes(),
                ArtifactKind::Zip => &set.archive.bytes,
                ArtifactKind::Info => &info,
            };
            with_retry(&self.retry, "write artifact", || self.store.put(&key, data)).map_err(
                |e| PublishError::StoreWriteFailed {
                    key: key.clone(),
                    attempts: e.attempts,
                    source: e.error,
                },
            )?;
            debug!(key = key.as_str(), bytes = data.len(), "artifact stored");
        }
        Ok(())
    }

    /// Rewrite `@latest`. Failures are logged, not returned: the publish has
    /// already committed and readers resolve latest from the catalog.
    fn write_latest_pointer(
        &self,
        layout: &ModuleLayout,
        latest: &ModuleVersion,
        set: &ArtifactSet,
    ) -> bool {
        let key = layout.latest_key();
        let document = if latest == set.version() {
            set.info_bytes()
        } else {
            let info_key = layout.artifact_key(latest, ArtifactKind::Info);
            match with_retry(&self.retry, "read latest info", || self.store.get(&info_key)) {
                Ok(Some(bytes)) => bytes,
                Ok(None) => {
                    warn!(key = info_key.as_str(), "latest version has no metadata document");
                    return false;
                }
                Err(e) => {
                    warn!(key = info_key.as_str(), error = %e.error, "cannot read latest metadata");
                    return false;
                }
            }
        };

        match with_retry(&self.retry, "write latest pointer", || {
            self.store.put(&key, &document)
        }) {
            Ok(()) => true,
            Err(e) => {
                warn!(key = key.as_str(), error = %e.error, "latest pointer not updated");
                false
            }
        }
    }

    /// Delete artifacts of versions that never reached the catalog.
    ///
    /// Runs inside the module's section, so an in-flight publish of the
    /// same module cannot lose its freshly written artifacts. Unparseable
    /// file names under `@v/` are left alone.
    pub fn sweep_orphans(&self, module: &str) -> Result<SweepReport, PublishError> {
        let module = ModulePath::parse(module)?;
        let _section = self.sections.enter(&module);

        let layout = ModuleLayout::new(&module);
        let prefix = layout.version_prefix();
        let committed: HashSet<String> = self
            .catalog()
            .list(&module)?
            .iter()
            .map(|v| escape(&v.to_string()))
            .collect();

        let keys = with_retry(&self.retry, "list artifacts", || self.store.list(&prefix))
            .map_err(|e| PublishError::StoreReadFailed {
                key: prefix.clone(),
                attempts: e.attempts,
                source: e.error,
            })?;

        let mut report = SweepReport::default();
        for key in keys {
            let Some((version, _kind)) = layout.parse_artifact_key(&key) else {
                continue;
            };
            if committed.contains(version) {
                report.retained += 1;
                continue;
            }
            with_retry(&self.retry, "delete orphan", || self.store.delete(&key)).map_err(
                |e| PublishError::StoreWriteFailed {
                    key: key.clone(),
                    attempts: e.attempts,
                    source: e.error,
                },
            )?;
            warn!(%module, key = key.as_str(), "removed orphaned artifact");
            report.removed.push(key);
        }
        Ok(report)
    }
}
