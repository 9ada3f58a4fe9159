//! CLI command implementations.

pub mod publish;
pub mod read;

use std::sync::Arc;

use modproxy_core::{ModuleProxy, ProxyConfig, UpdateCoordinator};
use modproxy_store::{FsStore, ObjectStore};

/// Open the filesystem store named by the configuration.
fn open_store(config: &ProxyConfig) -> Arc<dyn ObjectStore> {
    Arc::new(FsStore::new(&config.store.root))
}

/// The write side over the configured store.
pub fn coordinator(config: &ProxyConfig) -> UpdateCoordinator {
    UpdateCoordinator::new(open_store(config), config)
}

/// The read side over the configured store.
pub fn proxy(config: &ProxyConfig) -> ModuleProxy {
    ModuleProxy::new(open_store(config), config)
}
