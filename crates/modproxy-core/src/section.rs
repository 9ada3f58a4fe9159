//! Per-module exclusive sections.
//!
//! At most one mutating operation runs per module path at a time. Sections
//! for different modules never wait on each other; the shared set is only
//! locked for the instant it takes to claim or release a path.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::path::ModulePath;

/// The set of modules currently being mutated.
#[derive(Debug, Default)]
pub struct ModuleSections {
    busy: Mutex<HashSet<ModulePath>>,
    released: Condvar,
}

impl ModuleSections {
    /// Create an empty set of sections.
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `module` is free, then claim it.
    ///
    /// The claim is released when the returned guard is dropped.
    pub fn enter(&self, module: &ModulePath) -> SectionGuard<'_> {
        let mut busy = self.lock();
        while busy.contains(module) {
            trace!(%module, "waiting for module section");
            busy = self
                .released
                .wait(busy)
                .unwrap_or_else(PoisonError::into_inner);
        }
        busy.insert(module.clone());
        SectionGuard {
            sections: self,
            module: module.clone(),
        }
    }

    /// Claim `module` only if nobody holds it.
    #[cfg(test)]
    fn try_enter(&self, module: &ModulePath) -> Option<SectionGuard<'_>> {
        let mut busy = self.lock();
        if !busy.insert(module.clone()) {
            return None;
        }
        Some(SectionGuard {
            sections: self,
            module: module.clone(),
        })
    }

    /// Whether some operation currently holds `module`.
    pub fn is_busy(&self, module: &ModulePath) -> bool {
        self.lock().contains(module)
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<ModulePath>> {
        // The set is consistent after every operation, so a poisoned lock
        // is still usable.
        self.busy.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive claim on one module.
#[derive(Debug)]
pub struct SectionGuard<'a> {
    sections: &'a ModuleSections,
    module: ModulePath,
}

impl Drop for SectionGuard<'_> {
    fn drop(&mut self) {
        self.sections.lock().remove(&self.module);
        self.sections.released.notify_all();
    }
}
