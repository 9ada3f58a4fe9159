//! Per-module serialization and cross-module independence.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use modproxy_core::source::SourceError;
use modproxy_core::{
    MemorySource, ModulePath, ModuleProxy, ProxyConfig, SourceTree, UpdateCoordinator,
};
use modproxy_store::MemoryStore;

fn tree(module: &str) -> MemorySource {
    MemorySource::new()
        .with_file("go.mod", format!("module {module}\n"))
        .with_file("lib.go", "package lib\n")
}

/// A source tree that blocks its first enumeration until released.
struct GatedSource {
    inner: MemorySource,
    gate: Mutex<Option<mpsc::Receiver<()>>>,
}

impl GatedSource {
    fn new(inner: MemorySource) -> (Self, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        (
            GatedSource {
                inner,
                gate: Mutex::new(Some(rx)),
            },
            tx,
        )
    }
}

impl SourceTree for GatedSource {
    fn entries(&self) -> Result<Vec<String>, SourceError> {
        if let Some(rx) = self.gate.lock().unwrap().take() {
            rx.recv().unwrap();
        }
        self.inner.entries()
    }

    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, SourceError> {
        self.inner.read(path)
    }
}

fn setup() -> (Arc<MemoryStore>, UpdateCoordinator, ModuleProxy) {
    let store = Arc::new(MemoryStore::new());
    let config = ProxyConfig::default();
    (
        store.clone(),
        UpdateCoordinator::new(store.clone(), &config),
        ModuleProxy::new(store, &config),
    )
}

fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    panic!("condition never became true");
}

#[test]
fn concurrent_publishes_to_one_module_both_commit() {
    let (_store, coordinator, proxy) = setup();
    let module = "example.com/foo/bar";

    std::thread::scope(|s| {
        for version in ["0.0.125", "0.0.126"] {
            let coordinator = &coordinator;
            s.spawn(move || coordinator.publish(module, version, &tree(module)).unwrap());
        }
    });

    let listing = proxy.list_versions(module).unwrap();
    let mut lines: Vec<&str> = listing.lines().collect();
    assert_eq!(lines.len(), 2);
    lines.sort();
    assert_eq!(lines, vec!["v0.0.125", "v0.0.126"]);
    assert_eq!(proxy.latest_version(module).unwrap().to_string(), "v0.0.126");
}

#[test]
fn many_concurrent_publishes_never_lose_entries() {
    let (_store, coordinator, proxy) = setup();
    let module = "example.com/busy";

    std::thread::scope(|s| {
        for patch in 0..16 {
            let coordinator = &coordinator;
            s.spawn(move || {
                coordinator
                    .publish(module, &format!("1.0.{patch}"), &tree(module))
                    .unwrap()
            });
        }
    });

    let listing = proxy.list_versions(module).unwrap();
    let mut lines: Vec<&str> = listing.lines().collect();
    assert_eq!(lines.len(), 16);
    lines.sort();
    lines.dedup();
    assert_eq!(lines.len(), 16);
    for line in listing.lines() {
        assert!(proxy.get_archive(module, line).is_ok(), "{line}");
    }
}

#[test]
fn racing_duplicate_publish_commits_once() {
    let (_store, coordinator, proxy) = setup();
    let module = "example.com/dup";

    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let coordinator = &coordinator;
                s.spawn(move || coordinator.publish(module, "1.0.0", &tree(module)))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| e.is_already_published()));
    assert_eq!(proxy.list_versions(module).unwrap(), "v1.0.0\n");
}

#[test]
fn other_modules_publish_while_one_is_blocked() {
    let (_store, coordinator, proxy) = setup();
    let slow = "example.com/slow";
    let fast = "example.com/fast";
    let (gated, release) = GatedSource::new(tree(slow));

    std::thread::scope(|s| {
        let coordinator = &coordinator;
        let gated = &gated;
        let handle = s.spawn(move || coordinator.publish(slow, "1.0.0", gated));

        let slow_path = ModulePath::parse(slow).unwrap();
        wait_until(|| coordinator.sections().is_busy(&slow_path));

        // The slow module's section is held; an unrelated module proceeds.
        coordinator.publish(fast, "1.0.0", &tree(fast)).unwrap();
        assert_eq!(proxy.list_versions(fast).unwrap(), "v1.0.0\n");
        assert!(proxy.list_versions(slow).unwrap_err().is_not_found());

        release.send(()).unwrap();
        handle.join().unwrap().unwrap();
    });

    assert_eq!(proxy.list_versions(slow).unwrap(), "v1.0.0\n");
}

#[test]
fn same_module_waits_for_holder() {
    let (_store, coordinator, proxy) = setup();
    let module = "example.com/serial";
    let (gated, release) = GatedSource::new(tree(module));

    std::thread::scope(|s| {
        let coordinator = &coordinator;
        let gated = &gated;
        let first = s.spawn(move || coordinator.publish(module, "1.0.0", gated));

        let path = ModulePath::parse(module).unwrap();
        wait_until(|| coordinator.sections().is_busy(&path));

        let (done_tx, done_rx) = mpsc::channel();
        let second = s.spawn(move || {
            let result = coordinator.publish(module, "1.0.1", &tree(module));
            done_tx.send(()).unwrap();
            result
        });

        // The second publish cannot finish while the first holds the section.
        assert!(done_rx.recv_timeout(Duration::from_millis(100)).is_err());

        release.send(()).unwrap();
        first.join().unwrap().unwrap();
        second.join().unwrap().unwrap();
    });

    assert_eq!(proxy.list_versions(module).unwrap(), "v1.0.0\nv1.0.1\n");
}

#[test]
fn reads_never_see_a_torn_listing() {
    let (_store, coordinator, proxy) = setup();
    let module = "example.com/watched";
    coordinator.publish(module, "0.1.0", &tree(module)).unwrap();

    std::thread::scope(|s| {
        let coordinator = &coordinator;
        let writer = s.spawn(move || {
            for patch in 1..20 {
                coordinator
                    .publish(module, &format!("0.1.{patch}"), &tree(module))
                    .unwrap();
            }
        });

        while !writer.is_finished() {
            let listing = proxy.list_versions(module).unwrap();
            for line in listing.lines() {
                // Every listed version is fully readable.
                assert!(proxy.get_info(module, line).is_ok());
                assert!(proxy.get_manifest(module, line).is_ok());
                assert!(proxy.get_archive(module, line).is_ok());
            }
        }
    });

    assert_eq!(proxy.list_versions(module).unwrap().lines().count(), 20);
}
