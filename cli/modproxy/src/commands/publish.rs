//! `modproxy publish` and `modproxy sweep`.

use std::path::Path;

use anyhow::{bail, Context, Result};
use modproxy_core::DirSource;

/// Run `modproxy publish <module> <version> --source <dir>`.
pub fn run(
    config: &modproxy_core::ProxyConfig,
    module: &str,
    version: &str,
    source: &Path,
) -> Result<()> {
    if !source.is_dir() {
        bail!("source directory not found: {}", source.display());
    }

    let coordinator = super::coordinator(config);
    let result = coordinator
        .publish(module, version, &DirSource::new(source))
        .with_context(|| format!("publishing {module}@{version}"))?;

    println!("Published {}@{}", result.module, result.version());
    println!("  time:   {}", result.info.time.format("%Y-%m-%dT%H:%M:%SZ"));
    if let Some(digest) = &result.info.digest {
        println!("  mod:    {}", digest.manifest);
        println!("  zip:    {}", digest.archive);
    }
    println!("  latest: {}", result.latest);
    if !result.latest_pointer_written {
        eprintln!("warning: @latest pointer not updated; readers fall back to the version list");
    }
    Ok(())
}

/// Run `modproxy sweep <module>`.
pub fn sweep(config: &modproxy_core::ProxyConfig, module: &str) -> Result<()> {
    let coordinator = super::coordinator(config);
    let report = coordinator
        .sweep_orphans(module)
        .with_context(|| format!("sweeping {module}"))?;

    if report.removed.is_empty() {
        println!("No orphaned artifacts ({} retained).", report.retained);
    } else {
        println!("Removed {} orphaned artifact(s):", report.removed.len());
        for key in &report.removed {
            println!("  {key}");
        }
    }
    Ok(())
}
