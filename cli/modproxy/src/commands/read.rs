//! Read commands: list, info, latest, get, verify, modules.

use std::io::Write;

use anyhow::{bail, Context, Result};
use modproxy_core::ProxyConfig;

/// Run `modproxy list <module>`.
pub fn list(config: &ProxyConfig, module: &str) -> Result<()> {
    let listing = super::proxy(config)
        .list_versions(module)
        .with_context(|| format!("listing {module}"))?;
    print!("{listing}");
    Ok(())
}

/// Run `modproxy info <module> <version>`.
pub fn info(config: &ProxyConfig, module: &str, version: &str) -> Result<()> {
    let info = super::proxy(config)
        .info(module, version)
        .with_context(|| format!("reading {module}@{version}"))?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

/// Run `modproxy latest <module>`.
pub fn latest(config: &ProxyConfig, module: &str) -> Result<()> {
    let latest = super::proxy(config)
        .latest_version(module)
        .with_context(|| format!("resolving latest of {module}"))?;
    println!("{latest}");
    Ok(())
}

/// Run `modproxy get <path>`: the raw protocol body on stdout.
pub fn get(config: &ProxyConfig, path: &str) -> Result<()> {
    let response = super::proxy(config)
        .serve(path)
        .with_context(|| format!("serving {path}"))?;
    tracing::debug!(
        path,
        content_type = response.content_type,
        bytes = response.body.len(),
        "served"
    );
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&response.body)?;
    stdout.flush()?;
    Ok(())
}

/// Run `modproxy verify <module> <version>`.
pub fn verify(config: &ProxyConfig, module: &str, version: &str) -> Result<()> {
    let report = super::proxy(config)
        .verify(module, version)
        .with_context(|| format!("verifying {module}@{version}"))?;

    println!("{module}@{}", report.version);
    println!("  mod: {}", report.actual.manifest);
    println!("  zip: {}", report.actual.archive);
    match &report.recorded {
        _ if report.is_intact() => {
            println!("  ok");
            Ok(())
        }
        Some(recorded) => {
            if recorded.manifest != report.actual.manifest {
                println!("  recorded mod: {}", recorded.manifest);
            }
            if recorded.archive != report.actual.archive {
                println!("  recorded zip: {}", recorded.archive);
            }
            bail!("{module}@{} does not match its recorded digest", report.version)
        }
        None => bail!("{module}@{} has no recorded digest", report.version),
    }
}

/// Run `modproxy modules`.
pub fn modules(config: &ProxyConfig) -> Result<()> {
    let modules = super::proxy(config).modules().context("listing modules")?;
    if modules.is_empty() {
        println!("No modules published.");
    }
    for module in modules {
        println!("{module}");
    }
    Ok(())
}
