//! Locating and loading `modproxy.toml`.

use std::path::Path;

use anyhow::{Context, Result};
use modproxy_core::ProxyConfig;

/// File name looked up in the working directory.
pub const CONFIG_FILE: &str = "modproxy.toml";

/// Resolve the effective configuration.
///
/// An explicit `--config` must exist. Otherwise `modproxy.toml` in `cwd` is
/// used when present, and built-in defaults when not. `--store` replaces
/// `store.root` either way.
pub fn load(cwd: &Path, explicit: Option<&Path>, store: Option<&Path>) -> Result<ProxyConfig> {
    let mut config = match explicit {
        Some(path) => ProxyConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => {
            let path = cwd.join(CONFIG_FILE);
            if path.is_file() {
                ProxyConfig::load(&path)
                    .with_context(|| format!("loading configuration from {}", path.display()))?
            } else {
                ProxyConfig::default()
            }
        }
    };

    if let Some(root) = store {
        config.store.root = root.to_path_buf();
    }
    if config.store.root.is_relative() {
        config.store.root = cwd.join(&config.store.root);
    }
    tracing::debug!(root = %config.store.root.display(), "store root resolved");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(dir.path(), None, None).unwrap();
        assert_eq!(config.store.root, dir.path().join("goproxy"));
        assert_eq!(config.retry.attempts, 3);
    }

    #[test]
    fn picks_up_file_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[store]\nroot = \"/srv/goproxy\"\n\n[retry]\nattempts = 5\n",
        )
        .unwrap();
        let config = load(dir.path(), None, None).unwrap();
        assert_eq!(config.store.root, Path::new("/srv/goproxy"));
        assert_eq!(config.retry.attempts, 5);
    }

    #[test]
    fn store_flag_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[store]\nroot = \"a\"\n").unwrap();
        let config = load(dir.path(), None, Some(Path::new("b"))).unwrap();
        assert_eq!(config.store.root, dir.path().join("b"));
    }

    #[test]
    fn explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(dir.path(), Some(&dir.path().join("missing.toml")), None).unwrap_err();
        assert!(format!("{err:#}").contains("missing.toml"));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[retry]\nattempts = 0\n").unwrap();
        assert!(load(dir.path(), Some(&path), None).is_err());
    }
}
