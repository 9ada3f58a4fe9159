//! Module manifests (`go.mod`).
//!
//! The manifest published for a version is the root `go.mod` of the source
//! tree, byte for byte. Trees without one get a synthesized manifest that
//! only names the module, matching what the Go toolchain assumes for
//! modules that predate `go.mod`.

use crate::error::BuildError;
use crate::path::ModulePath;

/// File name of the module descriptor at the root of a source tree.
pub const MANIFEST_FILE: &str = "go.mod";

/// A module manifest ready to be published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// Manifest text as published.
    pub text: String,
    /// Module path named by the `module` directive.
    pub module: String,
    /// Whether the text was synthesized because the tree had no `go.mod`.
    pub synthesized: bool,
}

impl Manifest {
    /// Parse a `go.mod` file and extract its module path.
    pub fn parse(bytes: &[u8]) -> Result<Self, String> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| format!("go.mod is not valid UTF-8: {e}"))?
            .to_string();
        let module = module_directive(&text).ok_or("go.mod has no module directive")?;
        Ok(Manifest {
            text,
            module,
            synthesized: false,
        })
    }

    /// The minimal manifest for a tree that has no `go.mod`.
    pub fn synthesize(module: &ModulePath) -> Self {
        Manifest {
            text: format!("module {module}\n"),
            module: module.to_string(),
            synthesized: true,
        }
    }

    /// Load the manifest for `module` from a root `go.mod`, if present.
    ///
    /// Fails when the file declares some other module.
    pub fn for_module(
        module: &ModulePath,
        version: &str,
        root_go_mod: Option<&[u8]>,
    ) -> Result<Self, BuildError> {
        let Some(bytes) = root_go_mod else {
            return Ok(Self::synthesize(module));
        };
        let manifest = Self::parse(bytes).map_err(|detail| BuildError::PackagingFailure {
            module: module.to_string(),
            version: version.to_string(),
            detail,
        })?;
        if manifest.module != module.as_str() {
            return Err(BuildError::ModulePathMismatch {
                expected: module.to_string(),
                declared: manifest.module,
            });
        }
        Ok(manifest)
    }
}

/// Find the path named by the `module` directive.
fn module_directive(text: &str) -> Option<String> {
    for line in text.lines() {
        let line = match line.find("//") {
            Some(idx) => &line[..idx],
            None => line,
        };
        let Some(rest) = line.trim().strip_prefix("module") else {
            continue;
        };
        if !rest.starts_with(char::is_whitespace) {
            continue;
        }
        let value = unquote(rest.trim());
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }
    None
}

fn unquote(s: &str) -> &str {
    for q in ['"', '`'] {
        if let Some(inner) = s.strip_prefix(q).and_then(|s| s.strip_suffix(q)) {
            return inner;
        }
    }
    s
}
