//! Module paths and the protocol's case-escaping rule.
//!
//! Module paths are case-sensitive, but backing stores may not be. Every
//! store key therefore carries the escaped form, in which each uppercase
//! ASCII letter `X` is written as `!x`:
//! `github.com/Azure/azure-sdk` → `github.com/!azure/azure-sdk`.

use std::fmt;
use std::str::FromStr;

use crate::error::PathError;

/// A validated module path such as `example.com/foo/bar`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModulePath(String);

impl ModulePath {
    /// Validate and wrap a module path.
    pub fn parse(path: &str) -> Result<Self, PathError> {
        let reject = |reason: &str| {
            Err(PathError {
                path: path.to_string(),
                reason: reason.to_string(),
            })
        };

        if path.is_empty() {
            return reject("empty path");
        }
        if path.starts_with('/') || path.ends_with('/') {
            return reject("leading or trailing slash");
        }

        for (i, elem) in path.split('/').enumerate() {
            if elem.is_empty() {
                return reject("empty path element");
            }
            if elem == "." || elem == ".." {
                return reject("relative path element");
            }
            if elem.starts_with('.') || elem.ends_with('.') {
                return reject("path element begins or ends with a dot");
            }
            if let Some(c) = elem.chars().find(|c| !is_path_char(*c)) {
                return reject(&format!("invalid character {c:?}"));
            }
            if i == 0 && !elem.contains('.') {
                return reject("first path element must be a host name containing a dot");
            }
        }

        Ok(ModulePath(path.to_string()))
    }

    /// Decode an escaped module path as found in a store key.
    pub fn from_escaped(escaped: &str) -> Result<Self, PathError> {
        Self::parse(&unescape(escaped)?)
    }

    /// The path as published.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The case-escaped form used in store keys.
    pub fn escaped(&self) -> String {
        escape(&self.0)
    }
}

fn is_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~')
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ModulePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Case-escape a path or version: `X` → `!x`.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_ascii_uppercase() {
            out.push('!');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Reverse [`escape`].
///
/// Rejects raw uppercase letters and any `!` not followed by a lowercase
/// ASCII letter, so every escaped form has exactly one decoding.
pub fn unescape(s: &str) -> Result<String, PathError> {
    let reject = |reason: &str| PathError {
        path: s.to_string(),
        reason: reason.to_string(),
    };

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            '!' => match chars.next() {
                Some(n) if n.is_ascii_lowercase() => out.push(n.to_ascii_uppercase()),
                _ => return Err(reject("'!' must be followed by a lowercase letter")),
            },
            c if c.is_ascii_uppercase() => {
                return Err(reject("unescaped uppercase letter"));
            }
            c => out.push(c),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_paths() {
        for p in [
            "example.com/foo/bar",
            "github.com/Azure/azure-sdk-for-go",
            "gopkg.in/yaml.v3",
            "golang.org/x/tools",
            "example.com/foo/v2",
        ] {
            assert!(ModulePath::parse(p).is_ok(), "{p}");
        }
    }

    #[test]
    fn rejects_malformed_paths() {
        for p in [
            "",
            "/example.com/foo",
            "example.com/foo/",
            "example.com//foo",
            "example.com/../foo",
            "example.com/.hidden",
            "localhost/foo",
            "example.com/foo bar",
            "example.com/f!oo",
        ] {
            assert!(ModulePath::parse(p).is_err(), "{p}");
        }
    }

    #[test]
    fn escape_uppercase() {
        assert_eq!(
            escape("github.com/Azure/azure-sdk"),
            "github.com/!azure/azure-sdk"
        );
        assert_eq!(escape("v1.0.0-RC1"), "v1.0.0-!r!c1");
        assert_eq!(escape("example.com/foo"), "example.com/foo");
    }

    #[test]
    fn unescape_inverts_escape() {
        let original = "github.com/BurntSushi/TOML";
        assert_eq!(unescape(&escape(original)).unwrap(), original);
    }

    #[test]
    fn unescape_rejects_ambiguous_input() {
        assert!(unescape("github.com/Azure").is_err());
        assert!(unescape("github.com/!").is_err());
        assert!(unescape("github.com/!1").is_err());
    }

    #[test]
    fn module_path_escaping() {
        let path = ModulePath::parse("github.com/Azure/sdk").unwrap();
        assert_eq!(path.escaped(), "github.com/!azure/sdk");
        assert_eq!(ModulePath::from_escaped("github.com/!azure/sdk").unwrap(), path);
        assert_eq!(path.to_string(), "github.com/Azure/sdk");
    }
}
