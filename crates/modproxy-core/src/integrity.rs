//! Content digests for published artifacts.
//!
//! Two forms are used:
//! - [`ContentHash`]: a plain SHA-256 hex digest of one blob
//! - [`DirHash`]: the Go toolchain's `h1:` hash over a set of named files,
//!   the value clients record in `go.sum`

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of one file, the per-line hash of a [`DirHash`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn compute(data: &[u8]) -> Self {
        ContentHash(format!("{:x}", Sha256::digest(data)))
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An `h1:` directory hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirHash(String);

impl DirHash {
    /// Hash a set of `(name, contents)` files.
    ///
    /// Each file contributes the line `"<sha256-hex>  <name>\n"`; lines are
    /// hashed in name order, so input order does not matter.
    pub fn compute<'a, I>(files: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a [u8])>,
    {
        Self::from_hashes(
            files
                .into_iter()
                .map(|(name, data)| (name.to_string(), ContentHash::compute(data)))
                .collect(),
        )
    }

    /// Summarize files whose individual hashes are already known.
    pub fn from_hashes(mut files: Vec<(String, ContentHash)>) -> Self {
        files.sort_by(|a, b| a.0.cmp(&b.0));

        let mut summary = Sha256::new();
        for (name, hash) in &files {
            summary.update(format!("{hash}  {name}\n").as_bytes());
        }
        let encoded = base64::engine::general_purpose::STANDARD.encode(summary.finalize());
        DirHash(format!("h1:{encoded}"))
    }

    /// Get the string representation, including the `h1:` prefix.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DirHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Digests stored with a version's metadata document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDigest {
    /// Hash of the manifest, as the single file `go.mod`.
    #[serde(rename = "Mod")]
    pub manifest: DirHash,
    /// Hash of every file inside the archive.
    #[serde(rename = "Zip")]
    pub archive: DirHash,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dir_hash_is_order_independent() {
        let a = DirHash::compute([("m@v1.0.0/a.go", &b"a"[..]), ("m@v1.0.0/b.go", &b"b"[..])]);
        let b = DirHash::compute([("m@v1.0.0/b.go", &b"b"[..]), ("m@v1.0.0/a.go", &b"a"[..])]);
        assert_eq!(a, b);
        assert!(a.as_str().starts_with("h1:"));
    }

    #[test]
    fn dir_hash_sensitive_to_names_and_content() {
        let base = DirHash::compute([("m@v1.0.0/a.go", &b"a"[..])]);
        let renamed = DirHash::compute([("m@v1.0.0/c.go", &b"a"[..])]);
        let edited = DirHash::compute([("m@v1.0.0/a.go", &b"A"[..])]);
        assert_ne!(base, renamed);
        assert_ne!(base, edited);
    }

    #[test]
    fn dir_hash_known_value() {
        // sha256("") summarized as one line, base64-encoded.
        let line = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855  f\n";
        let expected = base64::engine::general_purpose::STANDARD.encode(Sha256::digest(line));
        let hash = DirHash::compute([("f", &b""[..])]);
        assert_eq!(hash.as_str(), format!("h1:{expected}"));
    }
}
