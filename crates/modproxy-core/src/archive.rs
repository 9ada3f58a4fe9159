//! Deterministic module archives.
//!
//! Every file is stored as `<module>@<version>/<relative path>`. Entries are
//! written in name order with a fixed 1980-01-01 timestamp and fixed
//! permissions, so identical trees always produce identical bytes.
//!
//! Files the Go toolchain leaves out of module zips are skipped:
//! - version-control metadata directories (`.git`, `.hg`, `.svn`, `.bzr`)
//! - nested modules: any subdirectory with its own `go.mod`, and everything
//!   below it
//! - vendored packages, except `vendor/modules.txt`

use std::collections::{BTreeSet, HashMap};
use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::config::ArchiveLimits;
use crate::error::BuildError;
use crate::integrity::{ContentHash, DirHash};
use crate::manifest::MANIFEST_FILE;
use crate::source::SourceTree;

const VCS_DIRS: [&str; 4] = [".bzr", ".git", ".hg", ".svn"];

/// A packaged module archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    /// Zip bytes.
    pub bytes: Vec<u8>,
    /// Entry names, in archive order.
    pub entries: Vec<String>,
    /// `h1:` hash over the packaged files.
    pub digest: DirHash,
}

/// Select the files of `all` that belong in the module archive.
pub fn select_files(all: &[String]) -> Vec<String> {
    let nested_roots: BTreeSet<&str> = all
        .iter()
        .filter_map(|p| p.strip_suffix(&format!("/{MANIFEST_FILE}")))
        .collect();

    let mut selected: Vec<String> = all
        .iter()
        .filter(|path| {
            let dirs: Vec<&str> = path.split('/').collect();
            let dirs = &dirs[..dirs.len() - 1];
            if dirs.iter().any(|d| VCS_DIRS.contains(d)) {
                return false;
            }
            if path.starts_with("vendor/") && path.as_str() != "vendor/modules.txt" {
                return false;
            }
            !(1..=dirs.len()).any(|depth| nested_roots.contains(dirs[..depth].join("/").as_str()))
        })
        .cloned()
        .collect();
    selected.sort();
    selected
}

/// Package the module's source tree.
pub fn package(
    module: &str,
    version: &str,
    source: &dyn SourceTree,
    limits: &ArchiveLimits,
) -> Result<Archive, BuildError> {
    let fail = |detail: String| BuildError::PackagingFailure {
        module: module.to_string(),
        version: version.to_string(),
        detail,
    };

    let files = select_files(&source.entries()?);
    check_case_collisions(&files).map_err(fail)?;

    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644);

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut entries = Vec::with_capacity(files.len());
    let mut hashes = Vec::with_capacity(files.len());

    for file in &files {
        let data = source.read(file)?.ok_or_else(|| BuildError::SourceUnreadable {
            path: file.clone(),
            detail: "listed file disappeared".to_string(),
        })?;

        let limit = if file == MANIFEST_FILE {
            limits.max_manifest_bytes
        } else {
            limits.max_file_bytes
        };
        if data.len() as u64 > limit {
            return Err(fail(format!(
                "{file} is {} bytes, limit is {limit}",
                data.len()
            )));
        }

        let name = format!("{module}@{version}/{file}");
        writer
            .start_file(name.as_str(), options)
            .map_err(|e| fail(format!("adding {file}: {e}")))?;
        writer
            .write_all(&data)
            .map_err(|e| fail(format!("writing {file}: {e}")))?;

        hashes.push((name.clone(), ContentHash::compute(&data)));
        entries.push(name);
    }

    let bytes = writer
        .finish()
        .map_err(|e| fail(format!("finishing archive: {e}")))?
        .into_inner();
    if bytes.len() as u64 > limits.max_archive_bytes {
        return Err(fail(format!(
            "archive is {} bytes, limit is {}",
            bytes.len(),
            limits.max_archive_bytes
        )));
    }

    Ok(Archive {
        bytes,
        entries,
        digest: DirHash::from_hashes(hashes),
    })
}

/// Recompute the `h1:` hash of an existing archive.
pub fn digest_archive(bytes: &[u8]) -> Result<DirHash, String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let mut hashes = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(|e| e.to_string())?;
        if file.is_dir() {
            continue;
        }
        let mut data = Vec::new();
        file.read_to_end(&mut data).map_err(|e| e.to_string())?;
        hashes.push((file.name().to_string(), ContentHash::compute(&data)));
    }
    Ok(DirHash::from_hashes(hashes))
}

/// Two paths differing only in case cannot coexist on every client.
fn check_case_collisions(files: &[String]) -> Result<(), String> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    for file in files {
        if let Some(other) = seen.insert(file.to_lowercase(), file) {
            return Err(format!("{other} and {file} differ only in case"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    fn paths(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn tree() -> MemorySource {
        MemorySource::new()
            .with_file("go.mod", "module example.com/foo/bar\n")
            .with_file("bar.go", "package bar\n")
            .with_file("internal/x/x.go", "package x\n")
    }

    #[test]
    fn select_skips_vcs_nested_and_vendor() {
        let all = paths(&[
            ".git/HEAD",
            "go.mod",
            "main.go",
            "sub/.hg/store",
            "tools/go.mod",
            "tools/tool.go",
            "tools/deep/more.go",
            "toolsx/keep.go",
            "vendor/modules.txt",
            "vendor/golang.org/x/text/a.go",
            ".gitignore",
        ]);
        assert_eq!(
            select_files(&all),
            paths(&[".gitignore", "go.mod", "main.go", "toolsx/keep.go", "vendor/modules.txt"])
        );
    }

    #[test]
    fn entries_are_prefixed_and_sorted() {
        let archive = package(
            "example.com/foo/bar",
            "v0.0.123",
            &tree(),
            &ArchiveLimits::default(),
        )
        .unwrap();
        assert_eq!(
            archive.entries,
            paths(&[
                "example.com/foo/bar@v0.0.123/bar.go",
                "example.com/foo/bar@v0.0.123/go.mod",
                "example.com/foo/bar@v0.0.123/internal/x/x.go",
            ])
        );
    }

    #[test]
    fn identical_trees_give_identical_bytes() {
        let limits = ArchiveLimits::default();
        let a = package("example.com/foo/bar", "v1.0.0", &tree(), &limits).unwrap();
        let b = package("example.com/foo/bar", "v1.0.0", &tree(), &limits).unwrap();
        assert_eq!(a.bytes, b.bytes);
        assert_eq!(a.digest, b.digest);
    }

    #[test]
    fn digest_matches_reread_archive() {
        let archive = package(
            "example.com/foo/bar",
            "v1.0.0",
            &tree(),
            &ArchiveLimits::default(),
        )
        .unwrap();
        assert_eq!(digest_archive(&archive.bytes).unwrap(), archive.digest);
    }

    #[test]
    fn archive_round_trips_contents() {
        let archive = package(
            "example.com/foo/bar",
            "v1.0.0",
            &tree(),
            &ArchiveLimits::default(),
        )
        .unwrap();
        let mut zip = ZipArchive::new(Cursor::new(archive.bytes)).unwrap();
        let mut body = String::new();
        zip.by_name("example.com/foo/bar@v1.0.0/bar.go")
            .unwrap()
            .read_to_string(&mut body)
            .unwrap();
        assert_eq!(body, "package bar\n");
    }

    #[test]
    fn file_limit_enforced() {
        let limits = ArchiveLimits {
            max_file_bytes: 4,
            ..ArchiveLimits::default()
        };
        let err = package("example.com/foo/bar", "v1.0.0", &tree(), &limits).unwrap_err();
        assert!(matches!(err, BuildError::PackagingFailure { .. }));
    }

    #[test]
    fn manifest_limit_enforced() {
        let limits = ArchiveLimits {
            max_manifest_bytes: 4,
            ..ArchiveLimits::default()
        };
        let err = package("example.com/foo/bar", "v1.0.0", &tree(), &limits).unwrap_err();
        assert!(matches!(err, BuildError::PackagingFailure { .. }));
    }

    #[test]
    fn case_collision_rejected() {
        let src = MemorySource::new()
            .with_file("README", "a")
            .with_file("readme", "b");
        let err = package("example.com/c", "v1.0.0", &src, &ArchiveLimits::default()).unwrap_err();
        assert!(matches!(err, BuildError::PackagingFailure { .. }));
    }
}
