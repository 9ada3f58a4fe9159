//! Store key validation.
//!
//! Keys are relative, `/`-separated paths. They never begin or end with a
//! separator, never contain empty segments, and never contain `.` or `..`
//! segments, so a key can be mapped onto a filesystem path without escaping
//! the store root.

use crate::error::{Result, StoreError};

/// Validate a store key.
pub fn validate_key(key: &str) -> Result<()> {
    let reject = |reason: &str| {
        Err(StoreError::InvalidKey {
            key: key.to_string(),
            reason: reason.to_string(),
        })
    };

    if key.is_empty() {
        return reject("empty key");
    }
    if key.starts_with('/') || key.ends_with('/') {
        return reject("leading or trailing separator");
    }
    if key.contains('\\') || key.contains('\0') {
        return reject("forbidden character");
    }
    for segment in key.split('/') {
        match segment {
            "" => return reject("empty segment"),
            "." | ".." => return reject("relative segment"),
            _ => {}
        }
    }
    Ok(())
}
