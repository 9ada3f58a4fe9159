//! Store error types.

/// Errors that can occur while talking to a backing store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The key is not a valid relative store path.
    #[error("invalid store key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    /// I/O failure at the given key.
    #[error("I/O error at '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// The backend is temporarily unable to serve the request.
    #[error("store unavailable at '{key}': {detail}")]
    Unavailable { key: String, detail: String },
}

impl StoreError {
    /// Whether retrying the same operation may succeed.
    ///
    /// Malformed keys are permanent; I/O faults and unavailability are
    /// treated as transient.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::InvalidKey { .. } => false,
            StoreError::Io { source, .. } => !matches!(
                source.kind(),
                std::io::ErrorKind::PermissionDenied | std::io::ErrorKind::InvalidInput
            ),
            StoreError::Unavailable { .. } => true,
        }
    }

    /// The key the failing operation addressed.
    pub fn key(&self) -> &str {
        match self {
            StoreError::InvalidKey { key, .. }
            | StoreError::Io { key, .. }
            | StoreError::Unavailable { key, .. } => key,
        }
    }

    pub(crate) fn io(key: &str, source: std::io::Error) -> Self {
        StoreError::Io {
            key: key.to_string(),
            source,
        }
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_key_is_permanent() {
        let err = StoreError::InvalidKey {
            key: "../x".to_string(),
            reason: "parent reference".to_string(),
        };
        assert!(!err.is_transient());
        assert_eq!(err.key(), "../x");
    }

    #[test]
    fn io_faults_are_transient() {
        let err = StoreError::io("a/b", std::io::Error::other("disk hiccup"));
        assert!(err.is_transient());

        let denied = StoreError::io(
            "a/b",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(!denied.is_transient());
    }
}
