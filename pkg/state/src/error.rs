use pkg_types::meta::ObjectKey;
use thiserror::Error;

/// Failures surfaced by the object registry.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {key} not found")]
    NotFound { kind: &'static str, key: ObjectKey },

    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: &'static str, key: ObjectKey },

    #[error("{kind} {key} was modified concurrently (expected version {expected}, found {actual})")]
    VersionConflict {
        kind: &'static str,
        key: ObjectKey,
        expected: u64,
        actual: u64,
    },

    #[error("state store unavailable: {0}")]
    Unavailable(String),

    #[error("failed to decode {key}: {reason}")]
    Codec { key: String, reason: String },
}

impl StoreError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }

    /// Whether running the same operation again later can succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Codec { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_message_names_versions() {
        let err = StoreError::VersionConflict {
            kind: "Deployment",
            key: ObjectKey::new("default", "web"),
            expected: 3,
            actual: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains("Deployment default/web"));
        assert!(msg.contains("expected version 3"));
        assert!(err.is_conflict());
        assert!(err.is_retryable());
    }

    #[test]
    fn codec_errors_are_not_retryable() {
        let err = StoreError::Codec {
            key: "/registry/services/default/web".to_string(),
            reason: "EOF".to_string(),
        };
        assert!(!err.is_retryable());
        assert!(StoreError::unavailable("disk gone").is_retryable());
    }
}
