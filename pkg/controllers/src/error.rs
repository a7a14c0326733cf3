//! Error types for the AppService controller.

use pkg_state::StoreError;
use pkg_types::meta::ObjectKey;
use std::time::Duration;
use thiserror::Error;

/// Failures of the spec snapshot codec.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to encode spec snapshot: {0}")]
    Encode(String),

    /// The recorded value is not a well-formed snapshot. Callers treat this
    /// as "no usable snapshot" and force a resync.
    #[error("corrupt spec snapshot: {0}")]
    Corrupt(String),
}

/// Why a reconciliation did not complete. Every variant is handed back to the
/// caller, which schedules the retry.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(
        "{} child write(s) failed for AppService {key}: {}",
        .failures.len(),
        summarize(.failures)
    )]
    ChildWrites {
        key: ObjectKey,
        failures: Vec<StoreError>,
    },

    #[error("reconciliation of AppService {key} was cancelled")]
    Cancelled { key: ObjectKey },

    #[error("reconciliation of AppService {key} timed out after {after:?}")]
    TimedOut { key: ObjectKey, after: Duration },
}

impl ReconcileError {
    /// Lost an optimistic-concurrency race; the whole invocation must rerun.
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Store(e) => e.is_conflict(),
            Self::ChildWrites { failures, .. } => failures.iter().any(StoreError::is_conflict),
            _ => false,
        }
    }

    /// Whether rerunning without outside intervention can succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_retryable(),
            Self::Snapshot(SnapshotError::Encode(_)) => false,
            Self::Snapshot(SnapshotError::Corrupt(_)) => true,
            Self::ChildWrites { failures, .. } => failures.iter().all(StoreError::is_retryable),
            Self::Cancelled { .. } | Self::TimedOut { .. } => true,
        }
    }
}

fn summarize(failures: &[StoreError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conflict() -> StoreError {
        StoreError::VersionConflict {
            kind: "Deployment",
            key: ObjectKey::new("default", "web"),
            expected: 1,
            actual: 2,
        }
    }

    #[test]
    fn child_writes_lists_every_failure() {
        let err = ReconcileError::ChildWrites {
            key: ObjectKey::new("default", "web"),
            failures: vec![conflict(), StoreError::unavailable("connection reset")],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("2 child write(s) failed for AppService default/web"));
        assert!(msg.contains("connection reset"));
        assert!(err.is_conflict());
        assert!(err.is_retryable());
    }

    #[test]
    fn store_errors_pass_through() {
        let err: ReconcileError = conflict().into();
        assert!(err.is_conflict());
        assert_eq!(err.to_string(), conflict().to_string());
    }

    #[test]
    fn cancellation_is_retryable() {
        let err = ReconcileError::Cancelled {
            key: ObjectKey::new("default", "web"),
        };
        assert!(err.is_retryable());
        assert!(!err.is_conflict());
    }
}
