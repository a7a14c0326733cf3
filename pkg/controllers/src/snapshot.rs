//! Last-applied spec snapshot, kept as an annotation on the AppService.

use pkg_constants::controller::SNAPSHOT_ANNOTATION;
use pkg_types::appservice::{AppService, AppServiceSpec};

use crate::error::SnapshotError;

pub fn encode(spec: &AppServiceSpec) -> Result<String, SnapshotError> {
    serde_json::to_string(spec).map_err(|e| SnapshotError::Encode(e.to_string()))
}

/// Fails with [`SnapshotError::Corrupt`] on malformed input or missing required fields.
pub fn decode(raw: &str) -> Result<AppServiceSpec, SnapshotError> {
    serde_json::from_str(raw).map_err(|e| SnapshotError::Corrupt(e.to_string()))
}

/// The raw snapshot recorded on `app`, if any.
pub fn recorded(app: &AppService) -> Option<&str> {
    app.metadata
        .annotations
        .get(SNAPSHOT_ANNOTATION)
        .map(String::as_str)
}

pub fn record(app: &mut AppService, encoded: String) {
    app.metadata
        .annotations
        .insert(SNAPSHOT_ANNOTATION.to_string(), encoded);
}
