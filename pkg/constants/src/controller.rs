//! AppService controller constants.

/// API group/version of the AppService kind, used in owner references.
pub const APPSERVICE_API_VERSION: &str = "app.ydzs.io/v1beta1";

/// Kind name of the parent resource.
pub const APPSERVICE_KIND: &str = "AppService";

/// Annotation on the parent holding the last spec the controller applied.
pub const SNAPSHOT_ANNOTATION: &str = "old/spec";

/// Label key put on every generated child and used as the selector.
pub const APP_LABEL: &str = "app";

/// Full resync of every AppService, in seconds.
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 30;

/// Upper bound on a single reconciliation, in seconds.
pub const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 10;

/// First retry delay after a failed reconciliation, in milliseconds.
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 200;

/// Retry delays never exceed this many seconds.
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 60;
