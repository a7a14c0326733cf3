//! State store key layout.

/// Root of every resource key. Full key = `/registry/<plural>/<namespace>/<name>`.
pub const REGISTRY_ROOT: &str = "/registry";

/// Plural path segment for AppService objects.
pub const APPSERVICES: &str = "appservices";

/// Plural path segment for Deployment objects.
pub const DEPLOYMENTS: &str = "deployments";

/// Plural path segment for Service objects.
pub const SERVICES: &str = "services";

/// Number of recent watch events retained for replay.
pub const EVENT_LOG_CAPACITY: usize = 4096;

/// Capacity of the live watch broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;
