//! Hard limits of the queue API
//!
//! These drive constraints in the receive path and in the validators.

/// Maximum number of entries in a batch request, and the ceiling for
/// `MaxNumberOfMessages` on receive.
pub const MAX_BATCH_SIZE: usize = 10;

/// Maximum queue name (and batch entry id) length.
pub const MAX_NAME_LENGTH: usize = 80;

/// Maximum message body size in bytes (256 KiB).
pub const MAX_MESSAGE_SIZE: usize = 262_144;

/// `DelaySeconds` must be between 0 and this value.
pub const MAX_DELAY_SECONDS: i64 = 900;

/// `VisibilityTimeout` must be between 0 and this value (12 hours).
pub const MAX_VISIBILITY_TIMEOUT: i64 = 43_200;

/// `WaitTimeSeconds` must be between 0 and this value.
pub const MAX_WAIT_TIME_SECONDS: i64 = 20;

/// Visibility timeout applied when a receive does not specify one.
pub const DEFAULT_VISIBILITY_TIMEOUT: i64 = 30;

/// Reported retention period (4 days). Retention is not enforced.
pub const DEFAULT_RETENTION_PERIOD: i64 = 345_600;
