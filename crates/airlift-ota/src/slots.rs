//! Logical slot names inside the key-value store.
//!
//! The lifecycle manager is the only writer of these slots; collaborators
//! only ever produce candidate updates and never touch the store directly.

pub const CURRENT_VERSION: &str = "ota/current-version";
pub const CURRENT_CONFIG: &str = "ota/current-config";
pub const APPLIED_AT: &str = "ota/applied-at";
pub const EFFECTS_PAYLOAD: &str = "ota/effects";
pub const BACKUP_VERSION: &str = "ota/backup-version";
pub const BACKUP_CONFIG: &str = "ota/backup-config";
pub const HISTORY_LOG: &str = "ota/history";
pub const SCHEDULED_QUEUE: &str = "ota/scheduled";
pub const LAST_POLL: &str = "ota/last-poll";
pub const DEVICE_ID: &str = "ota/device-id";

/// Prefix for feature-flag slots; the flag name is appended verbatim.
pub const FEATURE_PREFIX: &str = "feature/";
