use std::fmt;

use crate::checksum::verify_config_checksum;
use crate::types::Update;
use crate::version::{is_compatible, is_newer};

/// Why a candidate update was deemed inadmissible.
///
/// Everything but [`Rejection::ChecksumMismatch`] is discarded silently;
/// a checksum mismatch is recorded in the rollout history by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Not newer than the current version and not mandatory.
    Stale,
    /// The host application is older than the update's minimum version.
    Incompatible,
    /// The update targets an explicit device set this device is not in.
    NotTargeted,
    /// The config failed its integrity check.
    ChecksumMismatch,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stale => write!(f, "not newer than the current version"),
            Self::Incompatible => write!(f, "requires a newer host version"),
            Self::NotTargeted => write!(f, "not targeted at this device"),
            Self::ChecksumMismatch => write!(f, "checksum validation failed"),
        }
    }
}

/// Run every admissibility gate against a candidate update. All gates must
/// pass; the first failing gate names the rejection.
pub fn validate_update(
    update: &Update,
    current_version: &str,
    host_version: &str,
    device_id: Option<&str>,
) -> Result<(), Rejection> {
    if !is_newer(&update.version, current_version) && !update.mandatory {
        return Err(Rejection::Stale);
    }

    if let Some(min) = update.config.min_host_version.as_deref()
        && !is_compatible(host_version, min)
    {
        return Err(Rejection::Incompatible);
    }

    if let Some(targets) = update.target_devices.as_deref()
        && !targets.is_empty()
    {
        let member = device_id.is_some_and(|id| targets.iter().any(|target| target == id));
        if !member {
            return Err(Rejection::NotTargeted);
        }
    }

    if !verify_config_checksum(&update.config) {
        return Err(Rejection::ChecksumMismatch);
    }

    Ok(())
}
