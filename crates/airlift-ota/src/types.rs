use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Configuration payload carried by an update.
///
/// Maps are ordered so the serialized form is deterministic, which the
/// checksum in [`crate::checksum`] depends on. Wire names follow the control
/// plane's camelCase JSON; `effects` travels as `code` and `min_host_version`
/// as `minSdkVersion` for compatibility with older control planes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateConfig {
    pub version: String,

    #[serde(default)]
    pub features: Vec<String>,

    #[serde(default)]
    pub endpoints: BTreeMap<String, String>,

    #[serde(default)]
    pub settings: BTreeMap<String, serde_json::Value>,

    #[serde(default, rename = "code", skip_serializing_if = "Option::is_none")]
    pub effects: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,

    #[serde(
        default,
        rename = "minSdkVersion",
        skip_serializing_if = "Option::is_none"
    )]
    pub min_host_version: Option<String>,
}

impl UpdateConfig {
    /// Minimal config carrying only a version, useful as a starting point.
    #[must_use]
    pub fn for_version(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            features: Vec::new(),
            endpoints: BTreeMap::new(),
            settings: BTreeMap::new(),
            effects: None,
            checksum: None,
            min_host_version: None,
        }
    }
}

/// A candidate update as delivered by polling or the realtime channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Update {
    pub version: String,

    pub config: UpdateConfig,

    #[serde(rename = "timestamp")]
    pub issued_at: DateTime<Utc>,

    #[serde(default)]
    pub mandatory: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_devices: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Schedule>,
}

/// Rollout window. Bounds stay raw strings: they come from the control plane
/// and are parsed leniently at evaluation time (see [`crate::schedule`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub start_time: String,
    pub end_time: String,
    pub timezone: String,
}

/// One entry of the persisted rollout history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub version: String,

    pub applied_at: DateTime<Utc>,

    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_from: Option<String>,
}

impl HistoryRecord {
    #[must_use]
    pub fn success(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            applied_at: Utc::now(),
            success: true,
            error: None,
            rollback_from: None,
        }
    }

    #[must_use]
    pub fn failure(version: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            applied_at: Utc::now(),
            success: false,
            error: Some(error.into()),
            rollback_from: None,
        }
    }

    #[must_use]
    pub fn rolled_back_from(mut self, previous: impl Into<String>) -> Self {
        self.rollback_from = Some(previous.into());
        self
    }
}

/// An update waiting for its rollout window to open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledEntry {
    pub update: Update,
    pub scheduled_at: DateTime<Utc>,
}
