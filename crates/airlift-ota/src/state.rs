use std::collections::BTreeMap;
use std::sync::Arc;

use airlift_store::KeyValueStore;
use chrono::{DateTime, Utc};
use log::warn;
use serde::de::DeserializeOwned;

use crate::error::OtaError;
use crate::slots;
use crate::types::{HistoryRecord, ScheduledEntry, UpdateConfig};

/// Rollout history keeps this many records; older ones are evicted silently.
pub const HISTORY_CAP: usize = 50;

/// Typed accessors over the raw store slots. The lifecycle manager owns the
/// only instance that writes; everything here is a thin, restart-safe wrapper
/// around individually-atomic key operations.
#[derive(Clone)]
pub struct StateStore {
    store: Arc<dyn KeyValueStore>,
}

fn decode<T: DeserializeOwned>(slot: &str, raw: &str) -> Option<T> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(error) => {
            warn!("discarding corrupt value in slot {slot}: {error}");
            None
        }
    }
}

impl StateStore {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub async fn current_version(&self) -> Result<Option<String>, OtaError> {
        Ok(self.store.get(slots::CURRENT_VERSION).await?)
    }

    pub async fn set_current_version(&self, version: &str) -> Result<(), OtaError> {
        Ok(self.store.set(slots::CURRENT_VERSION, version).await?)
    }

    pub async fn current_config(&self) -> Result<Option<UpdateConfig>, OtaError> {
        let Some(raw) = self.store.get(slots::CURRENT_CONFIG).await? else {
            return Ok(None);
        };
        Ok(decode(slots::CURRENT_CONFIG, &raw))
    }

    pub async fn set_current_config(&self, config: &UpdateConfig) -> Result<(), OtaError> {
        let raw = serde_json::to_string(config)
            .map_err(|error| OtaError::encode("current config", &error))?;
        Ok(self.store.set(slots::CURRENT_CONFIG, &raw).await?)
    }

    pub async fn set_applied_at(&self, at: DateTime<Utc>) -> Result<(), OtaError> {
        Ok(self
            .store
            .set(slots::APPLIED_AT, &at.to_rfc3339())
            .await?)
    }

    /// Mutate the settings map of the current config in place; a missing
    /// config makes this a no-op.
    pub async fn update_settings(
        &self,
        mutate: impl FnOnce(&mut BTreeMap<String, serde_json::Value>),
    ) -> Result<(), OtaError> {
        let Some(mut config) = self.current_config().await? else {
            return Ok(());
        };
        mutate(&mut config.settings);
        self.set_current_config(&config).await
    }

    pub async fn backup(&self) -> Result<Option<(String, UpdateConfig)>, OtaError> {
        let Some(version) = self.store.get(slots::BACKUP_VERSION).await? else {
            return Ok(None);
        };
        let Some(raw) = self.store.get(slots::BACKUP_CONFIG).await? else {
            return Ok(None);
        };
        Ok(decode(slots::BACKUP_CONFIG, &raw).map(|config| (version, config)))
    }

    pub async fn set_backup(&self, version: &str, config: &UpdateConfig) -> Result<(), OtaError> {
        let raw = serde_json::to_string(config)
            .map_err(|error| OtaError::encode("backup config", &error))?;
        self.store.set(slots::BACKUP_CONFIG, &raw).await?;
        Ok(self.store.set(slots::BACKUP_VERSION, version).await?)
    }

    pub async fn effects_payload(&self) -> Result<Option<String>, OtaError> {
        Ok(self.store.get(slots::EFFECTS_PAYLOAD).await?)
    }

    pub async fn set_effects_payload(&self, payload: &str) -> Result<(), OtaError> {
        Ok(self.store.set(slots::EFFECTS_PAYLOAD, payload).await?)
    }

    pub async fn clear_effects_payload(&self) -> Result<(), OtaError> {
        Ok(self.store.delete(slots::EFFECTS_PAYLOAD).await?)
    }

    /// Rollout history, most recent first. A corrupt log reads as empty.
    pub async fn history(&self) -> Result<Vec<HistoryRecord>, OtaError> {
        let Some(raw) = self.store.get(slots::HISTORY_LOG).await? else {
            return Ok(Vec::new());
        };
        Ok(decode(slots::HISTORY_LOG, &raw).unwrap_or_default())
    }

    /// Append `record` at the head of the history log, evicting past
    /// [`HISTORY_CAP`].
    pub async fn push_history(&self, record: HistoryRecord) -> Result<(), OtaError> {
        let mut records = self.history().await?;
        records.insert(0, record);
        records.truncate(HISTORY_CAP);

        let raw = serde_json::to_string(&records)
            .map_err(|error| OtaError::encode("history log", &error))?;
        Ok(self.store.set(slots::HISTORY_LOG, &raw).await?)
    }

    pub async fn scheduled(&self) -> Result<Vec<ScheduledEntry>, OtaError> {
        let Some(raw) = self.store.get(slots::SCHEDULED_QUEUE).await? else {
            return Ok(Vec::new());
        };
        Ok(decode(slots::SCHEDULED_QUEUE, &raw).unwrap_or_default())
    }

    pub async fn set_scheduled(&self, entries: &[ScheduledEntry]) -> Result<(), OtaError> {
        if entries.is_empty() {
            return Ok(self.store.delete(slots::SCHEDULED_QUEUE).await?);
        }
        let raw = serde_json::to_string(entries)
            .map_err(|error| OtaError::encode("scheduled queue", &error))?;
        Ok(self.store.set(slots::SCHEDULED_QUEUE, &raw).await?)
    }

    pub async fn push_scheduled(&self, entry: ScheduledEntry) -> Result<(), OtaError> {
        let mut entries = self.scheduled().await?;
        entries.push(entry);
        self.set_scheduled(&entries).await
    }

    /// Last successful poll, as epoch milliseconds. A malformed stored value
    /// reads as "never polled".
    pub async fn last_poll(&self) -> Result<Option<i64>, OtaError> {
        let Some(raw) = self.store.get(slots::LAST_POLL).await? else {
            return Ok(None);
        };
        Ok(raw.parse().ok())
    }

    pub async fn set_last_poll(&self, epoch_millis: i64) -> Result<(), OtaError> {
        Ok(self
            .store
            .set(slots::LAST_POLL, &epoch_millis.to_string())
            .await?)
    }
}
