use std::collections::HashMap;
use std::sync::Arc;

use airlift_store::{KeyValueStore, StoreError};
use log::debug;
use tokio::sync::RwLock;

use crate::slots;

/// Remotely-toggled boolean flags, persisted in the shared store and cached
/// after the first read. The lifecycle manager flips flags as an apply side
/// effect; the host application may read and write them directly as well.
pub struct FeatureFlags {
    store: Arc<dyn KeyValueStore>,
    cache: RwLock<HashMap<String, bool>>,
}

impl FeatureFlags {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn slot(name: &str) -> String {
        format!("{}{name}", slots::FEATURE_PREFIX)
    }

    /// Whether `name` is enabled. Unknown flags and store read failures both
    /// read as disabled; successful reads are cached.
    pub async fn is_enabled(&self, name: &str) -> bool {
        if let Some(&cached) = self.cache.read().await.get(name) {
            return cached;
        }

        match self.store.get(&Self::slot(name)).await {
            Ok(value) => {
                let enabled = value.as_deref() == Some("true");
                self.cache
                    .write()
                    .await
                    .insert(name.to_string(), enabled);
                enabled
            }
            Err(error) => {
                debug!("feature flag {name} read failed, treating as disabled: {error}");
                false
            }
        }
    }

    pub async fn enable(&self, name: &str) -> Result<(), StoreError> {
        self.set(name, true).await
    }

    pub async fn disable(&self, name: &str) -> Result<(), StoreError> {
        self.set(name, false).await
    }

    async fn set(&self, name: &str, enabled: bool) -> Result<(), StoreError> {
        self.store
            .set(&Self::slot(name), if enabled { "true" } else { "false" })
            .await?;
        self.cache.write().await.insert(name.to_string(), enabled);
        Ok(())
    }

    /// Drop all cached values; the next read of each flag goes to the store.
    pub async fn clear_cache(&self) {
        self.cache.write().await.clear();
    }
}
