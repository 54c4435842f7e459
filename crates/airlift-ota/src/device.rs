use std::sync::Arc;

use airlift_store::KeyValueStore;
use async_trait::async_trait;
use log::warn;

use crate::slots;

/// Source of the local device identifier used for update targeting.
#[async_trait]
pub trait DeviceIdentity: Send + Sync {
    async fn device_id(&self) -> Option<String>;
}

/// A fixed identifier supplied by the host application.
pub struct FixedDeviceIdentity {
    id: String,
}

impl FixedDeviceIdentity {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait]
impl DeviceIdentity for FixedDeviceIdentity {
    async fn device_id(&self) -> Option<String> {
        Some(self.id.clone())
    }
}

/// Device identity persisted in the store: generated once on first use and
/// reused for the lifetime of the installation.
pub struct StoredDeviceIdentity {
    store: Arc<dyn KeyValueStore>,
}

impl StoredDeviceIdentity {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn generate() -> String {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |duration| duration.as_nanos());
        format!("device_{:x}{nanos:x}", std::process::id())
    }
}

#[async_trait]
impl DeviceIdentity for StoredDeviceIdentity {
    async fn device_id(&self) -> Option<String> {
        match self.store.get(slots::DEVICE_ID).await {
            Ok(Some(id)) => Some(id),
            Ok(None) => {
                let id = Self::generate();
                if let Err(error) = self.store.set(slots::DEVICE_ID, &id).await {
                    warn!("failed to persist generated device id: {error}");
                }
                Some(id)
            }
            Err(error) => {
                warn!("device id unavailable: {error}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use airlift_store::MemoryStore;

    use super::*;

    #[tokio::test]
    async fn stored_identity_is_generated_once_and_reused() {
        let store = Arc::new(MemoryStore::new());
        let identity = StoredDeviceIdentity::new(store.clone());

        let first = identity
            .device_id()
            .await
            .expect("device id should be generated");
        assert!(first.starts_with("device_"));

        let second = identity
            .device_id()
            .await
            .expect("device id should be readable");
        assert_eq!(first, second);

        assert_eq!(
            store
                .get(slots::DEVICE_ID)
                .await
                .expect("raw read should succeed"),
            Some(first)
        );
    }

    #[tokio::test]
    async fn fixed_identity_returns_configured_id() {
        let identity = FixedDeviceIdentity::new("device-a");
        assert_eq!(identity.device_id().await.as_deref(), Some("device-a"));
    }
}
