use async_trait::async_trait;

use crate::error::StoreError;

/// Async key-value persistence consumed by the update engine.
///
/// Implementations must make each individual operation atomic and durable on
/// its own; callers never get cross-key transactions and must not assume any.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Whether `key` currently holds a value.
    ///
    /// # Errors
    /// Returns an error when the underlying read fails.
    async fn contains(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key).await?.is_some())
    }
}
