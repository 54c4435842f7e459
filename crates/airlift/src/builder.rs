use std::sync::Arc;

use airlift_ota::{
    DeviceIdentity, EventSink, LogSink, OtaError, OtaManager, OtaOptions, StoredDeviceIdentity,
};
use airlift_store::{JsonFileStore, KeyValueStore, StoreError};
use log::info;
use thiserror::Error;

use crate::paths::{AppPaths, AppPathsError};

#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Paths(#[from] AppPathsError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ota(#[from] OtaError),
}

/// Assembles an [`OtaManager`] with stock collaborators: a JSON file store in
/// the platform data directory, a store-persisted device identity, and
/// log-backed analytics. Each piece can be swapped before [`Self::build`].
pub struct ManagerBuilder {
    options: OtaOptions,
    store: Option<Arc<dyn KeyValueStore>>,
    identity: Option<Arc<dyn DeviceIdentity>>,
    events: Option<Arc<dyn EventSink>>,
}

impl ManagerBuilder {
    #[must_use]
    pub fn new(options: OtaOptions) -> Self {
        Self {
            options,
            store: None,
            identity: None,
            events: None,
        }
    }

    #[must_use]
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn device_identity(mut self, identity: Arc<dyn DeviceIdentity>) -> Self {
        self.identity = Some(identity);
        self
    }

    #[must_use]
    pub fn event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// Build the manager, filling in defaults for anything not overridden.
    ///
    /// # Errors
    /// Returns an error when the default store location cannot be resolved or
    /// opened, or when the manager's HTTP client cannot be constructed.
    pub fn build(self) -> Result<OtaManager, SetupError> {
        let store = match self.store {
            Some(store) => store,
            None => {
                let paths = AppPaths::new()?;
                let state_file = paths.state_file();
                info!("persisting update state to {}", state_file.display());
                Arc::new(JsonFileStore::open(state_file)?)
            }
        };

        let identity = self
            .identity
            .unwrap_or_else(|| Arc::new(StoredDeviceIdentity::new(store.clone())));
        let events = self.events.unwrap_or_else(|| Arc::new(LogSink));

        Ok(OtaManager::new(self.options, store, identity, events)?)
    }
}
