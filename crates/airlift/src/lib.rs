//! Host-facing entry point for the Airlift update client.
//!
//! Most applications only need this crate: build an
//! [`OtaManager`] through the [`ManagerBuilder`], then poll with
//! `check_for_updates`/`apply_update` or open the realtime channel with
//! `enable_realtime`. The heavy lifting lives in [`airlift_ota`]; persistence
//! seams live in [`airlift_store`].
//!
//! ```no_run
//! use airlift::{ManagerBuilder, OtaOptions};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! airlift::init_logging(1024 * 1024);
//!
//! let manager = ManagerBuilder::new(OtaOptions::new("alk_live_yourkey")).build()?;
//! if let Some(update) = manager.check_for_updates(false).await? {
//!     manager.apply_update(&update).await?;
//! }
//! # Ok(())
//! # }
//! ```

mod builder;
mod logging;
mod paths;

pub use builder::{ManagerBuilder, SetupError};
pub use logging::init_logging;
pub use paths::{AppPaths, AppPathsError};

pub use airlift_ota::{
    ApplyOutcome, ChannelState, DeviceIdentity, Effect, EffectsReport, EventSink, FeatureFlags,
    FixedDeviceIdentity, HistoryRecord, LogSink, NoopSink, OtaError, OtaManager, OtaOptions,
    Rejection, RollbackOutcome, Schedule, ScheduledEntry, StoredDeviceIdentity, Transport, Update,
    UpdateCallback, UpdateConfig, UpdateVersion,
};
pub use airlift_store::{JsonFileStore, KeyValueStore, MemoryStore, StoreError};
