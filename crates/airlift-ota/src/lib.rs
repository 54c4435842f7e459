//! Over-the-air update engine for Airlift.
//!
//! This crate is the update lifecycle manager: it discovers candidate
//! updates (periodic polling plus a realtime push channel), gates them
//! through validation, applies them durably with backup/rollback support,
//! and records rollout history. Hosts interact through [`OtaManager`];
//! everything else is the machinery behind it:
//! - Version comparison and admissibility gates.
//! - Persistent slot bookkeeping over an [`airlift_store::KeyValueStore`].
//! - Scheduled (windowed) rollout and device targeting.
//! - Remote feature flags and declarative effect payloads.

pub mod checksum;
mod config;
mod device;
mod effects;
mod error;
mod events;
mod fetch;
mod flags;
mod manager;
mod realtime;
mod schedule;
pub mod slots;
mod state;
mod types;
mod validate;
mod version;

/// Client tunables with serde-backed defaults.
pub use config::OtaOptions;
/// Device identity seam used for update targeting.
pub use device::{DeviceIdentity, FixedDeviceIdentity, StoredDeviceIdentity};
/// Declarative effect payload model and outcome report.
pub use effects::{Effect, EffectsReport, parse_effects};
pub use error::OtaError;
/// Fire-and-forget analytics seam.
pub use events::{EventSink, LogSink, NoopSink};
pub use flags::FeatureFlags;
/// The lifecycle manager and its public outcome types.
pub use manager::{ApplyOutcome, OtaManager, RollbackOutcome, UpdateCallback};
/// Realtime channel observability.
pub use realtime::{ChannelState, Transport};
pub use schedule::is_within_window;
pub use state::{HISTORY_CAP, StateStore};
/// Wire and persisted data model.
pub use types::{HistoryRecord, Schedule, ScheduledEntry, Update, UpdateConfig};
pub use validate::{Rejection, validate_update};
pub use version::{UpdateVersion, is_compatible, is_newer};
