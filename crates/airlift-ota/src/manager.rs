use std::sync::Arc;
use std::time::Duration;

use airlift_store::KeyValueStore;
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use serde_json::json;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::checksum::verify_config_checksum;
use crate::config::OtaOptions;
use crate::device::{DeviceIdentity, StoredDeviceIdentity};
use crate::effects::{EffectsReport, apply_effects, parse_effects};
use crate::error::OtaError;
use crate::events::{EventSink, LogSink};
use crate::fetch::{FetchOutcome, PollFetcher};
use crate::flags::FeatureFlags;
use crate::realtime::{ChannelState, PushHandler, RealtimeOptions, run_channel};
use crate::schedule::is_within_window;
use crate::state::StateStore;
use crate::types::{HistoryRecord, ScheduledEntry, Update, UpdateConfig};
use crate::validate::{Rejection, validate_update};

/// Host callback fired after a realtime update has been applied.
pub type UpdateCallback = Arc<dyn Fn(&Update) + Send + Sync>;

/// Result of an apply attempt that did not error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The update is committed and live.
    Applied,
    /// The update's rollout window has not opened; it was queued instead.
    Deferred,
}

/// Which path satisfied a rollback request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// The control plane served a rollback update.
    Server { version: String },
    /// The local backup snapshot was restored.
    LocalBackup { version: String },
}

/// The update lifecycle manager: discovers candidate updates, gates them
/// through validation, applies them durably, and keeps backup, history and
/// scheduling state. One instance per host application; cloning is cheap and
/// all clones share state.
///
/// Applies and rollbacks are serialized internally, so racing delivery paths
/// (a poll result and a push result) cannot interleave their store writes.
#[derive(Clone)]
pub struct OtaManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    options: OtaOptions,
    state: StateStore,
    flags: FeatureFlags,
    fetcher: PollFetcher,
    identity: Arc<dyn DeviceIdentity>,
    events: Arc<dyn EventSink>,
    apply_lock: tokio::sync::Mutex<()>,
    realtime: std::sync::Mutex<Option<RealtimeHandle>>,
}

struct RealtimeHandle {
    token: CancellationToken,
    states: watch::Receiver<ChannelState>,
}

fn user_agent() -> String {
    format!("airlift/{}", env!("CARGO_PKG_VERSION"))
}

impl OtaManager {
    /// Build a manager over `store` with explicit collaborators.
    ///
    /// # Errors
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn new(
        options: OtaOptions,
        store: Arc<dyn KeyValueStore>,
        identity: Arc<dyn DeviceIdentity>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, OtaError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(options.http_timeout_secs))
            .connect_timeout(Duration::from_secs(options.connect_timeout_secs))
            .user_agent(user_agent())
            .build()
            .map_err(OtaError::ClientBuild)?;

        let fetcher = PollFetcher::new(
            client,
            options.endpoints.clone(),
            options.api_key.clone(),
            options.retry_delays_secs.clone(),
        );

        Ok(Self {
            inner: Arc::new(ManagerInner {
                state: StateStore::new(store.clone()),
                flags: FeatureFlags::new(store),
                fetcher,
                identity,
                events,
                apply_lock: tokio::sync::Mutex::new(()),
                realtime: std::sync::Mutex::new(None),
                options,
            }),
        })
    }

    /// Build a manager with the stock collaborators: a store-persisted device
    /// identity and log-backed analytics.
    ///
    /// # Errors
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn with_defaults(
        options: OtaOptions,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self, OtaError> {
        let identity = Arc::new(StoredDeviceIdentity::new(store.clone()));
        Self::new(options, store, identity, Arc::new(LogSink))
    }

    /// Currently applied version, or the configured initial version when no
    /// update has ever been applied.
    pub async fn current_version(&self) -> Result<String, OtaError> {
        Ok(self
            .inner
            .state
            .current_version()
            .await?
            .unwrap_or_else(|| self.inner.options.initial_version.clone()))
    }

    pub async fn current_config(&self) -> Result<Option<UpdateConfig>, OtaError> {
        self.inner.state.current_config().await
    }

    /// Rollout history, most recent first.
    pub async fn update_history(&self) -> Result<Vec<HistoryRecord>, OtaError> {
        self.inner.state.history().await
    }

    #[must_use]
    pub fn flags(&self) -> &FeatureFlags {
        &self.inner.flags
    }

    /// Poll the configured endpoints for a pending update.
    ///
    /// Rate-limited by the persisted last-poll timestamp unless `force` is
    /// set. The returned update has passed every validation gate but has NOT
    /// been applied; pass it to [`Self::apply_update`].
    ///
    /// # Errors
    /// Returns an error when the store cannot be read or written. Network
    /// failures are not errors: they exhaust the endpoint list and yield
    /// `None`.
    pub async fn check_for_updates(&self, force: bool) -> Result<Option<Update>, OtaError> {
        let now = Utc::now().timestamp_millis();

        if !force && let Some(last) = self.inner.state.last_poll().await? {
            let interval_millis = i64::try_from(self.inner.options.check_interval_secs)
                .unwrap_or(i64::MAX)
                .saturating_mul(1000);
            if now.saturating_sub(last) < interval_millis {
                debug!("skipping update poll, within the rate-limit interval");
                return Ok(None);
            }
        }

        let current = self.current_version().await?;
        let device_id = self.inner.identity.device_id().await;
        let device_query = device_id.clone().unwrap_or_else(|| "unknown".to_string());
        let host_version = self.inner.options.host_version.clone();

        let mut checksum_rejected: Vec<String> = Vec::new();
        let outcome = {
            let mut admit = |update: &Update| {
                match validate_update(update, &current, &host_version, device_id.as_deref()) {
                    Ok(()) => true,
                    Err(Rejection::ChecksumMismatch) => {
                        checksum_rejected.push(update.version.clone());
                        false
                    }
                    Err(rejection) => {
                        debug!("discarding update {}: {rejection}", update.version);
                        false
                    }
                }
            };
            self.inner
                .fetcher
                .poll(&current, &device_query, &mut admit)
                .await
        };

        for version in checksum_rejected {
            self.record_checksum_rejection(&version).await?;
        }

        match outcome {
            FetchOutcome::Update(update) => {
                self.inner.state.set_last_poll(now).await?;
                Ok(Some(*update))
            }
            FetchOutcome::NoUpdate => {
                self.inner.state.set_last_poll(now).await?;
                Ok(None)
            }
            FetchOutcome::Exhausted { responded } => {
                if responded {
                    self.inner.state.set_last_poll(now).await?;
                }
                Ok(None)
            }
        }
    }

    /// Apply `update`, or queue it when its rollout window has not opened.
    ///
    /// The commit sequence is strictly ordered: the previous state is
    /// snapshotted into the backup slots before anything new is persisted, so
    /// a fault mid-apply leaves either the old state intact or the new state
    /// fully committed, always with a history trace.
    ///
    /// # Errors
    /// Returns an error on checksum mismatch or a store fault; both are
    /// recorded as failed history entries first.
    pub async fn apply_update(&self, update: &Update) -> Result<ApplyOutcome, OtaError> {
        let _guard = self.inner.apply_lock.lock().await;
        self.apply_locked(update).await
    }

    async fn apply_locked(&self, update: &Update) -> Result<ApplyOutcome, OtaError> {
        if let Some(schedule) = &update.schedule
            && !is_within_window(schedule, Utc::now())
        {
            self.inner
                .state
                .push_scheduled(ScheduledEntry {
                    update: update.clone(),
                    scheduled_at: Utc::now(),
                })
                .await?;
            info!(
                "update {} deferred until its rollout window opens",
                update.version
            );
            self.inner
                .events
                .track("ota_update_deferred", &json!({ "version": update.version }));
            return Ok(ApplyOutcome::Deferred);
        }

        self.apply_now(update).await?;
        Ok(ApplyOutcome::Applied)
    }

    async fn apply_now(&self, update: &Update) -> Result<(), OtaError> {
        if let Err(error) = self.commit(update).await {
            let _ = self
                .inner
                .state
                .push_history(HistoryRecord::failure(&update.version, error.to_string()))
                .await;
            self.inner.events.track(
                "ota_update_failed",
                &json!({ "version": update.version, "error": error.to_string() }),
            );
            return Err(error);
        }

        self.inner
            .state
            .push_history(HistoryRecord::success(&update.version))
            .await?;

        for feature in &update.config.features {
            if let Err(error) = self.inner.flags.enable(feature).await {
                let error = OtaError::from(error);
                let _ = self
                    .inner
                    .state
                    .push_history(HistoryRecord::failure(&update.version, error.to_string()))
                    .await;
                self.inner.events.track(
                    "ota_update_failed",
                    &json!({ "version": update.version, "error": error.to_string() }),
                );
                return Err(error);
            }
        }

        info!("applied update {}", update.version);
        self.inner
            .events
            .track("ota_update_applied", &json!({ "version": update.version }));
        Ok(())
    }

    async fn commit(&self, update: &Update) -> Result<(), OtaError> {
        // The backup must land before the new state is committed; a crash in
        // between leaves the previous state fully recoverable.
        if let (Some(version), Some(config)) = (
            self.inner.state.current_version().await?,
            self.inner.state.current_config().await?,
        ) {
            self.inner.state.set_backup(&version, &config).await?;
        }

        if !verify_config_checksum(&update.config) {
            return Err(OtaError::ChecksumMismatch);
        }

        self.inner.state.set_current_config(&update.config).await?;
        self.inner.state.set_current_version(&update.version).await?;
        self.inner.state.set_applied_at(Utc::now()).await?;

        match update.config.effects.as_deref() {
            Some(payload) => self.inner.state.set_effects_payload(payload).await?,
            None => self.inner.state.clear_effects_payload().await?,
        }
        Ok(())
    }

    /// Roll back to `target_version`, or to whatever the control plane or the
    /// local backup considers "previous" when omitted.
    ///
    /// The server-authoritative path is tried first; the local backup slot is
    /// the fallback. A rollback update served by the control plane is applied
    /// immediately, ignoring any rollout schedule it carries.
    ///
    /// # Errors
    /// Returns [`OtaError::NoRollbackData`] when neither path yields data; in
    /// that case nothing was mutated.
    pub async fn rollback(
        &self,
        target_version: Option<&str>,
    ) -> Result<RollbackOutcome, OtaError> {
        let _guard = self.inner.apply_lock.lock().await;
        let previous = self.current_version().await?;
        let device = self
            .inner
            .identity
            .device_id()
            .await
            .unwrap_or_else(|| "unknown".to_string());

        if let Some(update) = self
            .inner
            .fetcher
            .request_rollback(&previous, &device, target_version)
            .await
        {
            self.apply_now(&update).await?;
            self.inner
                .state
                .push_history(
                    HistoryRecord::success(&update.version).rolled_back_from(previous.clone()),
                )
                .await?;
            info!("rolled back to {} via control plane", update.version);
            self.inner.events.track(
                "ota_rollback",
                &json!({ "from": previous, "to": update.version, "source": "server" }),
            );
            return Ok(RollbackOutcome::Server {
                version: update.version,
            });
        }

        if let Some((backup_version, backup_config)) = self.inner.state.backup().await? {
            self.inner.state.set_current_config(&backup_config).await?;
            self.inner.state.set_current_version(&backup_version).await?;
            self.inner.state.clear_effects_payload().await?;
            self.inner
                .state
                .push_history(
                    HistoryRecord::success(&backup_version).rolled_back_from(previous.clone()),
                )
                .await?;
            info!("rolled back to {backup_version} from local backup");
            self.inner.events.track(
                "ota_rollback",
                &json!({ "from": previous, "to": backup_version, "source": "backup" }),
            );
            return Ok(RollbackOutcome::LocalBackup {
                version: backup_version,
            });
        }

        Err(OtaError::NoRollbackData)
    }

    /// Re-evaluate queued updates and apply those whose rollout window has
    /// opened. Returns the versions applied this pass.
    ///
    /// An entry leaves the queue once its window has opened, whether or not
    /// the apply succeeded; failures are recorded in the history log.
    ///
    /// # Errors
    /// Returns an error when the queue itself cannot be read or rewritten.
    pub async fn process_scheduled(&self) -> Result<Vec<String>, OtaError> {
        let _guard = self.inner.apply_lock.lock().await;
        let entries = self.inner.state.scheduled().await?;
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let mut retained = Vec::new();
        let mut applied = Vec::new();
        for entry in entries {
            let due = entry
                .update
                .schedule
                .as_ref()
                .is_none_or(|schedule| is_within_window(schedule, now));
            if due {
                match self.apply_now(&entry.update).await {
                    Ok(()) => applied.push(entry.update.version.clone()),
                    Err(error) => warn!(
                        "scheduled update {} failed to apply: {error}",
                        entry.update.version
                    ),
                }
            } else {
                retained.push(entry);
            }
        }

        self.inner.state.set_scheduled(&retained).await?;
        Ok(applied)
    }

    /// Run the pending effect payload, if any, under the configured hard
    /// timeout. Every outcome is non-fatal to the committed config state.
    ///
    /// # Errors
    /// Returns an error only when the payload slot itself cannot be read;
    /// parse failures, faults and timeouts are reported in the
    /// [`EffectsReport`].
    pub async fn run_pending_effects(&self) -> Result<EffectsReport, OtaError> {
        let Some(payload) = self.inner.state.effects_payload().await? else {
            return Ok(EffectsReport::NoPayload);
        };

        let effects = match parse_effects(&payload) {
            Ok(effects) => effects,
            Err(error) => {
                warn!("skipping invalid effect payload: {error}");
                return Ok(EffectsReport::Invalid);
            }
        };

        let timeout = Duration::from_secs(self.inner.options.effect_timeout_secs);
        match tokio::time::timeout(
            timeout,
            apply_effects(&effects, &self.inner.state, &self.inner.flags),
        )
        .await
        {
            Ok(Ok(count)) => {
                debug!("applied {count} pending effect operations");
                Ok(EffectsReport::Applied(count))
            }
            Ok(Err(error)) => {
                warn!("effect payload faulted: {error}");
                Ok(EffectsReport::Faulted)
            }
            Err(_) => {
                warn!("effect payload execution timed out");
                Ok(EffectsReport::TimedOut)
            }
        }
    }

    /// Open the realtime push channel. Incoming updates are validated and
    /// applied like polled ones; `on_update` fires after each successful
    /// apply. Enabling while already enabled is a no-op.
    pub fn enable_realtime(&self, on_update: Option<UpdateCallback>) {
        let mut guard = self
            .inner
            .realtime
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if guard.is_some() {
            debug!("realtime updates already enabled");
            return;
        }

        let options = RealtimeOptions {
            ws_url: self.inner.options.realtime_ws_url.clone(),
            sse_url: self.inner.options.realtime_sse_url.clone(),
            api_key: self.inner.options.api_key.clone(),
            reconnect_delay: Duration::from_secs(self.inner.options.reconnect_delay_secs),
            connect_timeout: Duration::from_secs(self.inner.options.connect_timeout_secs),
            user_agent: user_agent(),
        };
        let token = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(ChannelState::Disconnected);
        let handler: Arc<dyn PushHandler> = Arc::new(PushApply {
            manager: self.clone(),
            on_update,
        });

        tokio::spawn(run_channel(options, state_tx, token.clone(), handler));
        *guard = Some(RealtimeHandle {
            token,
            states: state_rx,
        });
    }

    /// Close the realtime channel and stop reconnecting.
    pub fn disable_realtime(&self) {
        let handle = self
            .inner
            .realtime
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.token.cancel();
            info!("realtime updates disabled");
        }
    }

    /// Current realtime channel state; `Disconnected` when realtime mode is
    /// off.
    #[must_use]
    pub fn realtime_state(&self) -> ChannelState {
        self.inner
            .realtime
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .as_ref()
            .map_or(ChannelState::Disconnected, |handle| *handle.states.borrow())
    }

    async fn record_checksum_rejection(&self, version: &str) -> Result<(), OtaError> {
        self.inner
            .state
            .push_history(HistoryRecord::failure(version, "checksum validation failed"))
            .await?;
        self.inner.events.track(
            "ota_update_failed",
            &json!({ "version": version, "error": "checksum validation failed" }),
        );
        Ok(())
    }
}

/// Bridges the realtime channel into the manager's validate-and-apply path.
struct PushApply {
    manager: OtaManager,
    on_update: Option<UpdateCallback>,
}

#[async_trait]
impl PushHandler for PushApply {
    async fn handle(&self, update: Update) {
        let manager = &self.manager;
        let current = match manager.current_version().await {
            Ok(version) => version,
            Err(error) => {
                warn!("cannot evaluate push update: {error}");
                return;
            }
        };
        let device_id = manager.inner.identity.device_id().await;

        match validate_update(
            &update,
            &current,
            &manager.inner.options.host_version,
            device_id.as_deref(),
        ) {
            Ok(()) => {}
            Err(Rejection::ChecksumMismatch) => {
                if let Err(error) = manager.record_checksum_rejection(&update.version).await {
                    warn!("failed to record checksum rejection: {error}");
                }
                return;
            }
            Err(rejection) => {
                debug!("discarding push update {}: {rejection}", update.version);
                return;
            }
        }

        match manager.apply_update(&update).await {
            Ok(ApplyOutcome::Applied) => {
                if let Some(callback) = &self.on_update {
                    callback(&update);
                }
            }
            Ok(ApplyOutcome::Deferred) => {}
            Err(error) => warn!("push update {} failed to apply: {error}", update.version),
        }
    }
}
