use std::time::Duration;

use log::{debug, warn};
use reqwest::StatusCode;

use crate::error::OtaError;
use crate::types::Update;

/// Result of one polling pass across the endpoint list.
#[derive(Debug)]
pub(crate) enum FetchOutcome {
    /// An admissible update was returned by some endpoint.
    Update(Box<Update>),
    /// An endpoint definitively answered "no update available".
    NoUpdate,
    /// Every endpoint was exhausted without a usable answer. `responded`
    /// records whether at least one endpoint produced a well-formed response,
    /// which still counts as a completed poll for rate-limiting purposes.
    Exhausted { responded: bool },
}

/// Polls the control plane for pending updates.
///
/// Endpoints are tried in priority order; each endpoint gets one attempt per
/// entry in the retry-delay table, sleeping the listed delay first. An HTTP
/// 204 short-circuits the whole pass; a definitive error status moves on to
/// the next endpoint immediately.
pub(crate) struct PollFetcher {
    client: reqwest::Client,
    endpoints: Vec<String>,
    api_key: String,
    retry_delays_secs: Vec<u64>,
}

impl PollFetcher {
    pub(crate) fn new(
        client: reqwest::Client,
        endpoints: Vec<String>,
        api_key: String,
        retry_delays_secs: Vec<u64>,
    ) -> Self {
        let retry_delays_secs = if retry_delays_secs.is_empty() {
            vec![0]
        } else {
            retry_delays_secs
        };
        Self {
            client,
            endpoints,
            api_key,
            retry_delays_secs,
        }
    }

    /// One full polling pass. `admit` decides whether a fetched update is
    /// acceptable; a rejected update sends the pass on to the next endpoint.
    pub(crate) async fn poll(
        &self,
        current_version: &str,
        device_id: &str,
        admit: &mut dyn FnMut(&Update) -> bool,
    ) -> FetchOutcome {
        let mut responded = false;

        for endpoint in &self.endpoints {
            for &delay_secs in &self.retry_delays_secs {
                if delay_secs > 0 {
                    tokio::time::sleep(Duration::from_secs(delay_secs)).await;
                }

                match self.fetch_once(endpoint, current_version, device_id).await {
                    Ok(Some(update)) => {
                        responded = true;
                        if admit(&update) {
                            return FetchOutcome::Update(Box::new(update));
                        }
                        debug!("endpoint {endpoint} offered inadmissible update {}", update.version);
                        break;
                    }
                    Ok(None) => {
                        debug!("endpoint {endpoint} reports no pending update");
                        return FetchOutcome::NoUpdate;
                    }
                    Err(error) if error.is_retryable() => {
                        warn!("update poll attempt against {endpoint} failed: {error}");
                    }
                    Err(error) => {
                        warn!("endpoint {endpoint} unusable this pass: {error}");
                        break;
                    }
                }
            }
        }

        FetchOutcome::Exhausted { responded }
    }

    async fn fetch_once(
        &self,
        endpoint: &str,
        current_version: &str,
        device_id: &str,
    ) -> Result<Option<Update>, OtaError> {
        let response = self
            .client
            .get(endpoint)
            .query(&[
                ("apiKey", self.api_key.as_str()),
                ("currentVersion", current_version),
                ("deviceId", device_id),
            ])
            .header("X-Device-ID", device_id)
            .header("X-Client-Version", current_version)
            .send()
            .await
            .map_err(|source| OtaError::Request {
                url: endpoint.to_string(),
                source,
            })?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(OtaError::Status {
                url: endpoint.to_string(),
                status: response.status(),
            });
        }

        response
            .json()
            .await
            .map(Some)
            .map_err(|source| OtaError::Parse {
                url: endpoint.to_string(),
                source,
            })
    }

    /// Ask the control endpoint for a rollback update. Any failure on this
    /// path reads as "server rollback unavailable" so the caller can fall
    /// back to the local backup.
    pub(crate) async fn request_rollback(
        &self,
        current_version: &str,
        device_id: &str,
        target_version: Option<&str>,
    ) -> Option<Update> {
        let endpoint = self.endpoints.first()?;

        let response = self
            .client
            .get(endpoint)
            .query(&[
                ("apiKey", self.api_key.as_str()),
                ("currentVersion", current_version),
                ("deviceId", device_id),
                ("action", "rollback"),
                ("targetVersion", target_version.unwrap_or("")),
            ])
            .send()
            .await;

        let response = match response {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!(
                    "server rollback unavailable: {endpoint} answered HTTP {}",
                    response.status()
                );
                return None;
            }
            Err(error) => {
                debug!("server rollback unavailable: {error}");
                return None;
            }
        };

        match response.json().await {
            Ok(update) => Some(update),
            Err(error) => {
                warn!("ignoring malformed rollback payload from {endpoint}: {error}");
                None
            }
        }
    }
}
