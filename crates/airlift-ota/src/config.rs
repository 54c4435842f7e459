use serde::{Deserialize, Serialize};

/// Tunables of the update client. Everything except the API key has a
/// sensible default, so hosts usually construct this with [`OtaOptions::new`]
/// and override the few fields they care about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtaOptions {
    pub api_key: String,

    /// Update endpoints in priority order; the first entry doubles as the
    /// control endpoint for rollback requests.
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,

    /// Version of the embedding application, checked against an update's
    /// minimum host version.
    #[serde(default = "default_version")]
    pub host_version: String,

    /// Version reported before any update has ever been applied.
    #[serde(default = "default_version")]
    pub initial_version: String,

    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// Per-endpoint attempt delays; one poll attempt per entry.
    #[serde(default = "default_retry_delays")]
    pub retry_delays_secs: Vec<u64>,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_ws_url")]
    pub realtime_ws_url: String,

    #[serde(default = "default_sse_url")]
    pub realtime_sse_url: String,

    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,

    #[serde(default = "default_effect_timeout")]
    pub effect_timeout_secs: u64,
}

fn default_endpoints() -> Vec<String> {
    vec![
        "https://api.airlift.dev/ota".to_string(),
        "https://cdn.airlift.dev/ota".to_string(),
    ]
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_check_interval() -> u64 {
    21_600
}

fn default_retry_delays() -> Vec<u64> {
    vec![0, 5, 10]
}

fn default_http_timeout() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_ws_url() -> String {
    "wss://api.airlift.dev/ota/stream".to_string()
}

fn default_sse_url() -> String {
    "https://api.airlift.dev/ota/sse".to_string()
}

fn default_reconnect_delay() -> u64 {
    5
}

fn default_effect_timeout() -> u64 {
    5
}

impl OtaOptions {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoints: default_endpoints(),
            host_version: default_version(),
            initial_version: default_version(),
            check_interval_secs: default_check_interval(),
            retry_delays_secs: default_retry_delays(),
            http_timeout_secs: default_http_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            realtime_ws_url: default_ws_url(),
            realtime_sse_url: default_sse_url(),
            reconnect_delay_secs: default_reconnect_delay(),
            effect_timeout_secs: default_effect_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_json_fills_defaults() {
        let options: OtaOptions =
            serde_json::from_str(r#"{"api_key": "alk_live_1234"}"#).expect("options should parse");

        assert_eq!(options.api_key, "alk_live_1234");
        assert_eq!(options.check_interval_secs, 21_600);
        assert_eq!(options.retry_delays_secs, vec![0, 5, 10]);
        assert_eq!(options.endpoints.len(), 2);
        assert_eq!(options.effect_timeout_secs, 5);
    }

    #[test]
    fn overrides_survive_round_trip() {
        let mut options = OtaOptions::new("alk_test_0000");
        options.check_interval_secs = 60;
        options.endpoints = vec!["https://ota.example.com".to_string()];

        let encoded = serde_json::to_string(&options).expect("options should serialize");
        let decoded: OtaOptions = serde_json::from_str(&encoded).expect("options should parse");

        assert_eq!(decoded.check_interval_secs, 60);
        assert_eq!(decoded.endpoints, vec!["https://ota.example.com"]);
    }
}
