use serde::{Deserialize, Serialize};

use crate::error::OtaError;
use crate::flags::FeatureFlags;
use crate::state::StateStore;

/// One whitelisted operation of the declarative effect payload.
///
/// Updates used to ship free-form scripts; the payload is now restricted to
/// this closed set of operations so a compromised control plane cannot make
/// the client run arbitrary code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Effect {
    EnableFeature {
        name: String,
    },
    DisableFeature {
        name: String,
    },
    SetSetting {
        key: String,
        value: serde_json::Value,
    },
    RemoveSetting {
        key: String,
    },
}

/// Parse a persisted effect payload. The payload is a JSON array of ops;
/// anything else, including unknown ops, is a parse error.
pub fn parse_effects(payload: &str) -> Result<Vec<Effect>, serde_json::Error> {
    serde_json::from_str(payload)
}

/// Apply `effects` in order against the persisted state and flag cache.
/// Returns the number of operations applied.
pub(crate) async fn apply_effects(
    effects: &[Effect],
    state: &StateStore,
    flags: &FeatureFlags,
) -> Result<usize, OtaError> {
    for effect in effects {
        match effect {
            Effect::EnableFeature { name } => flags.enable(name).await?,
            Effect::DisableFeature { name } => flags.disable(name).await?,
            Effect::SetSetting { key, value } => {
                let (key, value) = (key.clone(), value.clone());
                state
                    .update_settings(move |settings| {
                        settings.insert(key, value);
                    })
                    .await?;
            }
            Effect::RemoveSetting { key } => {
                let key = key.clone();
                state
                    .update_settings(move |settings| {
                        settings.remove(&key);
                    })
                    .await?;
            }
        }
    }
    Ok(effects.len())
}

/// Outcome of an effect-payload run. All variants are non-fatal to the
/// already-committed config state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectsReport {
    /// No payload is pending.
    NoPayload,
    /// The payload ran; carries the number of operations applied.
    Applied(usize),
    /// The payload was not valid effect JSON and was skipped.
    Invalid,
    /// A store fault interrupted the run.
    Faulted,
    /// The run exceeded its hard timeout and was abandoned.
    TimedOut,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use airlift_store::MemoryStore;

    use super::*;
    use crate::types::UpdateConfig;

    #[test]
    fn parses_known_operations() {
        let payload = r#"[
            {"op": "enableFeature", "name": "fast_sync"},
            {"op": "setSetting", "key": "batchSize", "value": 64},
            {"op": "removeSetting", "key": "legacyMode"},
            {"op": "disableFeature", "name": "beta_ui"}
        ]"#;

        let effects = parse_effects(payload).expect("payload should parse");

        assert_eq!(effects.len(), 4);
        assert_eq!(
            effects[0],
            Effect::EnableFeature {
                name: "fast_sync".to_string()
            }
        );
    }

    #[test]
    fn unknown_operation_is_a_parse_error() {
        let payload = r#"[{"op": "execShell", "cmd": "rm -rf /"}]"#;
        assert!(parse_effects(payload).is_err());
    }

    #[test]
    fn non_array_payload_is_a_parse_error() {
        assert!(parse_effects(r#"{"op": "enableFeature"}"#).is_err());
        assert!(parse_effects("console.log('hi')").is_err());
    }

    #[tokio::test]
    async fn apply_toggles_flags_and_settings() {
        let store = Arc::new(MemoryStore::new());
        let state = StateStore::new(store.clone());
        let flags = FeatureFlags::new(store);

        let mut config = UpdateConfig::for_version("1.0.0");
        config
            .settings
            .insert("legacyMode".to_string(), serde_json::json!(true));
        state
            .set_current_config(&config)
            .await
            .expect("config should persist");

        let effects = vec![
            Effect::EnableFeature {
                name: "fast_sync".to_string(),
            },
            Effect::SetSetting {
                key: "batchSize".to_string(),
                value: serde_json::json!(64),
            },
            Effect::RemoveSetting {
                key: "legacyMode".to_string(),
            },
        ];

        let applied = apply_effects(&effects, &state, &flags)
            .await
            .expect("effects should apply");
        assert_eq!(applied, 3);

        assert!(flags.is_enabled("fast_sync").await);
        let settings = state
            .current_config()
            .await
            .expect("config should load")
            .expect("config should be present")
            .settings;
        assert_eq!(settings.get("batchSize"), Some(&serde_json::json!(64)));
        assert!(!settings.contains_key("legacyMode"));
    }

    #[tokio::test]
    async fn setting_effects_without_config_are_noops() {
        let store = Arc::new(MemoryStore::new());
        let state = StateStore::new(store.clone());
        let flags = FeatureFlags::new(store);

        let effects = vec![Effect::SetSetting {
            key: "batchSize".to_string(),
            value: serde_json::json!(8),
        }];

        let applied = apply_effects(&effects, &state, &flags)
            .await
            .expect("effects should apply");
        assert_eq!(applied, 1);
        assert!(
            state
                .current_config()
                .await
                .expect("read should succeed")
                .is_none()
        );
    }
}
