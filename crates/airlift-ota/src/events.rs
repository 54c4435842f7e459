use log::debug;

/// Fire-and-forget analytics seam. Implementations must never block or fail
/// loudly; rollout outcomes are reported best-effort and a lost event is
/// acceptable.
pub trait EventSink: Send + Sync {
    fn track(&self, event: &str, properties: &serde_json::Value);
}

/// Default sink: events go to the debug log.
pub struct LogSink;

impl EventSink for LogSink {
    fn track(&self, event: &str, properties: &serde_json::Value) {
        debug!("analytics event {event}: {properties}");
    }
}

/// Sink that drops everything, for hosts without an analytics pipeline.
pub struct NoopSink;

impl EventSink for NoopSink {
    fn track(&self, _event: &str, _properties: &serde_json::Value) {}
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Test sink recording event names.
    struct RecordingSink {
        events: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
            }
        }
    }

    impl EventSink for RecordingSink {
        fn track(&self, event: &str, _properties: &serde_json::Value) {
            self.events
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(event.to_string());
        }
    }

    #[test]
    fn recording_sink_collects_event_names() {
        let sink = RecordingSink::new();
        sink.track("ota_update_applied", &serde_json::json!({"version": "1.1.0"}));

        let events = sink
            .events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        assert_eq!(events.as_slice(), ["ota_update_applied"]);
    }
}
