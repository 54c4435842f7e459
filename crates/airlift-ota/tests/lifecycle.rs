//! End-to-end lifecycle coverage over an in-memory store and loopback
//! control-plane servers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use airlift_ota::{
    ApplyOutcome, FixedDeviceIdentity, HISTORY_CAP, NoopSink, OtaManager, OtaOptions, Schedule,
    Update, UpdateConfig,
};
use airlift_store::MemoryStore;
use chrono::Utc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serve a fixed HTTP response for every incoming request, counting them.
async fn control_plane(status_line: &'static str, body: String) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("listener should have an address");
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            let body = body.clone();
            tokio::spawn(async move {
                let mut buffer = [0_u8; 4096];
                let _ = socket.read(&mut buffer).await;
                let response = format!(
                    "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
            });
        }
    });

    (format!("http://{addr}/ota"), hits)
}

fn manager_with_endpoints(endpoints: Vec<String>) -> OtaManager {
    let mut options = OtaOptions::new("alk_test_0000");
    options.endpoints = endpoints;
    options.retry_delays_secs = vec![0];

    OtaManager::new(
        options,
        Arc::new(MemoryStore::new()),
        Arc::new(FixedDeviceIdentity::new("device-test")),
        Arc::new(NoopSink),
    )
    .expect("manager should build")
}

fn offline_manager() -> OtaManager {
    manager_with_endpoints(Vec::new())
}

fn update(version: &str) -> Update {
    Update {
        version: version.to_string(),
        config: UpdateConfig::for_version(version),
        issued_at: Utc::now(),
        mandatory: false,
        rollback_version: None,
        target_devices: None,
        schedule: None,
    }
}

fn update_body(version: &str, extra: &str) -> String {
    format!(
        r#"{{
            "version": "{version}",
            "config": {{"version": "{version}", "features": ["x"]}},
            "timestamp": "2026-03-01T12:00:00Z",
            "mandatory": false{extra}
        }}"#
    )
}

#[tokio::test]
async fn poll_validate_apply_round_trip() {
    let (endpoint, _hits) = control_plane("200 OK", update_body("1.1.0", "")).await;
    let manager = manager_with_endpoints(vec![endpoint]);

    let fetched = manager
        .check_for_updates(true)
        .await
        .expect("check should succeed")
        .expect("an update should be offered");
    assert_eq!(fetched.version, "1.1.0");

    let outcome = manager
        .apply_update(&fetched)
        .await
        .expect("apply should succeed");
    assert_eq!(outcome, ApplyOutcome::Applied);

    assert_eq!(
        manager
            .current_version()
            .await
            .expect("version should load"),
        "1.1.0"
    );
    assert!(manager.flags().is_enabled("x").await);

    let history = manager.update_history().await.expect("history should load");
    assert_eq!(history.len(), 1);
    assert!(history[0].success);
}

#[tokio::test]
async fn repeat_polls_within_interval_hit_the_network_once() {
    let (endpoint, hits) = control_plane("204 No Content", String::new()).await;
    let manager = manager_with_endpoints(vec![endpoint]);

    let first = manager
        .check_for_updates(false)
        .await
        .expect("first check should succeed");
    let second = manager
        .check_for_updates(false)
        .await
        .expect("second check should succeed");

    assert!(first.is_none());
    assert!(second.is_none());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn update_targeting_other_devices_is_discarded_silently() {
    let body = update_body("1.1.0", r#", "targetDevices": ["some-other-device"]"#);
    let (endpoint, _hits) = control_plane("200 OK", body).await;
    let manager = manager_with_endpoints(vec![endpoint]);

    let fetched = manager
        .check_for_updates(true)
        .await
        .expect("check should succeed");

    assert!(fetched.is_none());
    assert!(
        manager
            .update_history()
            .await
            .expect("history should load")
            .is_empty(),
        "a targeting rejection must not leave a history trace"
    );
}

#[tokio::test]
async fn deferred_update_applies_once_its_window_opens() {
    let manager = offline_manager();

    let mut candidate = update("2.0.0");
    candidate.schedule = Some(Schedule {
        start_time: (Utc::now() + chrono::Duration::milliseconds(500)).to_rfc3339(),
        end_time: (Utc::now() + chrono::Duration::hours(1)).to_rfc3339(),
        timezone: "UTC".to_string(),
    });

    let outcome = manager
        .apply_update(&candidate)
        .await
        .expect("deferred apply should not error");
    assert_eq!(outcome, ApplyOutcome::Deferred);
    assert_eq!(
        manager
            .current_version()
            .await
            .expect("version should load"),
        "1.0.0"
    );

    // Before the window opens the sweep retains the entry.
    let applied = manager
        .process_scheduled()
        .await
        .expect("sweep should succeed");
    assert!(applied.is_empty());

    tokio::time::sleep(Duration::from_millis(800)).await;

    let applied = manager
        .process_scheduled()
        .await
        .expect("sweep should succeed");
    assert_eq!(applied, vec!["2.0.0".to_string()]);
    assert_eq!(
        manager
            .current_version()
            .await
            .expect("version should load"),
        "2.0.0"
    );

    // The queue is drained; another sweep is a no-op.
    let applied = manager
        .process_scheduled()
        .await
        .expect("sweep should succeed");
    assert!(applied.is_empty());
}

#[tokio::test]
async fn history_is_capped_at_fifty_records() {
    let manager = offline_manager();

    for i in 1..=55 {
        manager
            .apply_update(&update(&format!("1.0.{i}")))
            .await
            .expect("apply should succeed");
    }

    let history = manager.update_history().await.expect("history should load");
    assert_eq!(history.len(), HISTORY_CAP);
    assert_eq!(history[0].version, "1.0.55");
    assert_eq!(history[HISTORY_CAP - 1].version, "1.0.6");
}

#[tokio::test]
async fn apply_apply_rollback_restores_previous_version() {
    let manager = offline_manager();

    manager
        .apply_update(&update("1.1.0"))
        .await
        .expect("first apply should succeed");
    manager
        .apply_update(&update("1.2.0"))
        .await
        .expect("second apply should succeed");

    manager.rollback(None).await.expect("rollback should succeed");

    assert_eq!(
        manager
            .current_version()
            .await
            .expect("version should load"),
        "1.1.0"
    );
    let config = manager
        .current_config()
        .await
        .expect("config should load")
        .expect("config should be present");
    assert_eq!(config.version, "1.1.0");

    let history = manager.update_history().await.expect("history should load");
    assert_eq!(history[0].rollback_from.as_deref(), Some("1.2.0"));
}

#[tokio::test]
async fn server_rollback_takes_priority_over_local_backup() {
    // A control plane that serves a dedicated rollback build.
    let (endpoint, _hits) = control_plane("200 OK", update_body("1.1.5", "")).await;
    let manager = manager_with_endpoints(vec![endpoint]);

    manager
        .apply_update(&update("1.1.0"))
        .await
        .expect("first apply should succeed");
    manager
        .apply_update(&update("1.2.0"))
        .await
        .expect("second apply should succeed");

    let outcome = manager
        .rollback(Some("1.1.5"))
        .await
        .expect("rollback should succeed");

    assert_eq!(
        outcome,
        airlift_ota::RollbackOutcome::Server {
            version: "1.1.5".to_string()
        }
    );
    assert_eq!(
        manager
            .current_version()
            .await
            .expect("version should load"),
        "1.1.5"
    );
}
