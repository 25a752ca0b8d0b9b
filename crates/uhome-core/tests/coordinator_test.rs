// Coordinator lifecycle tests against a wiremock vendor endpoint.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Duration as ChronoDuration, Utc};
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use uhome_api::{OAuthConfig, OAuthSession, TokenSet, UhomeClient};
use uhome_core::{
    Coordinator, CoordinatorConfig, CoreError, DeviceId, LockState, PollState,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn client_for(server: &MockServer) -> UhomeClient {
    let http = reqwest::Client::new();
    let mut config = OAuthConfig::new(
        "client-1",
        SecretString::from("client-secret".to_owned()),
    )
    .expect("stock endpoints parse");
    config.token_url = format!("{}/oauth/token", server.uri())
        .parse()
        .expect("mock token url parses");

    let tokens = TokenSet {
        access_token: SecretString::from("valid-token".to_owned()),
        refresh_token: SecretString::from("refresh-1".to_owned()),
        expires_at: Utc::now() + ChronoDuration::seconds(3600),
    };

    let session = Arc::new(OAuthSession::new(http.clone(), config, tokens));
    UhomeClient::from_reqwest(&format!("{}/action", server.uri()), http, session)
        .expect("client builds")
}

fn coordinator_for(server: &MockServer) -> Coordinator {
    Coordinator::new(client_for(server), CoordinatorConfig::default())
}

fn discovery_body() -> serde_json::Value {
    json!({
        "payload": {
            "devices": [
                {
                    "id": "aa:bb:cc:11:22:33",
                    "name": "Front Door",
                    "category": "SmartLock",
                    "deviceInfo": { "manufacturer": "U-tec", "model": "U-Bolt", "hwVersion": "1.0" },
                    "handleType": "utec-lock",
                    "attributes": { "batteryLevelRange": { "min": 0, "max": 100, "step": 1 } }
                }
            ]
        }
    })
}

fn query_body(lock_state: &str) -> serde_json::Value {
    json!({
        "payload": {
            "devices": [
                {
                    "id": "aa:bb:cc:11:22:33",
                    "states": [
                        { "capability": "st.healthCheck", "value": "Online" },
                        { "capability": "st.lock", "value": lock_state },
                        { "capability": "st.batteryLevel", "value": 80 }
                    ]
                }
            ]
        }
    })
}

async fn mount_op(server: &MockServer, name: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/action"))
        .and(body_partial_json(json!({ "header": { "name": name } })))
        .respond_with(response)
        .mount(server)
        .await;
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[tokio::test]
async fn start_discovers_once_then_refreshes_state() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/action"))
        .and(body_partial_json(json!({ "header": { "name": "Discovery" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(discovery_body()))
        .expect(1)
        .mount(&server)
        .await;
    mount_op(
        &server,
        "Query",
        ResponseTemplate::new(200).set_body_json(query_body("Unlocked")),
    )
    .await;

    let coordinator = coordinator_for(&server);
    assert_eq!(coordinator.current_state(), PollState::Uninitialized);

    coordinator.start().await.unwrap();
    assert_eq!(coordinator.current_state(), PollState::Ready);

    let devices = coordinator.devices();
    assert_eq!(devices.len(), 1);
    let attrs = devices[0].as_smart_lock().unwrap();
    assert_eq!(attrs.lock_state, Some(LockState::Unlocked));
    assert_eq!(attrs.battery.level, Some(80));

    // Extra manual refreshes must not re-run discovery (expect(1) above).
    coordinator.refresh_now().await;
    coordinator.shutdown().await;
}

#[tokio::test]
async fn discovery_failure_leaves_the_coordinator_uninitialized() {
    let server = MockServer::start().await;
    mount_op(&server, "Discovery", ResponseTemplate::new(500)).await;

    let coordinator = coordinator_for(&server);
    let result = coordinator.start().await;

    assert!(result.is_err());
    assert_eq!(coordinator.current_state(), PollState::Uninitialized);
    assert!(coordinator.devices().is_empty());
}

#[tokio::test]
async fn query_failure_degrades_but_retains_devices() {
    let server = MockServer::start().await;
    mount_op(
        &server,
        "Discovery",
        ResponseTemplate::new(200).set_body_json(discovery_body()),
    )
    .await;
    mount_op(&server, "Query", ResponseTemplate::new(500)).await;

    let coordinator = coordinator_for(&server);
    coordinator.start().await.unwrap();

    assert_eq!(coordinator.current_state(), PollState::Degraded);
    assert_eq!(coordinator.devices().len(), 1);
    coordinator.shutdown().await;
}

#[tokio::test]
async fn poll_state_alternates_with_tick_outcomes() {
    let server = MockServer::start().await;
    mount_op(
        &server,
        "Discovery",
        ResponseTemplate::new(200).set_body_json(discovery_body()),
    )
    .await;

    // First query succeeds, the second fails, the rest succeed again.
    Mock::given(method("POST"))
        .and(path("/action"))
        .and(body_partial_json(json!({ "header": { "name": "Query" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(query_body("Locked")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/action"))
        .and(body_partial_json(json!({ "header": { "name": "Query" } })))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_op(
        &server,
        "Query",
        ResponseTemplate::new(200).set_body_json(query_body("Locked")),
    )
    .await;

    let coordinator = coordinator_for(&server);
    coordinator.start().await.unwrap();
    assert_eq!(coordinator.current_state(), PollState::Ready);

    assert_eq!(coordinator.refresh_now().await, PollState::Degraded);
    // Degraded never resets the device list.
    assert_eq!(coordinator.devices().len(), 1);

    assert_eq!(coordinator.refresh_now().await, PollState::Ready);
    coordinator.shutdown().await;
}

// ── Optimistic command protocol ─────────────────────────────────────

#[tokio::test]
async fn lock_command_runs_the_optimistic_sequence() {
    let server = MockServer::start().await;
    mount_op(
        &server,
        "Discovery",
        ResponseTemplate::new(200).set_body_json(discovery_body()),
    )
    .await;
    mount_op(
        &server,
        "Query",
        ResponseTemplate::new(200).set_body_json(query_body("Unlocked")),
    )
    .await;
    mount_op(
        &server,
        "Lock",
        ResponseTemplate::new(200).set_body_json(json!({
            "payload": {
                "devices": [
                    {
                        "id": "aa:bb:cc:11:22:33",
                        "states": [ { "capability": "st.deferredResponse", "value": 1 } ]
                    }
                ]
            }
        })),
    )
    .await;

    let coordinator = coordinator_for(&server);
    coordinator.start().await.unwrap();

    let id = DeviceId::new("aa:bb:cc:11:22:33");
    let before = coordinator.store().get(&id).unwrap();
    let attrs = before.as_smart_lock().unwrap();
    assert_eq!(attrs.lock_state, Some(LockState::Unlocked));
    assert!(!attrs.assumed_state);

    let mut rx = coordinator.store().subscribe();
    rx.borrow_and_update();

    let started = Instant::now();
    let command = {
        let coordinator = coordinator.clone();
        let id = id.clone();
        tokio::spawn(async move { coordinator.lock(&id).await })
    };

    // The optimistic state is observable while the command is still
    // inside its deferred wait.
    tokio::time::timeout(Duration::from_secs(5), rx.changed())
        .await
        .expect("optimistic state notifies")
        .unwrap();
    let optimistic = rx.borrow_and_update().clone();
    let attrs = optimistic[0].as_smart_lock().unwrap();
    assert_eq!(attrs.lock_state, Some(LockState::Locked));
    assert!(attrs.assumed_state);
    assert!(!command.is_finished());

    // The command blocks for the full deferred window.
    let deferred = command.await.unwrap().unwrap();
    assert_eq!(deferred, Duration::from_secs(1));
    assert!(started.elapsed() >= Duration::from_secs(1));

    // The requested reconciling poll produces the next notification.
    tokio::time::timeout(Duration::from_secs(5), rx.changed())
        .await
        .expect("reconciling refresh notifies")
        .unwrap();

    coordinator.shutdown().await;
}

#[tokio::test]
async fn missing_deferred_response_fails_before_mutating_state() {
    let server = MockServer::start().await;
    mount_op(
        &server,
        "Discovery",
        ResponseTemplate::new(200).set_body_json(discovery_body()),
    )
    .await;
    mount_op(
        &server,
        "Query",
        ResponseTemplate::new(200).set_body_json(query_body("Unlocked")),
    )
    .await;
    mount_op(
        &server,
        "Lock",
        ResponseTemplate::new(200).set_body_json(json!({
            "payload": {
                "devices": [
                    {
                        "id": "aa:bb:cc:11:22:33",
                        "states": [ { "capability": "st.lock", "value": "Locked" } ]
                    }
                ]
            }
        })),
    )
    .await;

    let coordinator = coordinator_for(&server);
    coordinator.start().await.unwrap();

    let id = DeviceId::new("aa:bb:cc:11:22:33");
    let result = coordinator.lock(&id).await;
    assert!(
        matches!(result, Err(CoreError::MalformedResponse { .. })),
        "expected MalformedResponse, got: {result:?}"
    );

    // No optimistic mutation happened.
    let device = coordinator.store().get(&id).unwrap();
    let attrs = device.as_smart_lock().unwrap();
    assert_eq!(attrs.lock_state, Some(LockState::Unlocked));
    assert!(!attrs.assumed_state);

    coordinator.shutdown().await;
}

#[tokio::test]
async fn commanding_an_unknown_device_fails() {
    let server = MockServer::start().await;
    mount_op(
        &server,
        "Discovery",
        ResponseTemplate::new(200).set_body_json(discovery_body()),
    )
    .await;
    mount_op(
        &server,
        "Query",
        ResponseTemplate::new(200).set_body_json(query_body("Unlocked")),
    )
    .await;

    let coordinator = coordinator_for(&server);
    coordinator.start().await.unwrap();

    let result = coordinator.lock(&DeviceId::new("no:such:device")).await;
    assert!(matches!(result, Err(CoreError::DeviceNotFound { .. })));
    coordinator.shutdown().await;
}

#[tokio::test]
async fn shutdown_during_deferred_wait_leaves_the_device_flagged() {
    let server = MockServer::start().await;
    mount_op(
        &server,
        "Discovery",
        ResponseTemplate::new(200).set_body_json(discovery_body()),
    )
    .await;
    mount_op(
        &server,
        "Query",
        ResponseTemplate::new(200).set_body_json(query_body("Unlocked")),
    )
    .await;
    mount_op(
        &server,
        "Unlock",
        ResponseTemplate::new(200).set_body_json(json!({
            "payload": {
                "devices": [
                    {
                        "id": "aa:bb:cc:11:22:33",
                        "states": [ { "capability": "st.deferredResponse", "value": 30 } ]
                    }
                ]
            }
        })),
    )
    .await;

    let coordinator = coordinator_for(&server);
    coordinator.start().await.unwrap();

    let id = DeviceId::new("aa:bb:cc:11:22:33");
    let command = {
        let coordinator = coordinator.clone();
        let id = id.clone();
        tokio::spawn(async move { coordinator.unlock(&id).await })
    };

    // Let the command reach its deferred wait, then shut down.
    tokio::time::sleep(Duration::from_millis(200)).await;
    coordinator.shutdown().await;

    let result = command.await.unwrap();
    assert!(
        matches!(result, Err(CoreError::Cancelled { .. })),
        "expected Cancelled, got: {result:?}"
    );

    // The device stays flagged: the assumed state was never reconciled.
    let device = coordinator.store().get(&id).unwrap();
    let attrs = device.as_smart_lock().unwrap();
    assert_eq!(attrs.lock_state, Some(LockState::Unlocked));
    assert!(attrs.assumed_state);
}

#[tokio::test]
async fn request_refresh_wakes_the_poll_task() {
    let server = MockServer::start().await;
    mount_op(
        &server,
        "Discovery",
        ResponseTemplate::new(200).set_body_json(discovery_body()),
    )
    .await;
    mount_op(
        &server,
        "Query",
        ResponseTemplate::new(200).set_body_json(query_body("Locked")),
    )
    .await;

    let coordinator = coordinator_for(&server);
    coordinator.start().await.unwrap();

    let mut rx = coordinator.store().subscribe();
    rx.borrow_and_update();

    coordinator.request_refresh();

    tokio::time::timeout(Duration::from_secs(5), rx.changed())
        .await
        .expect("manual refresh notifies subscribers")
        .unwrap();

    coordinator.shutdown().await;
}
