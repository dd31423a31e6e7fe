//! End-to-end pairing flow over real HTTP

mod common;

use std::time::Duration;

use pairlink_core::{DisconnectCause, LifecycleConfig, SessionPhase, TransportEvent};
use reqwest::StatusCode;
use serde_json::Value;

async fn create_session(client: &reqwest::Client, server: &common::TestServer) -> String {
    let body: Value = client
        .post(server.url("/api/create-session"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    body["sessionId"].as_str().unwrap().to_string()
}

async fn wait_for(server: &common::TestServer, id: &str, phase: SessionPhase) {
    for _ in 0..200 {
        if server.state.registry().get(id).await.map(|s| s.phase) == Some(phase) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("session {id} never reached {phase}");
}

#[tokio::test]
async fn full_pairing_flow() {
    let server = common::create_test_server_with_config(LifecycleConfig {
        settle_delay: Duration::from_millis(50),
        teardown_delay: Duration::from_millis(300),
        ..Default::default()
    })
    .await;
    let client = reqwest::Client::new();

    let id = create_session(&client, &server).await;
    assert!(id.starts_with("PAIRLINK-"));

    let qr = client.get(server.url(&format!("/api/qr/{id}"))).send().await.unwrap();
    assert_eq!(qr.status(), StatusCode::NO_CONTENT);

    let start = client
        .post(server.url(&format!("/api/start/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(start.status(), StatusCode::OK);

    let code = TransportEvent::PairingCode {
        code: "2@integration".to_string(),
    };
    assert!(server.factory.emit(&id, code).await);
    wait_for(&server, &id, SessionPhase::AwaitingScan).await;

    let qr = client.get(server.url(&format!("/api/qr/{id}"))).send().await.unwrap();
    assert_eq!(qr.status(), StatusCode::OK);
    let body: Value = qr.json().await.unwrap();
    assert!(body["qr"].as_str().unwrap().starts_with("data:image/png;base64,"));

    let connected = TransportEvent::Connected {
        identity: "1234567:5@s.whatsapp.net".to_string(),
    };
    assert!(server.factory.emit(&id, connected).await);
    wait_for(&server, &id, SessionPhase::Connected).await;

    let qr = client.get(server.url(&format!("/api/qr/{id}"))).send().await.unwrap();
    assert_eq!(qr.status(), StatusCode::NO_CONTENT);

    wait_for(&server, &id, SessionPhase::Suspended).await;

    let transport = server.factory.latest(&id).unwrap();
    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|m| m.target == "1234567@s.whatsapp.net"));
    assert!(transport.is_closed());
    assert_eq!(server.store.upload_log().await, vec![format!("{id}.zip")]);

    let status: Value = client
        .get(server.url(&format!("/api/sessions/{id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["phase"], "suspended");
    assert_eq!(status["live"], false);

    server.shutdown.cancel();
}

#[tokio::test]
async fn logged_out_session_can_be_restarted_by_caller() {
    let server = common::create_test_server().await;
    let client = reqwest::Client::new();
    let id = create_session(&client, &server).await;

    client
        .post(server.url(&format!("/api/start/{id}")))
        .send()
        .await
        .unwrap();
    let logout = TransportEvent::Disconnected {
        cause: DisconnectCause::LoggedOut,
    };
    assert!(server.factory.emit(&id, logout).await);

    for _ in 0..200 {
        if server.state.registry().get(&id).await.is_some_and(|s| !s.live) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(server.factory.created_count(&id), 1);

    let restart = client
        .post(server.url(&format!("/api/start/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(restart.status(), StatusCode::OK);
    assert_eq!(server.factory.created_count(&id), 2);

    server.shutdown.cancel();
}

#[tokio::test]
async fn unknown_session_errors_are_json() {
    let server = common::create_test_server().await;
    let client = reqwest::Client::new();

    for (method, path) in [
        (reqwest::Method::GET, "/api/qr/PAIRLINK-unknown"),
        (reqwest::Method::POST, "/api/start/PAIRLINK-unknown"),
        (reqwest::Method::GET, "/api/sessions/PAIRLINK-unknown"),
    ] {
        let response = client
            .request(method, server.url(path))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "Session not found");
    }

    server.shutdown.cancel();
}
