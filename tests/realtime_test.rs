//! Real-time routing integration tests
//!
//! Devices are attached straight to the Presence Registry, the same way the
//! `/ws` endpoint attaches them, and the HTTP API drives the events.

mod common;

use axum::http::{Method, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::json;
use xfchat::backend::middleware::AuthSession;
use xfchat::backend::realtime::attach_device;
use xfchat::shared::{EventType, RealtimeEvent};

use common::spawn_app;

fn drain(receiver: &mut tokio::sync::mpsc::UnboundedReceiver<RealtimeEvent>) -> Vec<RealtimeEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_message_reaches_receiver_and_senders_other_devices() {
    let app = spawn_app();
    app.signup("alice").await;
    let phone = app.login_as("alice", "phone").await;
    let laptop = app.login_as("alice", "laptop").await;
    app.signup("bob").await;
    let bob = app.login_as("bob", "desktop").await;
    let bob_tablet = app.login_as("bob", "tablet").await;

    let presence = &app.state.presence;
    let mut phone_conn = presence.connect(phone.id, &phone.device_id).await;
    let mut laptop_conn = presence.connect(laptop.id, &laptop.device_id).await;
    let mut bob_conn = presence.connect(bob.id, &bob.device_id).await;
    let mut bob_tablet_conn = presence.connect(bob.id, &bob_tablet.device_id).await;

    let message_id = app.send_direct(&phone, &bob, "on my way").await;

    // Every device of the receiver gets the full message
    for conn in [&mut bob_conn, &mut bob_tablet_conn] {
        let events = drain(&mut conn.receiver);
        assert_eq!(events.len(), 1);
        let payload = &events[0].payload;
        assert_eq!(events[0].event_type, EventType::Message);
        assert_eq!(payload["id"], json!(message_id));
        assert_eq!(payload["content"], "on my way");
        assert_eq!(payload["sender"], json!(phone.id));
        assert_eq!(payload["isYour"], false);
        let status = payload["status"].as_array().unwrap();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0]["userId"], json!(bob.id));
        assert_eq!(status[0]["status"], "sent");
    }

    // Echo to the laptop, nothing back to the sending phone
    let laptop_events = drain(&mut laptop_conn.receiver);
    assert_eq!(laptop_events.len(), 1);
    assert_eq!(laptop_events[0].payload["isYour"], true);
    assert!(drain(&mut phone_conn.receiver).is_empty());

    // Read receipt goes to every sender device
    let (status, _) = app
        .request(
            Method::PATCH,
            &format!("/api/messages/{}/seen", message_id),
            Some(&bob.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    for conn in [&mut phone_conn, &mut laptop_conn] {
        let events = drain(&mut conn.receiver);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::StatusUpdate);
        assert_eq!(events[0].payload["status"], "read");
        assert_eq!(events[0].payload["overallStatus"], "read");
    }

    // A repeat mark pushes nothing
    app.request(
        Method::PATCH,
        &format!("/api/messages/{}/seen", message_id),
        Some(&bob.token),
        None,
    )
    .await;
    assert!(drain(&mut phone_conn.receiver).is_empty());
}

#[tokio::test]
async fn test_evicted_device_is_disconnected() {
    let app = spawn_app();
    app.signup("alice").await;
    let first = app.login_as("alice", "device-1").await;
    let mut conn = app.state.presence.connect(first.id, &first.device_id).await;

    for n in 2..=5 {
        app.login_as("alice", &format!("device-{}", n)).await;
    }

    let event = conn.receiver.recv().await.expect("revocation event");
    assert_eq!(event.event_type, EventType::SessionRevoked);
    assert_eq!(event.payload["deviceId"], json!(first.device_id));
    assert!(conn.receiver.recv().await.is_none());
    assert!(!app.state.presence.is_online(first.id).await);
}

#[tokio::test]
async fn test_delete_for_everyone_notifies_participants() {
    let app = spawn_app();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let message_id = app.send_direct(&alice, &bob, "oops").await;

    let mut bob_conn = app.state.presence.connect(bob.id, &bob.device_id).await;
    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/api/messages/{}?for_everyone=true", message_id),
            Some(&alice.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let events = drain(&mut bob_conn.receiver);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::MessageDeleted);
    assert_eq!(events[0].payload["messageId"], json!(message_id));
}

#[tokio::test]
async fn test_logout_closes_only_that_device() {
    let app = spawn_app();
    app.signup("alice").await;
    let phone = app.login_as("alice", "phone").await;
    let laptop = app.login_as("alice", "laptop").await;

    let mut phone_conn = app.state.presence.connect(phone.id, &phone.device_id).await;
    let _laptop_conn = app.state.presence.connect(laptop.id, &laptop.device_id).await;

    let (status, _) = app
        .request(Method::POST, "/api/auth/logout", Some(&phone.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(
        phone_conn.receiver.recv().await.map(|e| e.event_type),
        Some(EventType::SessionRevoked)
    );
    assert_eq!(
        app.state.presence.connected_devices(laptop.id).await,
        vec![laptop.device_id.clone()]
    );
}

#[tokio::test]
async fn test_device_revoked_before_attach_is_not_registered() {
    let app = spawn_app();
    app.signup("alice").await;
    let phone = app.login_as("alice", "phone").await;
    let laptop = app.login_as("alice", "laptop").await;
    let bob = app.user("bob").await;

    // Revoked after the upgrade was authorized, before the handle exists
    let phone_auth = AuthSession {
        user_id: phone.id,
        device_id: phone.device_id.clone(),
    };
    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/api/auth/sessions/{}", phone.device_id),
            Some(&laptop.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert!(attach_device(&app.state, &phone_auth).await.is_none());
    assert!(!app.state.presence.is_online(phone.id).await);
    assert!(app.state.presence.connected_devices(phone.id).await.is_empty());

    // Later pushes reach only live devices
    let laptop_auth = AuthSession {
        user_id: laptop.id,
        device_id: laptop.device_id.clone(),
    };
    let mut laptop_conn = attach_device(&app.state, &laptop_auth)
        .await
        .expect("live session attaches");
    app.send_direct(&bob, &laptop, "still there?").await;
    let events = drain(&mut laptop_conn.receiver);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].payload["content"], "still there?");
    assert_eq!(
        app.state.presence.connected_devices(laptop.id).await,
        vec![laptop.device_id.clone()]
    );
}
