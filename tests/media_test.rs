//! Media upload integration tests against a mock object store

mod common;

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use uuid::Uuid;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{media_config, spawn_app_with};

async fn object_store() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/media/.+"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_upload_returns_object_url() {
    let server = object_store().await;
    let app = spawn_app_with(media_config(&format!("{}/media", server.uri())));
    let alice = app.user("alice").await;

    let (status, body) = app
        .upload("/api/media?file_name=cat.png", &alice.token, "image/png", b"png-bytes")
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let url = body["url"].as_str().unwrap();
    assert!(url.starts_with(&format!("{}/media/", server.uri())));
    assert!(url.ends_with("-cat.png"));
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let server = object_store().await;
    let app = spawn_app_with(media_config(&format!("{}/media", server.uri())));
    let alice = app.user("alice").await;

    static BIG: [u8; 2048] = [7u8; 2048];
    let (status, body) = app
        .upload("/api/media", &alice.token, "application/octet-stream", &BIG)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_input");
}

#[tokio::test]
async fn test_media_message_infers_type() {
    let server = object_store().await;
    let app = spawn_app_with(media_config(&format!("{}/media", server.uri())));
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;

    let (status, body) = app
        .upload(
            &format!("/api/messages/media?target={}&file_name=clip.ogg", bob.id),
            &alice.token,
            "audio/ogg",
            b"ogg-bytes",
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["messageType"], "audio");
    assert!(body["mediaUrl"].as_str().unwrap().ends_with("-clip.ogg"));
}

#[tokio::test]
async fn test_failed_send_removes_upload() {
    let server = object_store().await;
    Mock::given(method("DELETE"))
        .and(path_regex(r"^/media/.+"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    let app = spawn_app_with(media_config(&format!("{}/media", server.uri())));
    let alice = app.user("alice").await;

    let (status, _) = app
        .upload(
            &format!("/api/messages/media?target={}", Uuid::new_v4()),
            &alice.token,
            "image/jpeg",
            b"jpeg-bytes",
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
