//! Common test utilities and helpers
//!
//! Every integration test runs against an in-memory app. Requests go through
//! the real router with `tower::ServiceExt::oneshot`, so extractors, error
//! mapping and middleware are all exercised.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use xfchat::backend::create_memory_app;
use xfchat::backend::AppState;
use xfchat::shared::{AppConfig, MediaConfig};

pub const PASSWORD: &str = "password123";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

/// A logged-in user on one device
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub username: String,
    pub token: String,
    pub device_id: String,
}

pub fn test_config() -> AppConfig {
    AppConfig::builder()
        .jwt_secret("integration-test-secret")
        .bcrypt_cost(4)
        .build()
        .expect("valid test config")
}

pub fn spawn_app() -> TestApp {
    spawn_app_with(test_config())
}

pub fn spawn_app_with(config: AppConfig) -> TestApp {
    let (router, state) = create_memory_app(config).expect("app should build");
    TestApp { router, state }
}

/// Config pointing media uploads at `base_url`
pub fn media_config(base_url: &str) -> AppConfig {
    AppConfig::builder()
        .jwt_secret("integration-test-secret")
        .bcrypt_cost(4)
        .media(MediaConfig {
            base_url: base_url.to_string(),
            api_key: None,
            max_upload_bytes: 1024,
        })
        .build()
        .expect("valid test config")
}

impl TestApp {
    /// Send a JSON request; returns the status and the parsed body (`Null` when empty)
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request should build");

        self.send(request).await
    }

    /// Send a raw body with the given content type
    pub async fn upload(
        &self,
        uri: &str,
        token: &str,
        content_type: &str,
        bytes: &'static [u8],
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(bytes))
            .expect("request should build");
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should read");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn signup(&self, username: &str) -> Uuid {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/auth/signup",
                None,
                Some(json!({ "username": username, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "signup failed: {}", body);
        body["user"]["id"]
            .as_str()
            .and_then(|id| id.parse().ok())
            .expect("user id in signup response")
    }

    pub async fn login(&self, username: &str) -> TestUser {
        self.login_as(username, "test-device").await
    }

    pub async fn login_as(&self, username: &str, device_type: &str) -> TestUser {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "username": username, "password": PASSWORD, "deviceType": device_type })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        TestUser {
            id: body["user"]["id"]
                .as_str()
                .and_then(|id| id.parse().ok())
                .expect("user id in login response"),
            username: username.to_string(),
            token: body["token"].as_str().expect("token").to_string(),
            device_id: body["deviceId"].as_str().expect("deviceId").to_string(),
        }
    }

    /// Sign up and log in on one device
    pub async fn user(&self, username: &str) -> TestUser {
        self.signup(username).await;
        self.login(username).await
    }

    /// Send a direct text message and return its id
    pub async fn send_direct(&self, from: &TestUser, to: &TestUser, content: &str) -> Uuid {
        let (status, body) = self
            .post(
                "/api/messages",
                &from.token,
                json!({ "target": to.id, "content": content }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "send failed: {}", body);
        body["id"].as_str().and_then(|id| id.parse().ok()).expect("message id")
    }
}
