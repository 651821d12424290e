#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use barangay_board::{
    AppConfig, AppState, InMemoryRepository, MockStorageService, WordFilter, create_router,
    repository::RepositoryState, storage::StorageState,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const PASSWORD: &str = "correct-horse";

/// A router over the in-memory repository, plus a handle on that repository for
/// asserting on state the HTTP surface does not expose.
pub struct TestContext {
    pub app: Router,
    pub repo: Arc<InMemoryRepository>,
    pub config: AppConfig,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with(MockStorageService::new(), AppConfig::default())
    }

    pub fn with(storage: MockStorageService, config: AppConfig) -> Self {
        let repo = Arc::new(InMemoryRepository::new());
        let state = AppState {
            repo: repo.clone() as RepositoryState,
            storage: Arc::new(storage) as StorageState,
            moderation: Arc::new(WordFilter::with_default_words()),
            config: config.clone(),
        };
        Self {
            app: create_router(state),
            repo,
            config,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    /// Registers through the API and returns the created profile.
    pub async fn register(&self, username: &str) -> Value {
        let (status, body) = self
            .send(json_request(
                "POST",
                "/register/",
                None,
                Some(serde_json::json!({
                    "username": username,
                    "email": format!("{}@barangay.ph", username),
                    "password": PASSWORD,
                })),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "register {}: {}", username, body);
        body
    }

    pub async fn login(&self, username: &str, password: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/token")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!("username={}&password={}", username, password)))
            .unwrap();
        self.send(request).await
    }

    /// Registers the bootstrap admin and returns `(user id, bearer token)`.
    pub async fn bootstrap_admin(&self) -> (i64, String) {
        let profile = self.register("captain").await;
        let (status, body) = self.login("captain", PASSWORD).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        (
            profile["id"].as_i64().unwrap(),
            body["access_token"].as_str().unwrap().to_string(),
        )
    }

    pub async fn create_post(&self, token: &str, body: Value) -> Value {
        let (status, post) = self
            .send(json_request("POST", "/admin/posts/", Some(token), Some(body)))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", post);
        post
    }
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub fn document_request_payload() -> Value {
    serde_json::json!({
        "requester_name": "Juan Dela Cruz",
        "requester_age": 34,
        "date_of_birth": "1990-05-01",
        "address": "Purok 3, Barangay San Isidro",
        "document_type": "Barangay Clearance",
        "purpose": "Employment"
    })
}
