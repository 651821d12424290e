use barangay_board::{
    AppConfig, AppState, InMemoryRepository, MockStorageService, WordFilter, create_router,
    repository::RepositoryState, storage::StorageState,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Debug)]
pub struct TestApp {
    pub address: String,
}

async fn spawn_app() -> TestApp {
    let state = AppState {
        repo: Arc::new(InMemoryRepository::new()) as RepositoryState,
        storage: Arc::new(MockStorageService::new()) as StorageState,
        moderation: Arc::new(WordFilter::with_default_words()),
        config: AppConfig::default(),
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp { address }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let response = reqwest::get(format!("{}/health", app.address))
        .await
        .expect("req fail");

    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = spawn_app().await;
    let doc: Value = reqwest::get(format!("{}/api-docs/openapi.json", app.address))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(doc["paths"].get("/document-requests/status/{token}").is_some());
    assert!(doc["paths"].get("/admin/posts/").is_some());
}

#[tokio::test]
async fn test_announcement_lifecycle() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    // Bootstrap admin
    let response = client
        .post(format!("{}/register/", app.address))
        .json(&json!({
            "username": "captain",
            "email": "captain@barangay.ph",
            "password": "correct-horse"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    let token: Value = client
        .post(format!("{}/token", app.address))
        .header("content-type", "application/x-www-form-urlencoded")
        .body("username=captain&password=correct-horse")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let bearer = token["access_token"].as_str().unwrap().to_string();

    // Publish
    let response = client
        .post(format!("{}/admin/posts/", app.address))
        .bearer_auth(&bearer)
        .json(&json!({ "title": "Vaccination day", "content": "Health center, 8am." }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let post: Value = response.json().await.unwrap();

    // A resident comments
    let response = client
        .post(format!("{}/posts/{}/comments/", app.address, post["id"]))
        .json(&json!({ "content": "Salamat po!" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    let listed: Value = client
        .get(format!("{}/posts/", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed[0]["comments"][0]["author_name"], "Anonymous");
}

#[tokio::test]
async fn test_document_request_round_trip_over_http() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let created: Value = client
        .post(format!("{}/document-requests/", app.address))
        .json(&json!({
            "requester_name": "Juan Dela Cruz",
            "requester_age": 34,
            "date_of_birth": "1990-05-01",
            "address": "Purok 3",
            "document_type": "Barangay ID",
            "purpose": "Identification"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let status = client
        .get(format!(
            "{}/document-requests/status/{}",
            app.address,
            created["request_token"].as_str().unwrap()
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(status.status(), 200);
    let view: Value = status.json().await.unwrap();
    assert_eq!(view["status"], "pending");
}
