use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a token. Residents read announcements, comment, file
/// and track document requests here; admins sign up and log in.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for the load balancer.
        .route("/health", get(|| async { "ok" }))
        // --- Accounts ---
        .route("/token", post(handlers::login))
        .route("/register/", post(handlers::register_user))
        // --- Announcements ---
        .route("/posts/", get(handlers::list_posts))
        .route("/posts/{id}", get(handlers::get_post))
        // Comments are public in both directions; new ones pass the word filter.
        .route(
            "/posts/{id}/comments/",
            get(handlers::list_post_comments).post(handlers::add_comment),
        )
        // --- Document Requests ---
        .route("/document-requests/", post(handlers::create_document_request))
        // Tracking is by token only; the numeric id never leaves the admin side.
        .route(
            "/document-requests/status/{token}",
            get(handlers::get_request_status),
        )
        // --- Officials ---
        .route("/officials/", get(handlers::list_officials))
        .route("/officials/{id}", get(handlers::get_official))
}
