use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, patch, post, put},
};

/// Admin Router Module
///
/// Nested under `/admin`. Every handler takes the `AdminUser` extractor, which answers
/// 401 without a valid token and 403 for accounts that are not approved admins.
/// Each mutation here also appends to the activity log.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // --- Account approval ---
        .route("/pending", get(handlers::list_pending_users))
        .route("/approve/{id}", put(handlers::approve_user))
        // POST /admin/generate-upload-url
        // Presigned PUT (10 minutes, content type pinned) for post media.
        .route("/generate-upload-url", post(handlers::generate_upload_url))
        // --- Announcements ---
        .route("/posts/", post(handlers::create_post))
        .route(
            "/posts/{id}",
            put(handlers::update_post).delete(handlers::delete_post),
        )
        // --- Comment moderation ---
        .route("/comments/", get(handlers::list_comments))
        .route("/comments/{id}", delete(handlers::delete_comment))
        .route("/comments/{id}/flag", patch(handlers::flag_comment))
        .route("/comments/{id}/unflag", patch(handlers::unflag_comment))
        // --- Document requests ---
        .route("/document-requests/", get(handlers::list_document_requests))
        .route(
            "/document-requests/{id}",
            get(handlers::get_document_request),
        )
        .route(
            "/document-requests/{id}/status",
            patch(handlers::update_request_status).put(handlers::update_request_status),
        )
        // --- Audit trail ---
        .route("/logs/", get(handlers::list_activity_logs))
        // --- Officials ---
        .route("/officials/", post(handlers::create_official))
        .route(
            "/officials/{id}",
            put(handlers::update_official).delete(handlers::delete_official),
        )
}
