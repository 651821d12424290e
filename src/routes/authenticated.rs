use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Routes for any caller holding a valid session, whether or not their account has
/// been approved yet. The router is wrapped in `auth_middleware` in `create_router`.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /users/me
        // Lets a freshly registered admin see that they are still pending.
        .route("/users/me", get(handlers::get_me))
}
