use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints owned by the gatekeeper itself. None of them require a session;
/// they only read or clear one.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET /api/auth/session
        // Reports the decoded session behind the request's cookie, or null.
        .route("/api/auth/session", get(handlers::get_session))
        // POST /api/auth/logout
        // Expires the session cookie.
        .route("/api/auth/logout", post(handlers::logout))
}
