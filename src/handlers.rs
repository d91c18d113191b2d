use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use crate::{error::ErrorBody, gate::Gatekeeper, models::SessionView};

/// get_session
///
/// [Public Route] Describes the caller's current session. An absent, expired
/// or forged cookie yields `{"session": null}`, never an error.
#[utoipa::path(
    get,
    path = "/api/auth/session",
    responses((status = 200, description = "Current session, or null", body = SessionView))
)]
pub async fn get_session(
    State(gate): State<Arc<Gatekeeper>>,
    headers: HeaderMap,
) -> Json<SessionView> {
    let session = gate.session_from_headers(&headers).into_payload();
    Json(SessionView { session })
}

/// logout
///
/// [Public Route] Clears the session cookie. Idempotent: logging out without a
/// session still answers 204.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 204, description = "Session cookie cleared"),
        (status = 500, description = "Cookie could not be written", body = ErrorBody)
    )
)]
pub async fn logout(State(gate): State<Arc<Gatekeeper>>) -> Response {
    let mut headers = HeaderMap::new();

    match gate.end_session(&mut headers) {
        Ok(()) => (StatusCode::NO_CONTENT, headers).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to clear session cookie");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody::new("Internal Server Error")),
            )
                .into_response()
        }
    }
}

/// not_found
///
/// Fallback for any path the gate let through but this service does not host.
pub async fn not_found() -> (StatusCode, Json<ErrorBody>) {
    (StatusCode::NOT_FOUND, Json(ErrorBody::new("Not Found")))
}
