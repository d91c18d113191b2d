use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
    routing::get,
};
use medgate::{
    AppConfig, AppState, create_router, create_router_with,
    error::{ErrorBody, SessionError},
    gate::{AssetBypass, Gatekeeper},
    models::{SessionUser, SessionView},
    AccessDecision, RouteTable, TokenCodec,
    session::SessionCookie,
};
use tower::ServiceExt;

// --- Helper Functions ---

fn state() -> AppState {
    AppState::from_config(AppConfig::default()).expect("default config builds a gate")
}

/// The gatekeeper with a stand-in application mounted behind it.
fn app(state: AppState) -> Router {
    let application = Router::new()
        .route("/api/doctors/filter", get(|| async { "doctors" }))
        .route("/api/appointments/book", get(|| async { "booked" }))
        .route("/profile", get(|| async { "profile page" }))
        .route("/doctor/avatar.png", get(|| async { "png" }));
    create_router_with(state, application)
}

fn session_cookie(state: &AppState, roles: &[&str]) -> String {
    let issued = state
        .gate
        .codec()
        .issue(SessionUser::with_roles(roles.iter().copied()).claim("name", "Test User"))
        .unwrap();
    format!("session={}", issued.token)
}

async fn send(router: Router, method: &str, uri: &str, cookie: Option<&str>) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    router
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

// --- Tests ---

#[tokio::test]
async fn test_public_route_passes_through() {
    let response = send(app(state()), "GET", "/api/doctors/filter", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "doctors");
}

#[tokio::test]
async fn test_protected_api_without_session_is_401_json() {
    let response = send(app(state()), "GET", "/api/appointments/book", None).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: ErrorBody = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body, ErrorBody::new("Authentication Required"));
}

#[tokio::test]
async fn test_patient_only_api_with_doctor_session_is_403_json() {
    let state = state();
    let cookie = session_cookie(&state, &["DOCTOR"]);

    let response = send(app(state), "GET", "/api/appointments/book", Some(&cookie)).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: ErrorBody = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body.error, "Patient access required");
}

#[tokio::test]
async fn test_patient_only_api_with_patient_session_passes() {
    let state = state();
    let cookie = session_cookie(&state, &["PATIENT"]);

    let response = send(app(state), "GET", "/api/appointments/book", Some(&cookie)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "booked");
}

#[tokio::test]
async fn test_forged_cookie_is_treated_as_no_session() {
    let other = TokenCodec::new("someone-elses-secret").unwrap();
    let token = other.issue(SessionUser::with_roles(["PATIENT"])).unwrap().token;
    let cookie = format!("session={token}");

    let response = send(app(state()), "GET", "/api/appointments/book", Some(&cookie)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_page_redirects_to_login_with_callback() {
    let response = send(app(state()), "GET", "/profile", None).await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/auth/login?callbackUrl=%2Fprofile");
}

#[tokio::test]
async fn test_auth_page_redirects_doctor_to_doctor_dashboard() {
    let state = state();
    let cookie = session_cookie(&state, &["PATIENT", "DOCTOR"]);

    let response = send(app(state), "GET", "/auth/login", Some(&cookie)).await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/doctor/profile");
}

#[tokio::test]
async fn test_doctor_page_redirects_patient_to_unauthorized() {
    let state = state();
    let cookie = session_cookie(&state, &["PATIENT"]);

    let response = send(app(state), "GET", "/doctor/appointments", Some(&cookie)).await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/unauthorized");
}

#[tokio::test]
async fn test_assets_bypass_the_gate() {
    // Would otherwise redirect to login: "/doctor" is a protected page prefix.
    let response = send(app(state()), "GET", "/doctor/avatar.png", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "png");
}

#[tokio::test]
async fn test_allowed_unknown_path_hits_json_fallback() {
    let response = send(create_router(state()), "GET", "/about", None).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: ErrorBody = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body.error, "Not Found");
}

#[tokio::test]
async fn test_fallback_is_gated_too() {
    let response = send(create_router(state()), "GET", "/api/consultations/history", None).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_endpoint_reports_current_session() {
    let state = state();
    let cookie = session_cookie(&state, &["PATIENT"]);

    let response = send(create_router(state), "GET", "/api/auth/session", Some(&cookie)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let view: SessionView = serde_json::from_str(&body_text(response).await).unwrap();
    let session = view.session.expect("session should be present");
    assert_eq!(session.user.roles, vec!["PATIENT"]);
    assert_eq!(session.user.claims["name"], "Test User");
}

#[tokio::test]
async fn test_session_endpoint_reports_null_without_cookie() {
    let response = send(create_router(state()), "GET", "/api/auth/session", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let view: SessionView = serde_json::from_str(&body_text(response).await).unwrap();
    assert!(view.session.is_none());
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let response = send(create_router(state()), "POST", "/api/auth/logout", None).await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap();
    assert!(set_cookie.starts_with("session=;"));
    assert!(set_cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let response = send(create_router(state()), "GET", "/health", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

// --- Gatekeeper API ---

#[test]
fn test_start_session_writes_a_readable_cookie() {
    let gate = state().gate;
    let mut response_headers = axum::http::HeaderMap::new();

    let payload = gate
        .start_session(&mut response_headers, SessionUser::with_roles(["DOCTOR"]))
        .unwrap();

    // Echo the Set-Cookie name=value pair back as a request cookie.
    let set_cookie = response_headers
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap();
    let pair = set_cookie.split(';').next().unwrap();
    let mut request_headers = axum::http::HeaderMap::new();
    request_headers.insert(header::COOKIE, pair.parse().unwrap());

    let session = gate.session_from_headers(&request_headers);
    assert_eq!(session.payload(), Some(&payload));
}

#[test]
fn test_evaluate_skips_bypassed_paths() {
    let gate = state().gate;

    assert!(gate.is_bypassed("/_next/static/chunks/main.js"));
    assert!(gate.is_bypassed("/swagger-ui/index.html"));
    assert!(!gate.is_bypassed("/doctor/profile"));
    assert_eq!(
        gate.evaluate("/_next/image", &axum::http::HeaderMap::new()),
        AccessDecision::Allow
    );
}

#[test]
fn test_custom_bypass_list() {
    let codec = TokenCodec::new("k").unwrap();
    let gate = Gatekeeper::new(codec, SessionCookie::new(false), RouteTable::builtin())
        .with_bypass(AssetBypass::new(["/static"], ["css"]));

    assert!(gate.is_bypassed("/static/app.js"));
    assert!(gate.is_bypassed("/doctor/theme.css"));
    assert!(!gate.is_bypassed("/doctor/avatar.png"));
    assert_eq!(
        gate.evaluate("/doctor/avatar.png", &axum::http::HeaderMap::new()),
        AccessDecision::RedirectToLogin {
            callback: "/doctor/avatar.png".to_string()
        }
    );
}

#[test]
fn test_login_url_encodes_callback() {
    let gate = state().gate;

    assert_eq!(
        gate.login_url("/doctor/appointments?day=mon"),
        "/auth/login?callbackUrl=%2Fdoctor%2Fappointments%3Fday%3Dmon"
    );
}

#[test]
fn test_start_session_fails_when_cookie_cannot_be_written() {
    let codec = TokenCodec::new("k").unwrap();
    let gate = Gatekeeper::new(
        codec,
        SessionCookie::new(false).with_name("bad\nname"),
        RouteTable::builtin(),
    );
    let mut headers = axum::http::HeaderMap::new();

    let result = gate.start_session(&mut headers, SessionUser::with_roles(["PATIENT"]));

    assert!(matches!(result, Err(SessionError::InvalidCookie(_))));
    assert!(matches!(
        gate.end_session(&mut headers),
        Err(SessionError::InvalidCookie(_))
    ));
    assert!(headers.get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_logout_reports_unwritable_cookie() {
    let gate = Gatekeeper::new(
        TokenCodec::new("k").unwrap(),
        SessionCookie::new(false).with_name("bad\nname"),
        RouteTable::builtin(),
    );
    let state = AppState {
        gate: Arc::new(gate),
        ..state()
    };

    let response = send(create_router(state), "POST", "/api/auth/logout", None).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}
