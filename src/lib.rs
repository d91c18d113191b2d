use std::sync::Arc;

use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Session authentication: token codec and cookie transport.
pub mod auth;
pub mod session;

// Routing policy: rule table, decision engine, per-request dispatcher.
pub mod decision;
pub mod gate;
pub mod rules;

pub mod config;
pub mod email;
pub mod error;
pub mod handlers;
pub mod models;

pub mod routes;
use routes::public;

// --- Public Re-exports ---

pub use auth::{SessionState, TokenCodec};
pub use config::AppConfig;
use email::{EmailService, MailTransport, Mailer, SmtpTransport, TemplateStore};
pub use decision::{AccessDecision, PolicyTargets, decide};
pub use gate::{Gatekeeper, gate_middleware};
pub use rules::{Membership, RouteTable, RuleSetName};

/// ApiDoc
///
/// OpenAPI document for the gatekeeper's own endpoints, served at
/// `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(handlers::get_session, handlers::logout),
    components(schemas(models::SessionView, error::ErrorBody)),
    tags((name = "medgate", description = "Session and routing gatekeeper"))
)]
struct ApiDoc;

/// AppState
///
/// The shared, immutable state behind every request: the loaded configuration,
/// the gate built from it and the outgoing mail service.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<Gatekeeper>,
    pub email: Arc<Mailer>,
    pub config: AppConfig,
}

impl AppState {
    /// Builds the gate and the SMTP-backed mail service from `config`.
    pub fn from_config(config: AppConfig) -> Result<Self, error::ConfigError> {
        let gate = Arc::new(Gatekeeper::from_config(&config)?);

        let transport: Arc<dyn MailTransport> = Arc::new(SmtpTransport::from_config(&config.smtp)?);
        let email = Arc::new(EmailService::new(
            TemplateStore::new(&config.email_template_dir),
            transport,
            config.smtp.from.clone(),
        ));

        Ok(Self {
            gate,
            email,
            config,
        })
    }

    /// Replaces the mail transport, keeping templates and sender.
    pub fn with_mail_transport(mut self, transport: Arc<dyn MailTransport>) -> Self {
        self.email = Arc::new(EmailService::new(
            TemplateStore::new(&self.config.email_template_dir),
            transport,
            self.config.smtp.from.clone(),
        ));
        self
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for Arc<Gatekeeper> {
    fn from_ref(app_state: &AppState) -> Arc<Gatekeeper> {
        app_state.gate.clone()
    }
}

impl FromRef<AppState> for Arc<Mailer> {
    fn from_ref(app_state: &AppState) -> Arc<Mailer> {
        app_state.email.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the gatekeeper service: its own routes, the documentation UI and
/// a JSON 404 fallback, all wrapped by the gate middleware, then the
/// observability and CORS layers.
pub fn create_router(state: AppState) -> Router {
    create_router_with(state, Router::new())
}

/// create_router_with
///
/// Same as `create_router`, but merges `app` so an application's own routes
/// sit behind the gate.
pub fn create_router_with(state: AppState, app: Router<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let gated = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(app)
        .fallback(handlers::not_found)
        // `layer` (not `route_layer`) so the fallback is gated too.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            gate_middleware,
        ))
        .with_state(state);

    gated
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for `TraceLayer`: method, URI and the request id, so every log line of
/// one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
