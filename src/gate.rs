//! Per-request dispatcher: resolves the session, classifies the path, runs the
//! decision engine and turns the outcome into an HTTP response.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    auth::{SessionState, TokenCodec},
    config::AppConfig,
    decision::{AccessDecision, PolicyTargets, decide},
    error::{ConfigError, ErrorBody, SessionError},
    models::{Role, SessionPayload, SessionUser},
    rules::RouteTable,
    session::SessionCookie,
};

/// AssetBypass
///
/// Paths that skip the gate entirely: static assets, framework internals and
/// the API documentation. They never reach classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetBypass {
    prefixes: Vec<String>,
    extensions: Vec<String>,
}

impl AssetBypass {
    pub fn new<P, E>(prefixes: P, extensions: E) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
            extensions: extensions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn builtin() -> Self {
        Self::new(
            [
                "/_next/static",
                "/_next/image",
                "/favicon.ico",
                "/swagger-ui",
                "/api-docs",
            ],
            ["svg", "png", "jpg", "jpeg", "gif", "webp"],
        )
    }

    pub fn matches(&self, path: &str) -> bool {
        if self.prefixes.iter().any(|prefix| path.starts_with(prefix.as_str())) {
            return true;
        }

        path.rsplit_once('.')
            .is_some_and(|(_, ext)| self.extensions.iter().any(|known| known == ext))
    }
}

impl Default for AssetBypass {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Gatekeeper
///
/// Holds everything a decision needs: the token codec, the cookie adapter, the
/// route table, the bypass list and the redirect targets. All of it is
/// read-only after construction, so one instance is shared by every request.
#[derive(Clone)]
pub struct Gatekeeper {
    codec: TokenCodec,
    cookie: SessionCookie,
    routes: RouteTable,
    bypass: AssetBypass,
    targets: PolicyTargets,
}

impl Gatekeeper {
    pub fn new(codec: TokenCodec, cookie: SessionCookie, routes: RouteTable) -> Self {
        Self {
            codec,
            cookie,
            routes,
            bypass: AssetBypass::builtin(),
            targets: PolicyTargets::default(),
        }
    }

    /// from_config
    ///
    /// Builds the gate for the process. The rule table comes from
    /// `route_rules_path` when set, otherwise the built-in table is used.
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let codec = TokenCodec::from_config(config)?;
        let cookie = SessionCookie::new(config.env.is_production());
        let routes = match &config.route_rules_path {
            Some(path) => {
                let table = RouteTable::from_json_file(path)?;
                tracing::info!(path = %path.display(), rules = table.rules().len(), "loaded route rules");
                table
            }
            None => RouteTable::builtin(),
        };

        Ok(Self::new(codec, cookie, routes))
    }

    pub fn with_bypass(mut self, bypass: AssetBypass) -> Self {
        self.bypass = bypass;
        self
    }

    pub fn with_targets(mut self, targets: PolicyTargets) -> Self {
        self.targets = targets;
        self
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Reads and verifies the session cookie. Any failure is `Absent`.
    pub fn session_from_headers(&self, headers: &HeaderMap) -> SessionState {
        let token = self.cookie.read(headers);
        self.codec.resolve(token.as_deref())
    }

    /// Signs a new session for `user` and writes its cookie into `headers`.
    pub fn start_session(
        &self,
        headers: &mut HeaderMap,
        user: SessionUser,
    ) -> Result<SessionPayload, SessionError> {
        let issued = self.codec.issue(user)?;
        self.cookie
            .write(headers, &issued.token, issued.payload.expires)?;
        Ok(issued.payload)
    }

    pub fn end_session(&self, headers: &mut HeaderMap) -> Result<(), SessionError> {
        self.cookie.clear(headers)
    }

    pub fn is_bypassed(&self, path: &str) -> bool {
        self.bypass.matches(path)
    }

    /// evaluate
    ///
    /// The full per-request pipeline short of producing a response.
    pub fn evaluate(&self, path: &str, headers: &HeaderMap) -> AccessDecision {
        if self.is_bypassed(path) {
            return AccessDecision::Allow;
        }

        let session = self.session_from_headers(headers);
        let membership = self.routes.classify(path);
        let decision = decide(session.payload(), &membership, path, &self.targets);

        tracing::debug!(
            path,
            has_session = session.is_present(),
            ?membership,
            ?decision,
            "gate decision"
        );

        decision
    }

    /// Converts a decision into the response that ends the request, or `None`
    /// when the request should pass through.
    pub fn response_for(&self, decision: &AccessDecision) -> Option<Response> {
        let response = match decision {
            AccessDecision::Allow => return None,
            AccessDecision::DenyUnauthenticated => (
                StatusCode::UNAUTHORIZED,
                Json(ErrorBody::new("Authentication Required")),
            )
                .into_response(),
            AccessDecision::DenyForbidden { required } => {
                let message = match required {
                    Role::Doctor => "Doctor access required",
                    Role::Patient => "Patient access required",
                };
                (StatusCode::FORBIDDEN, Json(ErrorBody::new(message))).into_response()
            }
            AccessDecision::RedirectToLogin { callback } => {
                Redirect::temporary(&self.login_url(callback)).into_response()
            }
            AccessDecision::RedirectToDashboard { target }
            | AccessDecision::RedirectUnauthorized { target } => {
                Redirect::temporary(target).into_response()
            }
        };

        Some(response)
    }

    /// `/auth/login?callbackUrl=<form-encoded path>`
    pub fn login_url(&self, callback: &str) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair(&self.targets.callback_param, callback)
            .finish();
        format!("{}?{}", self.targets.login, query)
    }
}

/// gate_middleware
///
/// Axum middleware running the gate in front of every route. Allowed requests
/// reach the inner service untouched; everything else is answered here.
pub async fn gate_middleware(
    State(gate): State<Arc<Gatekeeper>>,
    request: Request,
    next: Next,
) -> Response {
    let decision = gate.evaluate(request.uri().path(), request.headers());

    match gate.response_for(&decision) {
        Some(response) => response,
        None => next.run(request).await,
    }
}
