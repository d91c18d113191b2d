use std::{env, net::SocketAddr, path::PathBuf};

use crate::error::ConfigError;

/// AppConfig
///
/// Holds the gatekeeper's entire configuration state. Built once at startup and
/// immutable afterwards; it is pulled into handlers and middleware via `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls the cookie `Secure` flag and log format.
    pub env: Env,
    // Symmetric key used to sign and verify session tokens.
    pub jwt_secret: String,
    pub bind_addr: SocketAddr,
    // Optional JSON file replacing the built-in route rule table.
    pub route_rules_path: Option<PathBuf>,
    // Directory holding `<template>.html` files for the email collaborator.
    pub email_template_dir: PathBuf,
    pub smtp: SmtpConfig,
}

/// SmtpConfig
///
/// Outgoing mail relay. Connections are opened lazily on the first send, so a
/// wrong host only shows up as a delivery error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    // Credentials are only used when both are present.
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SMTP_HOST.to_string(),
            port: DEFAULT_SMTP_PORT,
            username: None,
            password: None,
            from: DEFAULT_EMAIL_FROM.to_string(),
        }
    }
}

impl SmtpConfig {
    fn load() -> Result<Self, ConfigError> {
        let port = match non_empty_var("SMTP_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::Smtp(format!("invalid SMTP_PORT: {raw}")))?,
            None => DEFAULT_SMTP_PORT,
        };

        Ok(Self {
            host: non_empty_var("SMTP_HOST").unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
            port,
            username: non_empty_var("SMTP_USER"),
            password: non_empty_var("SMTP_PASS"),
            from: non_empty_var("SMTP_FROM").unwrap_or_else(|| DEFAULT_EMAIL_FROM.to_string()),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}

/// Env
///
/// Defines the runtime context. `Production` hardens the session cookie and
/// switches logging to JSON.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Env {
    /// Whether cookies must carry the `Secure` attribute.
    pub fn is_production(self) -> bool {
        self == Env::Production
    }
}

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_TEMPLATE_DIR: &str = "templates/email";
const DEFAULT_EMAIL_FROM: &str = "no-reply@localhost";
const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
const DEFAULT_SMTP_PORT: u16 = 587;

impl Default for AppConfig {
    /// default
    ///
    /// A non-panicking configuration for test state scaffolding. Never used by
    /// the binary, which always goes through `load`.
    fn default() -> Self {
        Self {
            env: Env::Local,
            jwt_secret: "super-secure-test-secret-value-local".to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            route_rules_path: None,
            email_template_dir: PathBuf::from(DEFAULT_TEMPLATE_DIR),
            smtp: SmtpConfig::default(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables and fails fast.
    ///
    /// # Errors
    /// Returns `ConfigError::MissingSecret` when `JWT_SECRET` is unset or empty
    /// in any environment: a gate without a key would mint tokens nobody can
    /// verify. Returns `ConfigError::InvalidBindAddr` for an unparsable
    /// `BIND_ADDR`, and `ConfigError::Smtp` for an unparsable `SMTP_PORT`.
    pub fn load() -> Result<Self, ConfigError> {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let jwt_secret = env::var("JWT_SECRET")
            .ok()
            .filter(|secret| !secret.trim().is_empty())
            .ok_or(ConfigError::MissingSecret)?;

        let bind_raw = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidBindAddr(bind_raw.clone()))?;

        let route_rules_path = non_empty_var("ROUTE_RULES_PATH").map(PathBuf::from);

        Ok(Self {
            env,
            jwt_secret,
            bind_addr,
            route_rules_path,
            email_template_dir: env::var("EMAIL_TEMPLATE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_TEMPLATE_DIR)),
            smtp: SmtpConfig::load()?,
        })
    }
}
