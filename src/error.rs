use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

/// ConfigError
///
/// Startup-time configuration failures. These are fatal: the binary refuses to
/// start rather than serve traffic it cannot authenticate.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JWT_SECRET was absent or empty.
    #[error("JWT_SECRET must be set to a non-empty value")]
    MissingSecret,

    #[error("invalid bind address: {0}")]
    InvalidBindAddr(String),

    /// The route rule file could not be read or parsed.
    #[error("failed to load route rules from {}: {message}", .path.display())]
    RuleTable { path: PathBuf, message: String },

    #[error("invalid SMTP configuration: {0}")]
    Smtp(String),
}

/// TokenError
///
/// Every way a session token can fail to encode or verify. On the request path
/// these are never surfaced to the client; the gate treats all of them as
/// "no session".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("invalid token signature")]
    InvalidSignature,

    /// The header declared an algorithm other than the configured one.
    #[error("token algorithm not accepted")]
    InvalidAlgorithm,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("failed to encode token: {0}")]
    Encoding(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::InvalidAlgorithm => TokenError::InvalidAlgorithm,
            _ => TokenError::Malformed(err.to_string()),
        }
    }
}

/// SessionError
///
/// Failures while starting or ending a session: signing the token, or turning
/// the session cookie into a valid `Set-Cookie` header.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("session cookie expiry out of range: {0}")]
    InvalidExpiry(String),

    #[error("session cookie is not a valid header value: {0}")]
    InvalidCookie(String),
}

/// EmailError
///
/// Failures of the email collaborator. Unlike token errors these propagate to
/// the caller of `EmailService::send_email`.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// The name would resolve outside the template directory.
    #[error("invalid email template name '{0}'")]
    InvalidTemplateName(String),

    #[error("email template '{name}' not found at {}", .path.display())]
    TemplateNotFound { name: String, path: PathBuf },

    #[error("failed to read email template: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid email address '{address}': {message}")]
    InvalidAddress { address: String, message: String },

    #[error("failed to build email message: {0}")]
    Message(String),

    #[error("mail transport failed: {0}")]
    Transport(String),
}

/// ErrorBody
///
/// The JSON shape of every error the gate answers with directly
/// (401, 403 and the 404 fallback).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
