use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    config::AppConfig,
    error::{ConfigError, TokenError},
    models::{SessionPayload, SessionUser},
};

/// Lifetime of a session token and of the cookie carrying it.
pub const SESSION_TTL_HOURS: i64 = 72;

/// The only algorithm the gate signs with or accepts.
pub const SESSION_ALGORITHM: Algorithm = Algorithm::HS256;

/// Claims
///
/// The payload structure signed into every session token. `user` and `expires`
/// are the application claims; `iat` and `exp` are the registered claims the
/// verifier enforces.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user: SessionUser,
    pub expires: DateTime<Utc>,
    /// Issued At (iat), seconds since the epoch.
    pub iat: i64,
    /// Expiration Time (exp): accepted up to and including this second,
    /// rejected once the clock is past it.
    pub exp: i64,
}

/// SessionState
///
/// Result of resolving a request's session. Decode failures are not errors at
/// this level; they simply produce `Absent`.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Valid(SessionPayload),
    Absent,
}

impl SessionState {
    pub fn payload(&self) -> Option<&SessionPayload> {
        match self {
            SessionState::Valid(payload) => Some(payload),
            SessionState::Absent => None,
        }
    }

    pub fn into_payload(self) -> Option<SessionPayload> {
        match self {
            SessionState::Valid(payload) => Some(payload),
            SessionState::Absent => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, SessionState::Valid(_))
    }
}

/// IssuedSession
///
/// A freshly signed token together with the payload it carries, so the caller
/// can use `payload.expires` for the cookie expiry.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub payload: SessionPayload,
}

/// TokenCodec
///
/// Signs and verifies session tokens with a process-wide symmetric key. The key
/// is injected at construction, so tests can run codecs with distinct secrets
/// side by side.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: TimeDelta,
}

impl TokenCodec {
    /// new
    ///
    /// # Errors
    /// `ConfigError::MissingSecret` if `secret` is empty; a codec without a key
    /// must never exist.
    pub fn new(secret: &str) -> Result<Self, ConfigError> {
        if secret.is_empty() {
            return Err(ConfigError::MissingSecret);
        }

        let mut validation = Validation::new(SESSION_ALGORITHM);
        validation.validate_exp = true;
        // No leeway: a token is dead once its 72 hours have passed.
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl: TimeDelta::hours(SESSION_TTL_HOURS),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Self::new(&config.jwt_secret)
    }

    /// Signs `payload`, stamping it as issued now.
    pub fn encode(&self, payload: &SessionPayload) -> Result<String, TokenError> {
        self.encode_at(payload, Utc::now())
    }

    /// Signs `payload` as if issued at `issued_at`; `exp` is `issued_at` plus
    /// the session lifetime.
    pub fn encode_at(
        &self,
        payload: &SessionPayload,
        issued_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            user: payload.user.clone(),
            expires: payload.expires,
            iat: issued_at.timestamp(),
            exp: (issued_at + self.ttl).timestamp(),
        };

        encode(&Header::new(SESSION_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Builds and signs a new session for `user`, expiring one lifetime from now.
    pub fn issue(&self, user: SessionUser) -> Result<IssuedSession, TokenError> {
        let now = Utc::now();
        let payload = SessionPayload {
            user,
            expires: now + self.ttl,
        };
        let token = self.encode_at(&payload, now)?;

        Ok(IssuedSession { token, payload })
    }

    /// Verifies signature, declared algorithm and expiry, then returns the
    /// application claims.
    pub fn decode(&self, token: &str) -> Result<SessionPayload, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;

        Ok(SessionPayload {
            user: data.claims.user,
            expires: data.claims.expires,
        })
    }

    /// Resolves an optional raw token into a `SessionState`. Every decode
    /// failure collapses to `Absent`.
    pub fn resolve(&self, token: Option<&str>) -> SessionState {
        let Some(token) = token else {
            return SessionState::Absent;
        };

        match self.decode(token) {
            Ok(payload) => SessionState::Valid(payload),
            Err(e) => {
                tracing::debug!(reason = %e, "session token rejected");
                SessionState::Absent
            }
        }
    }
}
