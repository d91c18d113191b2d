use std::collections::HashMap;

use axum::http::{
    HeaderMap, HeaderValue,
    header::{COOKIE, SET_COOKIE},
};
use chrono::{DateTime, Utc};
use cookie::{Cookie, CookieBuilder, SameSite};
use time::{Duration, OffsetDateTime};

use crate::error::SessionError;

/// Name of the cookie that carries the session token.
pub const SESSION_COOKIE_NAME: &str = "session";

/// SessionCookie
///
/// Moves the opaque session token in and out of HTTP cookie headers. It knows
/// nothing about what the token means.
#[derive(Debug, Clone)]
pub struct SessionCookie {
    name: String,
    secure: bool,
}

impl SessionCookie {
    /// `secure` adds the `Secure` attribute; it is on in production.
    pub fn new(secure: bool) -> Self {
        Self {
            name: SESSION_COOKIE_NAME.to_string(),
            secure,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// read_session_artifact
    ///
    /// Extracts the session token from the request's `Cookie` header(s). An
    /// empty value counts as absent.
    pub fn read(&self, headers: &HeaderMap) -> Option<String> {
        let mut found = None;

        for value in headers.get_all(COOKIE) {
            let Ok(raw) = value.to_str() else {
                continue;
            };
            if let Some(token) = parse_cookies(raw).remove(&self.name) {
                found = Some(token);
            }
        }

        found.filter(|token| !token.is_empty())
    }

    /// write_session_artifact
    ///
    /// Appends a `Set-Cookie` header storing `token` until `expires_at`.
    ///
    /// # Errors
    /// `SessionError::InvalidCookie` if the name or token cannot be carried in
    /// a header; nothing is appended in that case.
    pub fn write(
        &self,
        headers: &mut HeaderMap,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        let expires = OffsetDateTime::from_unix_timestamp(expires_at.timestamp())
            .map_err(|e| SessionError::InvalidExpiry(e.to_string()))?;

        let cookie = self.builder(token.to_string()).expires(expires).build();
        append_set_cookie(headers, &cookie)
    }

    /// clear_session_artifact
    ///
    /// Appends a `Set-Cookie` header that deletes the session cookie.
    pub fn clear(&self, headers: &mut HeaderMap) -> Result<(), SessionError> {
        let cookie = self
            .builder(String::new())
            .max_age(Duration::ZERO)
            .expires(OffsetDateTime::UNIX_EPOCH)
            .build();
        append_set_cookie(headers, &cookie)
    }

    fn builder(&self, value: String) -> CookieBuilder<'static> {
        Cookie::build((self.name.clone(), value))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path("/")
    }
}

fn append_set_cookie(headers: &mut HeaderMap, cookie: &Cookie<'_>) -> Result<(), SessionError> {
    let value = HeaderValue::from_str(&cookie.to_string())
        .map_err(|e| SessionError::InvalidCookie(e.to_string()))?;
    headers.append(SET_COOKIE, value);
    Ok(())
}

/// parse_cookies
///
/// Raw `Cookie` header parse: pairs are split on `;`, and each pair is split on
/// its first `=` only, so values containing `=` are kept intact. A later pair
/// with the same name replaces an earlier one.
pub fn parse_cookies(header: &str) -> HashMap<String, String> {
    let mut cookies = HashMap::new();

    for pair in header.split(';') {
        let pair = pair.trim();
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        if !name.is_empty() {
            cookies.insert(name.to_string(), value.to_string());
        }
    }

    cookies
}
