use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;
use utoipa::ToSchema;

/// Role
///
/// The capability tags the routing policy knows about. Sessions carry roles as
/// plain strings so that unknown tags survive a round-trip; this enum names the
/// two the policy acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum Role {
    Doctor,
    Patient,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Doctor => "DOCTOR",
            Role::Patient => "PATIENT",
        }
    }
}

/// SessionUser
///
/// The `user` claim embedded in a session token. Only `roles` is interpreted by
/// the gate; every other claim (id, name, email, ...) is carried verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    // Ordered role names. A missing list decodes as empty ("no elevated access").
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(flatten)]
    pub claims: Map<String, Value>,
}

impl SessionUser {
    pub fn with_roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
            claims: Map::new(),
        }
    }

    /// Attaches an extra claim, replacing any previous value under `key`.
    pub fn claim(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.claims.insert(key.into(), value.into());
        self
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.iter().any(|name| name == role.as_str())
    }
}

/// SessionPayload
///
/// The decoded content of a valid session: who the user is and when the
/// session stops being honoured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPayload {
    pub user: SessionUser,
    pub expires: DateTime<Utc>,
}

impl SessionPayload {
    pub fn has_role(&self, role: Role) -> bool {
        self.user.has_role(role)
    }
}

/// SessionView
///
/// Response body of `GET /api/auth/session`. `session` is `null` whenever the
/// request carried no valid session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionView {
    #[schema(value_type = Object)]
    pub session: Option<SessionPayload>,
}
