//! The access decision engine: a pure function from (session, membership,
//! path) to a single outcome.

use crate::{
    models::{Role, SessionPayload},
    rules::{Membership, RuleSetName},
};

/// PolicyTargets
///
/// Where the redirect outcomes send the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyTargets {
    pub login: String,
    pub callback_param: String,
    pub doctor_dashboard: String,
    pub patient_dashboard: String,
    pub default_landing: String,
    pub unauthorized: String,
}

impl Default for PolicyTargets {
    fn default() -> Self {
        Self {
            login: "/auth/login".to_string(),
            callback_param: "callbackUrl".to_string(),
            doctor_dashboard: "/doctor/profile".to_string(),
            patient_dashboard: "/profile".to_string(),
            default_landing: "/".to_string(),
            unauthorized: "/unauthorized".to_string(),
        }
    }
}

/// AccessDecision
///
/// The closed set of outcomes. Each variant carries what the transport needs
/// to answer: the missing role for a 403, the callback path for a login
/// redirect, the target for the other redirects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    /// 401: a protected API was called without a session.
    DenyUnauthenticated,
    /// 403: the session lacks the role an API requires.
    DenyForbidden { required: Role },
    /// A protected page was requested without a session; `callback` is the
    /// original path so login can send the user back.
    RedirectToLogin { callback: String },
    RedirectToDashboard { target: String },
    RedirectUnauthorized { target: String },
}

/// dashboard_for
///
/// Role precedence for landing a signed-in user: DOCTOR wins over PATIENT when
/// a session carries both, and a session with neither lands on the default page.
pub fn dashboard_for<'a>(session: &SessionPayload, targets: &'a PolicyTargets) -> &'a str {
    if session.has_role(Role::Doctor) {
        &targets.doctor_dashboard
    } else if session.has_role(Role::Patient) {
        &targets.patient_dashboard
    } else {
        &targets.default_landing
    }
}

/// First role-restricted set the session fails, checking doctor before patient.
///
/// A route in both the doctor-only and patient-only set (a misconfiguration)
/// is therefore reported against the doctor set first.
fn missing_role(
    session: &SessionPayload,
    membership: &Membership,
    doctor_set: RuleSetName,
    patient_set: RuleSetName,
) -> Option<Role> {
    if membership.contains(doctor_set) && !session.has_role(Role::Doctor) {
        return Some(Role::Doctor);
    }
    if membership.contains(patient_set) && !session.has_role(Role::Patient) {
        return Some(Role::Patient);
    }
    None
}

/// decide
///
/// Evaluates the policy in fixed precedence order; the first applicable rule
/// wins and anything unmatched is allowed.
///
/// 1. Public paths are always allowed.
/// 2. Protected API without a session is denied (401).
/// 3. Protected API with a session is denied (403) when a doctor-only or
///    patient-only route meets a session lacking that role.
/// 4. Protected page without a session redirects to login with a callback.
/// 5. Auth page with a session redirects to the role's dashboard.
/// 6. Protected page with a session redirects to the unauthorized page when a
///    doctor-only or patient-only page meets a session lacking that role.
/// 7. Otherwise allow.
pub fn decide(
    session: Option<&SessionPayload>,
    membership: &Membership,
    path: &str,
    targets: &PolicyTargets,
) -> AccessDecision {
    use RuleSetName::*;

    if membership.contains(Public) {
        return AccessDecision::Allow;
    }

    let protected_api = membership.contains(ProtectedApi);
    let protected_web = membership.contains(ProtectedWeb);

    match session {
        None if protected_api => return AccessDecision::DenyUnauthenticated,
        Some(session) if protected_api => {
            if let Some(required) = missing_role(session, membership, DoctorOnlyApi, PatientOnlyApi) {
                return AccessDecision::DenyForbidden { required };
            }
        }
        _ => {}
    }

    if protected_web && session.is_none() {
        return AccessDecision::RedirectToLogin {
            callback: path.to_string(),
        };
    }

    if let Some(session) = session {
        if membership.contains(AuthPages) {
            return AccessDecision::RedirectToDashboard {
                target: dashboard_for(session, targets).to_string(),
            };
        }

        if protected_web
            && missing_role(session, membership, DoctorOnlyWeb, PatientOnlyWeb).is_some()
        {
            return AccessDecision::RedirectUnauthorized {
                target: targets.unauthorized.clone(),
            };
        }
    }

    AccessDecision::Allow
}
