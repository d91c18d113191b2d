//! Declarative route rule table and the path classifier that consumes it.

use std::{collections::BTreeSet, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// RuleSetName
///
/// The named groups of path patterns that share an access policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RuleSetName {
    Public,
    ProtectedApi,
    ProtectedWeb,
    AuthPages,
    DoctorOnlyApi,
    PatientOnlyApi,
    DoctorOnlyWeb,
    PatientOnlyWeb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Prefix,
    Exact,
}

/// RouteRule
///
/// One pattern belonging to one rule set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    pub rule_set: RuleSetName,
    pub pattern: String,
    pub match_kind: MatchKind,
}

impl RouteRule {
    pub fn prefix(rule_set: RuleSetName, pattern: impl Into<String>) -> Self {
        Self {
            rule_set,
            pattern: pattern.into(),
            match_kind: MatchKind::Prefix,
        }
    }

    pub fn exact(rule_set: RuleSetName, pattern: impl Into<String>) -> Self {
        Self {
            rule_set,
            pattern: pattern.into(),
            match_kind: MatchKind::Exact,
        }
    }

    /// Byte-wise match: prefix rules need `path` to start with the pattern,
    /// exact rules need full equality.
    pub fn matches(&self, path: &str) -> bool {
        match self.match_kind {
            MatchKind::Prefix => path.starts_with(&self.pattern),
            MatchKind::Exact => path == self.pattern,
        }
    }
}

/// Membership
///
/// Every rule set a path belongs to. Sets are independent, so a path may sit
/// in several at once (for instance ProtectedApi and DoctorOnlyApi).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Membership(BTreeSet<RuleSetName>);

impl Membership {
    pub fn contains(&self, set: RuleSetName) -> bool {
        self.0.contains(&set)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = RuleSetName> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<RuleSetName> for Membership {
    fn from_iter<I: IntoIterator<Item = RuleSetName>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// RouteTable
///
/// The single source of truth for route classification. Loaded once at
/// startup and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// classify
    ///
    /// Returns every rule set with at least one rule matching `path`. Order of
    /// the rules has no effect on the result.
    pub fn classify(&self, path: &str) -> Membership {
        self.rules
            .iter()
            .filter(|rule| rule.matches(path))
            .map(|rule| rule.rule_set)
            .collect()
    }

    /// Loads a replacement table from a JSON array of rules.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let to_err = |message: String| ConfigError::RuleTable {
            path: path.to_path_buf(),
            message,
        };

        let raw = fs::read_to_string(path).map_err(|e| to_err(e.to_string()))?;
        let rules: Vec<RouteRule> = serde_json::from_str(&raw).map_err(|e| to_err(e.to_string()))?;

        Ok(Self::new(rules))
    }

    /// builtin
    ///
    /// The portal's route table: patient and doctor APIs, their web pages, and
    /// the public and authentication surfaces.
    pub fn builtin() -> Self {
        use MatchKind::{Exact, Prefix};
        use RuleSetName::*;

        let mut rules = Vec::new();
        let mut group = |rule_set: RuleSetName, match_kind: MatchKind, patterns: &[&str]| {
            rules.extend(patterns.iter().map(|pattern| RouteRule {
                rule_set,
                pattern: (*pattern).to_string(),
                match_kind,
            }));
        };

        group(
            Public,
            Prefix,
            &[
                // Authentication endpoints
                "/api/auth/login",
                "/api/auth/register",
                "/api/auth/register-doctor",
                "/api/auth/forgot-password",
                "/api/auth/reset-password",
                "/api/auth/logout",
                // Doctor directory, including single-doctor lookups
                "/api/doctors/filter",
                "/api/doctors/specializations",
                "/api/doctors/",
                // Enum data
                "/api/patients/bloodgroup",
                "/api/patients/genotype",
                // Static files
                "/_next",
                "/favicon.ico",
                "/public",
            ],
        );
        group(
            ProtectedApi,
            Prefix,
            &[
                "/api/users/",
                "/api/users/me",
                "/api/users/by-id",
                "/api/users/all",
                "/api/users/update-password",
                "/api/users/profile-picture",
                "/api/patients/me",
                "/api/patients/update-profile",
                "/api/patients/",
                "/api/doctors/me",
                "/api/doctors/update-profile",
                "/api/appointments",
                "/api/appointments/book",
                "/api/appointments/cancel",
                "/api/appointments/complete",
                "/api/appointments/my-appointments",
                "/api/appointments/",
                "/api/consultations",
                "/api/consultations/create",
                "/api/consultations/history",
                "/api/consultations/appointment",
            ],
        );
        group(
            DoctorOnlyApi,
            Prefix,
            &[
                "/api/consultations/create",
                "/api/appointments/complete",
                "/api/doctors/me",
                "/api/doctors/update-profile",
            ],
        );
        group(
            PatientOnlyApi,
            Prefix,
            &[
                "/api/patients/me",
                "/api/patients/update-profile",
                "/api/appointments/book",
            ],
        );
        group(
            ProtectedWeb,
            Prefix,
            &[
                "/profile",
                "/book-appointment",
                "/my-appointments",
                "/consultation-history",
                "/doctor",
                "/doctor/profile",
                "/doctor/appointments",
                "/doctor/create-consultation",
                "/doctor/patient-consultation-history",
            ],
        );
        group(
            AuthPages,
            Exact,
            &[
                "/auth/login",
                "/auth/register",
                "/auth/forgot-password",
                "/auth/reset-password",
                "/auth/register-doctor",
            ],
        );
        group(
            DoctorOnlyWeb,
            Prefix,
            &[
                "/doctor",
                "/doctor/profile",
                "/doctor/appointments",
                "/doctor/create-consultation",
                "/doctor/patient-consultation-history",
            ],
        );
        group(
            PatientOnlyWeb,
            Prefix,
            &["/book-appointment", "/my-appointments", "/consultation-history"],
        );

        Self::new(rules)
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::builtin()
    }
}
