/// Router Module Index
///
/// The gatekeeper hosts only a handful of its own endpoints. Policy is not
/// applied per router here: the gate middleware wraps the whole service in
/// `create_router`, so every route below is subject to the same rule table.

/// Health check and session endpoints.
pub mod public;
