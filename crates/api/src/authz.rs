//! API-side authorization guard.
//!
//! Handlers check the token's permission snapshot before calling a service;
//! services stay auth-agnostic.

use rentdesk_auth::{AuthzError, CommandAuthorization, Permission, authorize, authorize_all};

use crate::context::PrincipalContext;

/// A set of permissions that must all be held.
pub struct Requirement {
    permissions: Vec<Permission>,
}

impl Requirement {
    pub fn of(names: &[&'static str]) -> Self {
        Self {
            permissions: names.iter().map(|name| Permission::new(*name)).collect(),
        }
    }
}

impl CommandAuthorization for Requirement {
    fn required_permissions(&self) -> &[Permission] {
        &self.permissions
    }
}

pub fn require(principal: &PrincipalContext, permission: &'static str) -> Result<(), AuthzError> {
    authorize(principal.principal(), &Permission::new(permission))
}

pub fn require_all(principal: &PrincipalContext, permissions: &[&'static str]) -> Result<(), AuthzError> {
    authorize_all(principal.principal(), &Requirement::of(permissions))
}
