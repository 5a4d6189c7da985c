use rentdesk_auth::{Permission, Principal, Role};
use rentdesk_core::UserId;

/// Principal context for a request (authenticated identity, roles and the
/// permission snapshot carried by the token).
///
/// Inserted by the auth middleware; present on every protected route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn user_id(&self) -> UserId {
        self.principal.user_id
    }

    /// Acting user for audit stamps.
    pub fn actor(&self) -> Option<UserId> {
        Some(self.principal.user_id)
    }

    pub fn username(&self) -> &str {
        &self.principal.username
    }

    pub fn roles(&self) -> &[Role] {
        &self.principal.roles
    }

    pub fn permissions(&self) -> &[Permission] {
        &self.principal.permissions
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}
