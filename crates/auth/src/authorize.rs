use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use thiserror::Error;

use rentdesk_core::UserId;

use crate::claims::JwtClaims;
use crate::permissions::{self, CATALOG, PermissionCategory, RiskLevel};
use crate::roles::RoleRecord;
use crate::{Permission, Role};

/// A fully resolved principal for authorization decisions.
///
/// Built from validated token claims; the permission set is the snapshot
/// resolved when the token was issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub username: String,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

impl Principal {
    pub fn from_claims(claims: &JwtClaims) -> Self {
        Self {
            user_id: claims.sub,
            username: claims.username.clone(),
            roles: claims.roles.clone(),
            permissions: claims.permissions.clone(),
        }
    }

    pub fn has_wildcard(&self) -> bool {
        self.permissions.iter().any(Permission::is_wildcard)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Command-side authorization contract (checked at the command boundary).
///
/// Implement this on commands that require permissions.
/// The API layer enforces these requirements before dispatching.
pub trait CommandAuthorization {
    fn required_permissions(&self) -> &[Permission];
}

/// Authorize a principal for one permission.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    let granted = principal
        .permissions
        .iter()
        .any(|p| p.is_wildcard() || p == required);

    if granted {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

/// Authorize every permission a command declares.
pub fn authorize_all(principal: &Principal, command: &impl CommandAuthorization) -> Result<(), AuthzError> {
    command
        .required_permissions()
        .iter()
        .try_for_each(|p| authorize(principal, p))
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of an authorization decision.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    /// The permission that was being checked.
    pub required_permission: String,

    /// Whether the authorization was granted.
    pub granted: bool,

    /// Human-readable reason for the decision.
    pub reason: String,

    pub risk_level: RiskLevel,

    /// Details about the principal's state.
    pub principal: PrincipalState,

    /// If denied, this explains what was missing.
    pub denial_reason: Option<DenialReason>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrincipalState {
    pub user_id: UserId,
    pub username: String,
    pub roles: Vec<String>,
    pub effective_permissions: Vec<String>,
    pub has_wildcard: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DenialReason {
    pub kind: DenialKind,
    pub message: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    UnknownPermission,
    MissingPermission,
}

/// Explain why an authorization decision was made (or would be made).
///
/// `role_permissions` maps a role name to its currently granted permissions;
/// it is used to suggest roles and to show the live effective set next to the
/// token snapshot.
pub fn explain_authorization<F>(
    principal: &Principal,
    required: &Permission,
    role_permissions: F,
) -> AuthorizationExplanation
where
    F: Fn(&str) -> Vec<Permission>,
{
    let required_str = required.as_str();

    let mut effective: BTreeSet<String> = principal
        .permissions
        .iter()
        .map(|p| p.as_str().to_string())
        .collect();
    for role in &principal.roles {
        effective.extend(role_permissions(role.as_str()).iter().map(|p| p.as_str().to_string()));
    }
    let has_wildcard = effective.contains(Permission::WILDCARD);

    let state = PrincipalState {
        user_id: principal.user_id,
        username: principal.username.clone(),
        roles: principal.roles.iter().map(|r| r.as_str().to_string()).collect(),
        effective_permissions: effective.iter().cloned().collect(),
        has_wildcard,
    };
    let risk_level = permissions::risk_level(required);

    if !permissions::is_known(required) {
        return AuthorizationExplanation {
            required_permission: required_str.to_string(),
            granted: has_wildcard,
            reason: format!("'{required_str}' is not a catalog permission"),
            risk_level,
            principal: state,
            denial_reason: (!has_wildcard).then(|| DenialReason {
                kind: DenialKind::UnknownPermission,
                message: format!("Unknown permission '{required_str}'"),
                suggestions: vec!["Check GET /auth/permissions for valid names".to_string()],
            }),
        };
    }

    if has_wildcard || effective.contains(required_str) {
        let reason = if has_wildcard {
            "Principal has wildcard permission '*' (superadmin)".to_string()
        } else {
            format!("Principal has permission '{required_str}'")
        };
        return AuthorizationExplanation {
            required_permission: required_str.to_string(),
            granted: true,
            reason,
            risk_level,
            principal: state,
            denial_reason: None,
        };
    }

    let mut suggestions = vec![
        format!("Assign a role that grants the '{required_str}' permission"),
        format!("Grant the '{required_str}' permission directly to the user"),
    ];
    let missing_deps = permissions::dependencies(required)
        .into_iter()
        .filter(|d| !effective.contains(d.as_str()))
        .map(|d| d.as_str().to_string())
        .collect::<Vec<_>>();
    if !missing_deps.is_empty() {
        suggestions.push(format!("Also required alongside it: {missing_deps:?}"));
    }

    AuthorizationExplanation {
        required_permission: required_str.to_string(),
        granted: false,
        reason: format!(
            "Principal does not have permission '{required_str}'. Current permissions: {:?}",
            state.effective_permissions
        ),
        risk_level,
        principal: state,
        denial_reason: Some(DenialReason {
            kind: DenialKind::MissingPermission,
            message: format!("Missing required permission: '{required_str}'"),
            suggestions,
        }),
    }
}

/// Role definition with its granted permissions (for audit/display).
#[derive(Debug, Clone, Serialize)]
pub struct RoleDefinition {
    pub name: String,
    pub permissions: Vec<String>,
    pub description: Option<String>,
    pub is_system_role: bool,
}

/// Permission definition (for audit/display).
#[derive(Debug, Clone, Serialize)]
pub struct PermissionDefinition {
    pub name: String,
    pub description: String,
    pub category: PermissionCategory,
    pub risk_level: RiskLevel,
    pub dependencies: Vec<String>,
}

/// Complete view of the RBAC system for auditing.
#[derive(Debug, Clone, Serialize)]
pub struct RbacRegistry {
    pub roles: BTreeMap<String, RoleDefinition>,
    pub permissions: BTreeMap<String, PermissionDefinition>,
}

impl RbacRegistry {
    /// Build from the permission catalog and the active stored roles.
    pub fn build<'a>(roles: impl IntoIterator<Item = &'a RoleRecord>) -> Self {
        let permissions = CATALOG
            .iter()
            .map(|def| {
                let deps = permissions::dependencies(&Permission::new(def.name))
                    .into_iter()
                    .map(|d| d.as_str().to_string())
                    .collect();
                (
                    def.name.to_string(),
                    PermissionDefinition {
                        name: def.name.to_string(),
                        description: def.description.to_string(),
                        category: def.category,
                        risk_level: def.risk,
                        dependencies: deps,
                    },
                )
            })
            .collect();

        let roles = roles
            .into_iter()
            .filter(|r| r.audit().is_active)
            .map(|r| {
                (
                    r.name().to_string(),
                    RoleDefinition {
                        name: r.name().to_string(),
                        permissions: r.permissions().iter().map(|p| p.as_str().to_string()).collect(),
                        description: r.description().map(str::to_string),
                        is_system_role: r.is_system_role(),
                    },
                )
            })
            .collect();

        Self { roles, permissions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::RoleTemplate;
    use chrono::Utc;

    fn principal(perms: &[&'static str]) -> Principal {
        Principal {
            user_id: UserId::new(),
            username: "jdoe".to_string(),
            roles: vec![Role::new("staff")],
            permissions: perms.iter().map(|p| Permission::new(*p)).collect(),
        }
    }

    #[test]
    fn exact_permission_grants() {
        let p = principal(&["customers.read"]);
        assert_eq!(authorize(&p, &Permission::new("customers.read")), Ok(()));
        assert_eq!(
            authorize(&p, &Permission::new("customers.delete")),
            Err(AuthzError::Forbidden("customers.delete".to_string()))
        );
    }

    #[test]
    fn wildcard_grants_everything() {
        let p = principal(&["*"]);
        assert!(authorize(&p, &Permission::new("users.delete")).is_ok());
    }

    #[test]
    fn explanation_names_missing_permission_and_dependencies() {
        let p = principal(&[]);
        let exp = explain_authorization(&p, &Permission::new("customers.delete"), |_| Vec::new());
        assert!(!exp.granted);
        let denial = exp.denial_reason.unwrap();
        assert_eq!(denial.kind, DenialKind::MissingPermission);
        assert!(denial.suggestions.iter().any(|s| s.contains("customers.read")));
    }

    #[test]
    fn explanation_uses_live_role_permissions() {
        let p = principal(&[]);
        let exp = explain_authorization(&p, &Permission::new("customers.read"), |role| {
            if role == "staff" {
                vec![Permission::new("customers.read")]
            } else {
                vec![]
            }
        });
        assert!(exp.granted);
    }

    #[test]
    fn registry_lists_catalog_and_roles() {
        let roles: Vec<RoleRecord> = RoleTemplate::ALL
            .iter()
            .map(|t| RoleRecord::from_template(*t, Utc::now()))
            .collect();
        let registry = RbacRegistry::build(&roles);
        assert_eq!(registry.permissions.len(), CATALOG.len());
        assert_eq!(registry.roles.len(), RoleTemplate::ALL.len());
        assert!(registry.roles["superadmin"].is_system_role);
    }
}
