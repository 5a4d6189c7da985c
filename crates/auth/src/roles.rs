//! Roles: the name carried in tokens, the built-in templates and the stored
//! role record.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rentdesk_core::{AuditStamp, DomainError, DomainResult, Entity, RoleId, UserId, validate};

use crate::permissions::{self, CATALOG, Permission};

/// Role identifier used for RBAC.
///
/// Roles are opaque names at this layer; the mapping from a role to its
/// permissions lives in [`RoleRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Built-in role templates seeded at startup as system roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleTemplate {
    Superadmin,
    Admin,
    Manager,
    Staff,
    Customer,
    Auditor,
    Accountant,
}

impl RoleTemplate {
    pub const ALL: [RoleTemplate; 7] = [
        RoleTemplate::Superadmin,
        RoleTemplate::Admin,
        RoleTemplate::Manager,
        RoleTemplate::Staff,
        RoleTemplate::Customer,
        RoleTemplate::Auditor,
        RoleTemplate::Accountant,
    ];

    /// Role name as stored and carried in tokens.
    pub fn role_name(self) -> &'static str {
        match self {
            RoleTemplate::Superadmin => "superadmin",
            RoleTemplate::Admin => "admin",
            RoleTemplate::Manager => "manager",
            RoleTemplate::Staff => "staff",
            RoleTemplate::Customer => "customer",
            RoleTemplate::Auditor => "auditor",
            RoleTemplate::Accountant => "accountant",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            RoleTemplate::Superadmin => "Unrestricted access to every operation",
            RoleTemplate::Admin => "Full business administration including users and roles",
            RoleTemplate::Manager => "Runs daily operations, approves refunds and adjustments",
            RoleTemplate::Staff => "Front desk: customers, rentals and sales",
            RoleTemplate::Customer => "Self-service read access",
            RoleTemplate::Auditor => "Read-only access plus the audit log",
            RoleTemplate::Accountant => "Payments, refunds and financial reports",
        }
    }

    pub fn permissions(self) -> Vec<Permission> {
        match self {
            RoleTemplate::Superadmin => vec![Permission::new(Permission::WILDCARD)],
            RoleTemplate::Admin => pick(|_| true),
            RoleTemplate::Manager => pick(|name| {
                !name.starts_with("users.")
                    && !name.starts_with("roles.")
                    && !matches!(name, "audit.read" | "system.manage")
                    || matches!(name, "users.read" | "users.unlock" | "roles.read" | "roles.assign")
            }),
            RoleTemplate::Staff => pick(|name| {
                name.ends_with(".read")
                    && !matches!(name, "users.read" | "roles.read" | "audit.read" | "reports.read" | "system.read")
                    || matches!(
                        name,
                        "customers.create"
                            | "customers.update"
                            | "inventory.update"
                            | "transactions.create"
                            | "transactions.update"
                            | "transactions.payments"
                            | "rentals.create"
                            | "rentals.update"
                    )
            }),
            RoleTemplate::Customer => pick(|name| {
                matches!(name, "categories.read" | "brands.read" | "locations.read" | "inventory.read")
            }),
            RoleTemplate::Auditor => pick(|name| name.ends_with(".read")),
            RoleTemplate::Accountant => pick(|name| {
                matches!(
                    name,
                    "customers.read"
                        | "customers.credit"
                        | "suppliers.read"
                        | "transactions.read"
                        | "transactions.payments"
                        | "transactions.refunds"
                        | "rentals.read"
                        | "reports.read"
                )
            }),
        }
    }
}

/// Stored role: name + granted permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    id: RoleId,
    name: String,
    description: Option<String>,
    permissions: Vec<Permission>,
    is_system_role: bool,
    audit: AuditStamp,
}

impl Entity for RoleRecord {
    type Id = RoleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn is_active(&self) -> bool {
        self.audit.is_active
    }
}

impl RoleRecord {
    pub fn create(
        id: RoleId,
        name: &str,
        description: Option<&str>,
        permissions: Vec<Permission>,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let mut role = Self {
            id,
            name: normalize_role_name(name)?,
            description: validate::optional_text("description", description, 500)?,
            permissions: Vec::new(),
            is_system_role: false,
            audit: AuditStamp::new(actor, now),
        };
        role.set_permissions(permissions, actor, now)?;
        Ok(role)
    }

    /// System role seeded from a template (cannot be deleted or edited).
    pub fn from_template(template: RoleTemplate, now: DateTime<Utc>) -> Self {
        Self {
            id: RoleId::new(),
            name: template.role_name().to_string(),
            description: Some(template.description().to_string()),
            permissions: template.permissions(),
            is_system_role: true,
            audit: AuditStamp::new(None, now),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> Role {
        Role::new(self.name.clone())
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn permissions(&self) -> &[Permission] {
        &self.permissions
    }

    pub fn is_system_role(&self) -> bool {
        self.is_system_role
    }

    pub fn can_be_deleted(&self) -> bool {
        !self.is_system_role
    }

    pub fn audit(&self) -> &AuditStamp {
        &self.audit
    }

    pub fn grants(&self, permission: &Permission) -> bool {
        self.permissions
            .iter()
            .any(|p| p.is_wildcard() || p == permission)
    }

    /// Replace the granted set. Unknown permissions and unmet dependencies are rejected.
    pub fn set_permissions(
        &mut self,
        permissions: Vec<Permission>,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_editable()?;
        if let Some(unknown) = permissions.iter().find(|p| !permissions::is_known(p)) {
            return Err(DomainError::validation(format!("unknown permission '{unknown}'")));
        }
        let missing = permissions::missing_dependencies(&permissions);
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(Permission::as_str).collect();
            return Err(DomainError::validation(format!(
                "missing permission dependencies: {}",
                names.join(", ")
            )));
        }
        let mut permissions = permissions;
        permissions.sort();
        permissions.dedup();
        self.permissions = permissions;
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn update_description(
        &mut self,
        description: Option<&str>,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_editable()?;
        self.description = validate::optional_text("description", description, 500)?;
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn delete(&mut self, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.can_be_deleted() {
            return Err(DomainError::invariant("system roles cannot be deleted"));
        }
        self.audit.deactivate(actor, now);
        Ok(())
    }

    fn ensure_editable(&self) -> DomainResult<()> {
        if self.is_system_role {
            return Err(DomainError::invariant("system roles cannot be modified"));
        }
        Ok(())
    }
}

fn pick(pred: impl Fn(&str) -> bool) -> Vec<Permission> {
    CATALOG
        .iter()
        .filter(|p| pred(p.name))
        .map(|p| Permission::new(p.name))
        .collect()
}

fn normalize_role_name(name: &str) -> DomainResult<String> {
    let name = validate::required_text("role name", name, 50)?.to_lowercase();
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(DomainError::validation(
            "role name must contain only letters, numbers, hyphens and underscores",
        ));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap()
    }

    #[test]
    fn every_template_satisfies_its_own_dependencies() {
        for template in RoleTemplate::ALL {
            let perms = template.permissions();
            assert!(
                permissions::missing_dependencies(&perms).is_empty(),
                "{template:?} misses {:?}",
                permissions::missing_dependencies(&perms)
            );
        }
    }

    #[test]
    fn superadmin_template_is_wildcard() {
        let role = RoleRecord::from_template(RoleTemplate::Superadmin, test_time());
        assert!(role.grants(&Permission::new("transactions.refunds")));
        assert!(!role.can_be_deleted());
    }

    #[test]
    fn custom_role_rejects_unknown_permissions() {
        let err = RoleRecord::create(
            RoleId::new(),
            "cashier",
            None,
            vec![Permission::new("bananas.peel")],
            None,
            test_time(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn custom_role_requires_dependencies() {
        let err = RoleRecord::create(
            RoleId::new(),
            "cashier",
            None,
            vec![Permission::new("transactions.payments")],
            None,
            test_time(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("transactions.read")));
    }

    #[test]
    fn system_roles_are_immutable() {
        let mut role = RoleRecord::from_template(RoleTemplate::Staff, test_time());
        assert!(role.set_permissions(vec![], None, test_time()).is_err());
        assert!(matches!(
            role.delete(None, test_time()),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn role_names_are_normalized() {
        let role = RoleRecord::create(RoleId::new(), "  Night-Shift ", None, vec![], None, test_time()).unwrap();
        assert_eq!(role.name(), "night-shift");
        assert!(RoleRecord::create(RoleId::new(), "night shift", None, vec![], None, test_time()).is_err());
    }
}
