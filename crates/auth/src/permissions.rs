//! Permission identifiers and the built-in permission catalog.

use std::borrow::Cow;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are modeled as opaque dotted strings (e.g. "customers.read").
/// The wildcard permission `"*"` is held by the superadmin role and grants
/// everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: &'static str = "*";

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == Self::WILDCARD
    }

    /// `"customers.read"` -> `"customers"`.
    pub fn area(&self) -> &str {
        self.as_str().split('.').next().unwrap_or_default()
    }

    /// `"customers.read"` -> `"read"`.
    pub fn action(&self) -> &str {
        self.as_str().rsplit('.').next().unwrap_or_default()
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Grouping used by the registry and the role editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionCategory {
    UserManagement,
    RoleManagement,
    MasterData,
    Customers,
    Suppliers,
    Inventory,
    Transactions,
    Rentals,
    Reporting,
    Audit,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Static description of one catalog permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PermissionDef {
    pub name: &'static str,
    pub category: PermissionCategory,
    pub risk: RiskLevel,
    pub description: &'static str,
}

macro_rules! perm {
    ($name:literal, $cat:ident, $risk:ident, $desc:literal) => {
        PermissionDef {
            name: $name,
            category: PermissionCategory::$cat,
            risk: RiskLevel::$risk,
            description: $desc,
        }
    };
}

/// Every permission the API checks.
pub const CATALOG: &[PermissionDef] = &[
    perm!("users.create", UserManagement, Medium, "Create user accounts"),
    perm!("users.read", UserManagement, Low, "View user accounts"),
    perm!("users.update", UserManagement, Medium, "Edit user profiles and status"),
    perm!("users.delete", UserManagement, Critical, "Deactivate user accounts"),
    perm!("users.unlock", UserManagement, Medium, "Unlock locked accounts"),
    perm!("users.manage_permissions", UserManagement, Critical, "Grant or revoke direct permissions"),
    perm!("roles.create", RoleManagement, High, "Create roles"),
    perm!("roles.read", RoleManagement, Low, "View roles and the permission catalog"),
    perm!("roles.update", RoleManagement, High, "Change role permissions"),
    perm!("roles.delete", RoleManagement, Critical, "Delete custom roles"),
    perm!("roles.assign", RoleManagement, High, "Assign or revoke roles on users"),
    perm!("categories.create", MasterData, Medium, "Create categories"),
    perm!("categories.read", MasterData, Low, "View the category tree"),
    perm!("categories.update", MasterData, Medium, "Rename, move and reorder categories"),
    perm!("categories.delete", MasterData, High, "Delete categories"),
    perm!("brands.create", MasterData, Medium, "Create brands"),
    perm!("brands.read", MasterData, Low, "View brands"),
    perm!("brands.update", MasterData, Medium, "Edit brands"),
    perm!("brands.delete", MasterData, High, "Delete brands"),
    perm!("locations.create", MasterData, Medium, "Create locations"),
    perm!("locations.read", MasterData, Low, "View locations"),
    perm!("locations.update", MasterData, Medium, "Edit locations"),
    perm!("locations.delete", MasterData, High, "Delete locations"),
    perm!("customers.create", Customers, Medium, "Register customers"),
    perm!("customers.read", Customers, Low, "View customers"),
    perm!("customers.update", Customers, Medium, "Edit customers"),
    perm!("customers.delete", Customers, High, "Deactivate customers"),
    perm!("customers.blacklist", Customers, High, "Blacklist or clear customers"),
    perm!("customers.credit", Customers, High, "Change credit limits and tiers"),
    perm!("suppliers.create", Suppliers, Medium, "Register suppliers"),
    perm!("suppliers.read", Suppliers, Low, "View suppliers"),
    perm!("suppliers.update", Suppliers, Medium, "Edit suppliers and their status"),
    perm!("suppliers.delete", Suppliers, High, "Deactivate suppliers"),
    perm!("inventory.create", Inventory, Medium, "Create items, units and stock levels"),
    perm!("inventory.read", Inventory, Low, "View inventory"),
    perm!("inventory.update", Inventory, Medium, "Edit items and move units between states"),
    perm!("inventory.delete", Inventory, High, "Delete items and units"),
    perm!("inventory.adjust", Inventory, High, "Adjust, reserve and release stock"),
    perm!("transactions.create", Transactions, Medium, "Create transactions and lines"),
    perm!("transactions.read", Transactions, Low, "View transactions"),
    perm!("transactions.update", Transactions, Medium, "Edit transactions and change status"),
    perm!("transactions.delete", Transactions, High, "Delete draft transactions"),
    perm!("transactions.payments", Transactions, High, "Record payments"),
    perm!("transactions.refunds", Transactions, Critical, "Issue refunds"),
    perm!("transactions.cancel", Transactions, High, "Cancel transactions"),
    perm!("rentals.create", Rentals, Medium, "Open rental returns"),
    perm!("rentals.read", Rentals, Low, "View rental returns"),
    perm!("rentals.update", Rentals, Medium, "Inspect and assess returns"),
    perm!("rentals.delete", Rentals, High, "Delete initiated returns"),
    perm!("rentals.finalize", Rentals, High, "Finalize or cancel returns"),
    perm!("reports.read", Reporting, Low, "View reports and statistics"),
    perm!("audit.read", Audit, Medium, "View the RBAC audit log"),
    perm!("system.read", System, Low, "View system settings and system info"),
    perm!("system.update", System, High, "Change or reset system setting values"),
    perm!("system.manage", System, Critical, "Create, delete and seed settings; read sensitive values"),
];

pub fn definition(name: &str) -> Option<&'static PermissionDef> {
    CATALOG.iter().find(|p| p.name == name)
}

pub fn is_known(permission: &Permission) -> bool {
    permission.is_wildcard() || definition(permission.as_str()).is_some()
}

pub fn all_permissions() -> Vec<Permission> {
    CATALOG.iter().map(|p| Permission::new(p.name)).collect()
}

/// Unknown permissions default to `Low`; the wildcard is `Critical`.
pub fn risk_level(permission: &Permission) -> RiskLevel {
    if permission.is_wildcard() {
        return RiskLevel::Critical;
    }
    definition(permission.as_str()).map(|p| p.risk).unwrap_or(RiskLevel::Low)
}

/// Permissions that must be held alongside `permission`.
///
/// Any non-read action on an area implies `<area>.read`; deletes also imply
/// `<area>.update`.
pub fn dependencies(permission: &Permission) -> Vec<Permission> {
    if permission.is_wildcard() || definition(permission.as_str()).is_none() {
        return Vec::new();
    }
    let area = permission.area();
    let mut deps = Vec::new();
    match permission.action() {
        "read" => {}
        "delete" => {
            deps.push(Permission::new(format!("{area}.read")));
            if definition(&format!("{area}.update")).is_some() {
                deps.push(Permission::new(format!("{area}.update")));
            }
        }
        _ => deps.push(Permission::new(format!("{area}.read"))),
    }
    deps.retain(|d| definition(d.as_str()).is_some());
    deps
}

/// Dependencies not satisfied within `granted` (sorted, de-duplicated).
pub fn missing_dependencies(granted: &[Permission]) -> Vec<Permission> {
    if granted.iter().any(Permission::is_wildcard) {
        return Vec::new();
    }
    let held: BTreeSet<&str> = granted.iter().map(Permission::as_str).collect();
    let missing: BTreeSet<Permission> = granted
        .iter()
        .flat_map(dependencies)
        .filter(|d| !held.contains(d.as_str()))
        .collect();
    missing.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_names_are_unique_and_dotted() {
        let mut seen = BTreeSet::new();
        for p in CATALOG {
            assert!(p.name.contains('.'), "{} is not dotted", p.name);
            assert!(seen.insert(p.name), "{} listed twice", p.name);
        }
    }

    #[test]
    fn every_dependency_is_in_the_catalog() {
        for p in all_permissions() {
            for dep in dependencies(&p) {
                assert!(is_known(&dep), "{p} depends on unknown {dep}");
            }
        }
    }

    #[test]
    fn delete_depends_on_read_and_update() {
        let deps = dependencies(&Permission::new("customers.delete"));
        assert!(deps.contains(&Permission::new("customers.read")));
        assert!(deps.contains(&Permission::new("customers.update")));
    }

    #[test]
    fn missing_dependencies_are_reported() {
        let granted = vec![Permission::new("transactions.refunds")];
        assert_eq!(
            missing_dependencies(&granted),
            vec![Permission::new("transactions.read")]
        );

        let granted = vec![
            Permission::new("transactions.refunds"),
            Permission::new("transactions.read"),
        ];
        assert!(missing_dependencies(&granted).is_empty());
    }

    #[test]
    fn system_permissions_depend_on_read() {
        assert_eq!(
            dependencies(&Permission::new("system.manage")),
            vec![Permission::new("system.read")]
        );
        assert_eq!(risk_level(&Permission::new("system.manage")), RiskLevel::Critical);
    }

    #[test]
    fn wildcard_is_critical_and_self_sufficient() {
        let wildcard = Permission::new("*");
        assert_eq!(risk_level(&wildcard), RiskLevel::Critical);
        assert!(missing_dependencies(&[wildcard]).is_empty());
    }
}
