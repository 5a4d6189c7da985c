//! User accounts: identity, credentials, lockout and role/permission grants.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rentdesk_core::{AuditStamp, DomainError, DomainResult, Entity, UserId, validate};

use crate::password::{HashedPassword, PasswordError};
use crate::{Permission, Role};

/// Consecutive failed logins that lock an account.
pub const MAX_FAILED_LOGIN_ATTEMPTS: u32 = 5;

/// User account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    /// User is active and can authenticate.
    #[default]
    Active,
    Inactive,
    Suspended,
    /// Locked after too many failed logins; cleared by `unlock`.
    Locked,
}

impl core::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            UserStatus::Active => "ACTIVE",
            UserStatus::Inactive => "INACTIVE",
            UserStatus::Suspended => "SUSPENDED",
            UserStatus::Locked => "LOCKED",
        };
        f.write_str(s)
    }
}

/// Account tier used for the "who may manage whom" rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserType {
    Superadmin,
    Admin,
    #[default]
    User,
    Customer,
}

impl UserType {
    /// SUPERADMIN manages everyone, ADMIN manages USER and CUSTOMER,
    /// USER manages CUSTOMER, CUSTOMER manages nobody.
    pub fn can_manage(self, other: UserType) -> bool {
        match self {
            UserType::Superadmin => true,
            UserType::Admin => matches!(other, UserType::User | UserType::Customer),
            UserType::User => other == UserType::Customer,
            UserType::Customer => false,
        }
    }
}

/// Input for [`User::register`].
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub phone: Option<&'a str>,
    pub user_type: UserType,
    pub is_superuser: bool,
}

/// Profile fields that may be changed after registration.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate<'a> {
    pub email: Option<&'a str>,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub phone: Option<Option<&'a str>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    username: String,
    email: String,
    first_name: String,
    last_name: String,
    phone: Option<String>,
    password: HashedPassword,
    status: UserStatus,
    user_type: UserType,
    is_superuser: bool,
    roles: BTreeSet<Role>,
    direct_permissions: BTreeSet<Permission>,
    last_login: Option<DateTime<Utc>>,
    failed_login_attempts: u32,
    audit: AuditStamp,
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn is_active(&self) -> bool {
        self.audit.is_active
    }
}

fn password_error(err: PasswordError) -> DomainError {
    DomainError::validation(err.to_string())
}

fn normalize_username(value: &str) -> DomainResult<String> {
    let username = validate::required_text("username", value, 50)?;
    if username.len() < 3 {
        return Err(DomainError::validation("username must be at least 3 characters"));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(DomainError::validation(
            "username may only contain letters, numbers, '.', '_' and '-'",
        ));
    }
    Ok(username.to_lowercase())
}

impl User {
    pub fn register(
        id: UserId,
        input: NewUser<'_>,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Ok(Self {
            id,
            username: normalize_username(input.username)?,
            email: validate::email("email", input.email)?,
            first_name: validate::required_text("first name", input.first_name, 100)?,
            last_name: validate::required_text("last name", input.last_name, 100)?,
            phone: validate::optional_text("phone", input.phone, 20)?,
            password: HashedPassword::from_plain(input.password).map_err(password_error)?,
            status: UserStatus::Active,
            user_type: input.user_type,
            is_superuser: input.is_superuser,
            roles: BTreeSet::new(),
            direct_permissions: BTreeSet::new(),
            last_login: None,
            failed_login_attempts: 0,
            audit: AuditStamp::new(actor, now),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    pub fn status(&self) -> UserStatus {
        self.status
    }

    pub fn user_type(&self) -> UserType {
        self.user_type
    }

    pub fn is_superuser(&self) -> bool {
        self.is_superuser
    }

    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.iter()
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }

    pub fn direct_permissions(&self) -> impl Iterator<Item = &Permission> {
        self.direct_permissions.iter()
    }

    pub fn last_login(&self) -> Option<DateTime<Utc>> {
        self.last_login
    }

    pub fn failed_login_attempts(&self) -> u32 {
        self.failed_login_attempts
    }

    pub fn audit(&self) -> &AuditStamp {
        &self.audit
    }

    /// Active, not soft-deleted and not locked/suspended.
    pub fn can_login(&self) -> bool {
        self.audit.is_active && self.status == UserStatus::Active
    }

    pub fn verify_password(&self, plain: &str) -> bool {
        self.password.verify(plain)
    }

    /// Successful login: stamps `last_login` and clears the failure counter.
    pub fn record_login(&mut self, now: DateTime<Utc>) {
        self.last_login = Some(now);
        self.failed_login_attempts = 0;
        self.audit.updated_at = now;
    }

    /// Failed login. The fifth consecutive failure locks the account.
    pub fn record_failed_login(&mut self, now: DateTime<Utc>) {
        self.failed_login_attempts += 1;
        if self.failed_login_attempts >= MAX_FAILED_LOGIN_ATTEMPTS && self.status == UserStatus::Active {
            self.status = UserStatus::Locked;
            tracing::warn!(user_id = %self.id, "account locked after repeated login failures");
        }
        self.audit.updated_at = now;
    }

    pub fn unlock(&mut self, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != UserStatus::Locked && self.failed_login_attempts == 0 {
            return Err(DomainError::invariant("user is not locked"));
        }
        self.status = UserStatus::Active;
        self.failed_login_attempts = 0;
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn set_status(&mut self, status: UserStatus, actor: Option<UserId>, now: DateTime<Utc>) {
        self.status = status;
        if status == UserStatus::Active {
            self.failed_login_attempts = 0;
        }
        self.audit.touch(actor, now);
    }

    pub fn set_password(&mut self, plain: &str, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.password = HashedPassword::from_plain(plain).map_err(password_error)?;
        self.audit.touch(actor, now);
        Ok(())
    }

    /// Change own password; the current one must verify.
    pub fn change_password(&mut self, current: &str, new: &str, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.verify_password(current) {
            return Err(DomainError::validation("current password is incorrect"));
        }
        if current == new {
            return Err(DomainError::validation("new password must differ from the current one"));
        }
        let actor = Some(self.id);
        self.set_password(new, actor, now)
    }

    pub fn update_profile(
        &mut self,
        update: ProfileUpdate<'_>,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let email = update.email.map(|e| validate::email("email", e)).transpose()?;
        let first_name = update
            .first_name
            .map(|v| validate::required_text("first name", v, 100))
            .transpose()?;
        let last_name = update
            .last_name
            .map(|v| validate::required_text("last name", v, 100))
            .transpose()?;
        let phone = update
            .phone
            .map(|v| validate::optional_text("phone", v, 20))
            .transpose()?;

        if let Some(email) = email {
            self.email = email;
        }
        if let Some(first_name) = first_name {
            self.first_name = first_name;
        }
        if let Some(last_name) = last_name {
            self.last_name = last_name;
        }
        if let Some(phone) = phone {
            self.phone = phone;
        }
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn assign_role(&mut self, role: Role, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_not_suspended()?;
        if !self.roles.insert(role.clone()) {
            return Err(DomainError::conflict(format!("user already has role '{role}'")));
        }
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn revoke_role(&mut self, role: &Role, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.roles.remove(role) {
            return Err(DomainError::not_found(format!("role '{role}' on user")));
        }
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn grant_permission(
        &mut self,
        permission: Permission,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_not_suspended()?;
        if !crate::permissions::is_known(&permission) {
            return Err(DomainError::validation(format!("unknown permission '{permission}'")));
        }
        if !self.direct_permissions.insert(permission.clone()) {
            return Err(DomainError::conflict(format!(
                "user already has permission '{permission}'"
            )));
        }
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn revoke_permission(
        &mut self,
        permission: &Permission,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if !self.direct_permissions.remove(permission) {
            return Err(DomainError::not_found(format!("permission '{permission}' on user")));
        }
        self.audit.touch(actor, now);
        Ok(())
    }

    /// Union of role permissions and direct grants. Superusers get `*`.
    ///
    /// `role_permissions` resolves a role name to its granted permissions;
    /// unknown or deleted roles resolve to nothing.
    pub fn effective_permissions<F>(&self, role_permissions: F) -> Vec<Permission>
    where
        F: Fn(&Role) -> Vec<Permission>,
    {
        if self.is_superuser {
            return vec![Permission::new(Permission::WILDCARD)];
        }
        let mut effective: BTreeSet<Permission> = self.direct_permissions.clone();
        for role in &self.roles {
            effective.extend(role_permissions(role));
        }
        if effective.iter().any(Permission::is_wildcard) {
            return vec![Permission::new(Permission::WILDCARD)];
        }
        effective.into_iter().collect()
    }

    pub fn delete(&mut self, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.audit.is_active {
            return Err(DomainError::not_found(format!("user {}", self.id)));
        }
        self.status = UserStatus::Inactive;
        self.audit.deactivate(actor, now);
        Ok(())
    }

    fn ensure_not_suspended(&self) -> DomainResult<()> {
        if self.status == UserStatus::Suspended {
            return Err(DomainError::invariant("user is suspended"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn sample_user() -> User {
        User::register(
            UserId::new(),
            NewUser {
                username: "JDoe",
                email: "JDoe@Example.com",
                password: "sup3r-secret",
                first_name: "Jane",
                last_name: "Doe",
                phone: None,
                user_type: UserType::User,
                is_superuser: false,
            },
            None,
            test_time(),
        )
        .unwrap()
    }

    #[test]
    fn register_normalizes_identity() {
        let user = sample_user();
        assert_eq!(user.username(), "jdoe");
        assert_eq!(user.email(), "jdoe@example.com");
        assert!(user.verify_password("sup3r-secret"));
        assert!(user.can_login());
    }

    #[test]
    fn fifth_failure_locks_and_unlock_restores() {
        let mut user = sample_user();
        for _ in 0..4 {
            user.record_failed_login(test_time());
        }
        assert_eq!(user.status(), UserStatus::Active);

        user.record_failed_login(test_time());
        assert_eq!(user.status(), UserStatus::Locked);
        assert!(!user.can_login());

        user.unlock(None, test_time()).unwrap();
        assert_eq!(user.status(), UserStatus::Active);
        assert_eq!(user.failed_login_attempts(), 0);
    }

    #[test]
    fn successful_login_resets_failures() {
        let mut user = sample_user();
        user.record_failed_login(test_time());
        user.record_login(test_time());
        assert_eq!(user.failed_login_attempts(), 0);
        assert_eq!(user.last_login(), Some(test_time()));
    }

    #[test]
    fn effective_permissions_merge_roles_and_direct_grants() {
        let mut user = sample_user();
        user.assign_role(Role::new("staff"), None, test_time()).unwrap();
        user.grant_permission(Permission::new("reports.read"), None, test_time())
            .unwrap();

        let perms = user.effective_permissions(|role| {
            if role.as_str() == "staff" {
                vec![Permission::new("customers.read")]
            } else {
                vec![]
            }
        });
        assert_eq!(
            perms,
            vec![Permission::new("customers.read"), Permission::new("reports.read")]
        );
    }

    #[test]
    fn duplicate_role_is_a_conflict() {
        let mut user = sample_user();
        user.assign_role(Role::new("staff"), None, test_time()).unwrap();
        let err = user.assign_role(Role::new("staff"), None, test_time()).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn user_type_hierarchy() {
        assert!(UserType::Superadmin.can_manage(UserType::Admin));
        assert!(UserType::Admin.can_manage(UserType::Customer));
        assert!(!UserType::Admin.can_manage(UserType::Admin));
        assert!(UserType::User.can_manage(UserType::Customer));
        assert!(!UserType::Customer.can_manage(UserType::Customer));
    }

    #[test]
    fn change_password_requires_current() {
        let mut user = sample_user();
        assert!(user.change_password("wrong-one", "another-secret", test_time()).is_err());
        user.change_password("sup3r-secret", "another-secret", test_time())
            .unwrap();
        assert!(user.verify_password("another-secret"));
    }
}
