//! Users, roles, login and the RBAC audit trail.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use rentdesk_auth::{
    AuthorizationExplanation, Hs256JwtIssuer, Hs256JwtValidator, JwtClaims, JwtValidator, NewUser, Permission,
    Principal, ProfileUpdate, RbacAction, RbacAuditEntry, RbacRegistry, Role, RoleRecord, RoleTemplate, User,
    UserStatus, UserType, explain_authorization,
};
use rentdesk_core::{DomainError, DomainResult, Entity, Page, PageRequest, RoleId, UserId};

use super::{ServiceError, ServiceResult, Stores, list_active, load_active};

#[derive(Clone)]
pub struct AuthSettings {
    pub jwt_secret: Vec<u8>,
    pub access_token_ttl: Duration,
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("jwt_secret", &"<redacted>")
            .field("access_token_ttl", &self.access_token_ttl)
            .finish()
    }
}

/// Superuser created on first start when no account with that name exists.
#[derive(Clone)]
pub struct AdminSeed {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub claims: JwtClaims,
    pub user: User,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilter {
    pub status: Option<UserStatus>,
    pub user_type: Option<UserType>,
    pub role: Option<String>,
    pub search: Option<String>,
}

impl UserFilter {
    fn matches(&self, user: &User) -> bool {
        let term = self.search.as_deref().map(|t| t.trim().to_lowercase()).unwrap_or_default();
        self.status.is_none_or(|s| user.status() == s)
            && self.user_type.is_none_or(|t| user.user_type() == t)
            && self
                .role
                .as_deref()
                .is_none_or(|role| user.has_role(&Role::new(role.trim().to_lowercase())))
            && (term.is_empty()
                || user.username().contains(&term)
                || user.email().to_lowercase().contains(&term)
                || user.full_name().to_lowercase().contains(&term))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserInput {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub user_type: UserType,
    #[serde(default)]
    pub is_superuser: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub status: Option<UserStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RoleUpdate {
    pub description: Option<String>,
    pub permissions: Option<Vec<Permission>>,
}

#[derive(Clone)]
pub struct AuthService {
    stores: Stores,
    issuer: Arc<Hs256JwtIssuer>,
    validator: Arc<Hs256JwtValidator>,
    write_lock: Arc<Mutex<()>>,
}

fn user_id(user: &User) -> UserId {
    *Entity::id(user)
}

impl AuthService {
    pub fn new(stores: Stores, settings: AuthSettings) -> Self {
        Self {
            stores,
            issuer: Arc::new(Hs256JwtIssuer::new(&settings.jwt_secret, settings.access_token_ttl)),
            validator: Arc::new(Hs256JwtValidator::new(settings.jwt_secret)),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn validator(&self) -> Arc<dyn JwtValidator> {
        self.validator.clone()
    }

    /// Seed missing system roles and, if configured, the first superuser.
    #[instrument(skip(self, admin), err)]
    pub async fn bootstrap(&self, admin: Option<&AdminSeed>) -> ServiceResult<()> {
        let _guard = self.write_lock.lock().await;
        let now = Utc::now();
        let existing = list_active(&*self.stores.roles).await?;
        let missing: Vec<RoleRecord> = RoleTemplate::ALL
            .into_iter()
            .filter(|t| !existing.iter().any(|r| r.name() == t.role_name()))
            .map(|t| RoleRecord::from_template(t, now))
            .collect();
        if !missing.is_empty() {
            self.stores.roles.upsert_many(&missing).await?;
            info!(count = missing.len(), "system roles seeded");
        }

        let Some(seed) = admin else {
            return Ok(());
        };
        let users = list_active(&*self.stores.users).await?;
        if users.iter().any(|u| u.username() == seed.username.trim().to_lowercase()) {
            return Ok(());
        }
        let mut user = User::register(
            UserId::new(),
            NewUser {
                username: &seed.username,
                email: &seed.email,
                password: &seed.password,
                first_name: "System",
                last_name: "Administrator",
                phone: None,
                user_type: UserType::Superadmin,
                is_superuser: true,
            },
            None,
            now,
        )?;
        user.assign_role(Role::new(RoleTemplate::Superadmin.role_name()), None, now)?;
        self.stores.users.upsert(&user).await?;
        info!(username = %user.username(), "admin account seeded");
        Ok(())
    }

    async fn role_permissions(&self) -> ServiceResult<HashMap<String, Vec<Permission>>> {
        Ok(list_active(&*self.stores.roles)
            .await?
            .into_iter()
            .map(|r| (r.name().to_string(), r.permissions().to_vec()))
            .collect())
    }

    async fn effective_permissions(&self, user: &User) -> ServiceResult<Vec<Permission>> {
        let roles = self.role_permissions().await?;
        Ok(user.effective_permissions(|role| roles.get(role.as_str()).cloned().unwrap_or_default()))
    }

    async fn issue_token(&self, user: User) -> ServiceResult<LoginResult> {
        let now = Utc::now();
        let claims = JwtClaims {
            sub: user_id(&user),
            username: user.username().to_string(),
            roles: user.roles().cloned().collect(),
            permissions: self.effective_permissions(&user).await?,
            issued_at: now,
            expires_at: now,
        };
        let (access_token, claims) = self
            .issuer
            .issue(claims, now)
            .map_err(|err| ServiceError::Internal(err.to_string()))?;
        Ok(LoginResult {
            access_token,
            expires_at: claims.expires_at,
            claims,
            user,
        })
    }

    async fn record(&self, entry: RbacAuditEntry) -> ServiceResult<()> {
        if !entry.success {
            warn!(action = ?entry.action, detail = ?entry.detail, "rbac action failed");
        }
        self.stores.rbac_audit.upsert(&entry).await?;
        Ok(())
    }

    /// Writes the audit entry for `result`, marking it failed on error.
    async fn audited<T>(&self, entry: RbacAuditEntry, result: ServiceResult<T>) -> ServiceResult<T> {
        let entry = match &result {
            Ok(_) => entry,
            Err(err) => entry.failed(err.to_string()),
        };
        self.record(entry).await?;
        result
    }

    async fn find_by_username(&self, username: &str) -> ServiceResult<Option<User>> {
        let wanted = username.trim().to_lowercase();
        Ok(list_active(&*self.stores.users)
            .await?
            .into_iter()
            .find(|u| u.username() == wanted))
    }

    // ── session ─────────────────────────────────────────────────────────────

    #[instrument(skip(self, password), err)]
    pub async fn login(&self, username: &str, password: &str) -> ServiceResult<LoginResult> {
        let _guard = self.write_lock.lock().await;
        let Some(mut user) = self.find_by_username(username).await? else {
            return Err(ServiceError::Unauthenticated("invalid username or password".into()));
        };
        if !user.can_login() {
            return Err(ServiceError::Forbidden(format!("account is {}", user.status())));
        }
        let now = Utc::now();
        if !user.verify_password(password) {
            user.record_failed_login(now);
            self.stores.users.upsert(&user).await?;
            let id = user_id(&user);
            self.record(
                RbacAuditEntry::new(None, RbacAction::LoginFailed, now)
                    .target(id)
                    .failed("wrong password"),
            )
            .await?;
            if user.status() == UserStatus::Locked {
                self.record(RbacAuditEntry::new(None, RbacAction::AccountLocked, now).target(id))
                    .await?;
            }
            return Err(ServiceError::Unauthenticated("invalid username or password".into()));
        }
        user.record_login(now);
        self.stores.users.upsert(&user).await?;
        info!(user_id = %user_id(&user), "login succeeded");
        self.issue_token(user).await
    }

    /// Fresh token with permissions resolved again.
    pub async fn refresh(&self, id: UserId) -> ServiceResult<LoginResult> {
        let user = load_active(&*self.stores.users, id, "user").await?;
        if !user.can_login() {
            return Err(ServiceError::Forbidden(format!("account is {}", user.status())));
        }
        self.issue_token(user).await
    }

    pub async fn me(&self, id: UserId) -> ServiceResult<User> {
        load_active(&*self.stores.users, id, "user").await
    }

    #[instrument(skip(self, current, new), fields(user_id = %id), err)]
    pub async fn change_password(&self, id: UserId, current: &str, new: &str) -> ServiceResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut user = load_active(&*self.stores.users, id, "user").await?;
        user.change_password(current, new, Utc::now())?;
        self.stores.users.upsert(&user).await?;
        info!(user_id = %id, "password changed");
        Ok(())
    }

    // ── users ───────────────────────────────────────────────────────────────

    async fn acting_user(&self, actor: UserId) -> ServiceResult<User> {
        match self.stores.users.get(actor).await? {
            Some(user) if user.is_active() => Ok(user),
            _ => Err(ServiceError::Forbidden("acting user is not an active account".into())),
        }
    }

    fn ensure_can_manage(actor: &User, target: UserType) -> ServiceResult<()> {
        if actor.is_superuser() || actor.user_type().can_manage(target) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "{:?} accounts cannot manage {:?} accounts",
                actor.user_type(),
                target
            )))
        }
    }

    /// Load `id` for modification by `actor`, enforcing the management rule.
    async fn managed_user(&self, id: UserId, actor: UserId) -> ServiceResult<User> {
        let manager = self.acting_user(actor).await?;
        let user = load_active(&*self.stores.users, id, "user").await?;
        if id != actor {
            Self::ensure_can_manage(&manager, user.user_type())?;
        }
        Ok(user)
    }

    async fn with_managed_user<F>(&self, id: UserId, actor: UserId, apply: F) -> ServiceResult<User>
    where
        F: FnOnce(&mut User) -> DomainResult<()>,
    {
        let _guard = self.write_lock.lock().await;
        let mut user = self.managed_user(id, actor).await?;
        apply(&mut user)?;
        self.stores.users.upsert(&user).await?;
        Ok(user)
    }

    fn ensure_unique(users: &[User], id: Option<UserId>, username: Option<&str>, email: Option<&str>) -> DomainResult<()> {
        for other in users.iter().filter(|u| Some(user_id(u)) != id) {
            if username.is_some_and(|name| other.username() == name.trim().to_lowercase()) {
                return Err(DomainError::conflict(format!("username '{}' is taken", other.username())));
            }
            if email.is_some_and(|email| other.email().eq_ignore_ascii_case(email.trim())) {
                return Err(DomainError::conflict(format!("email '{}' is taken", other.email())));
            }
        }
        Ok(())
    }

    #[instrument(skip(self, input), fields(username = %input.username), err)]
    pub async fn create_user(&self, input: &UserInput, actor: UserId) -> ServiceResult<User> {
        let _guard = self.write_lock.lock().await;
        let manager = self.acting_user(actor).await?;
        Self::ensure_can_manage(&manager, input.user_type)?;
        if input.is_superuser && !manager.is_superuser() {
            return Err(ServiceError::Forbidden("only superusers can create superusers".into()));
        }
        let users = list_active(&*self.stores.users).await?;
        Self::ensure_unique(&users, None, Some(&input.username), Some(&input.email))?;
        let user = User::register(
            UserId::new(),
            NewUser {
                username: &input.username,
                email: &input.email,
                password: &input.password,
                first_name: &input.first_name,
                last_name: &input.last_name,
                phone: input.phone.as_deref(),
                user_type: input.user_type,
                is_superuser: input.is_superuser,
            },
            Some(actor),
            Utc::now(),
        )?;
        self.stores.users.upsert(&user).await?;
        info!(user_id = %user_id(&user), "user created");
        Ok(user)
    }

    pub async fn get_user(&self, id: UserId) -> ServiceResult<User> {
        load_active(&*self.stores.users, id, "user").await
    }

    pub async fn list_users(&self, filter: &UserFilter, page: PageRequest) -> ServiceResult<Page<User>> {
        let mut users: Vec<User> = list_active(&*self.stores.users)
            .await?
            .into_iter()
            .filter(|u| filter.matches(u))
            .collect();
        users.sort_by(|a, b| a.username().cmp(b.username()));
        Ok(Page::from_vec(users, page))
    }

    #[instrument(skip(self, update), fields(user_id = %id), err)]
    pub async fn update_user(&self, id: UserId, update: &UserUpdate, actor: UserId) -> ServiceResult<User> {
        if update.status.is_some() && id == actor {
            return Err(DomainError::invariant("users cannot change their own status").into());
        }
        if let Some(email) = update.email.as_deref() {
            let users = list_active(&*self.stores.users).await?;
            Self::ensure_unique(&users, Some(id), None, Some(email))?;
        }
        self.with_managed_user(id, actor, |user| {
            let now = Utc::now();
            user.update_profile(
                ProfileUpdate {
                    email: update.email.as_deref(),
                    first_name: update.first_name.as_deref(),
                    last_name: update.last_name.as_deref(),
                    phone: update.phone.as_deref().map(Some),
                },
                Some(actor),
                now,
            )?;
            if let Some(status) = update.status {
                user.set_status(status, Some(actor), now);
            }
            Ok(())
        })
        .await
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    pub async fn delete_user(&self, id: UserId, actor: UserId) -> ServiceResult<()> {
        if id == actor {
            return Err(DomainError::invariant("users cannot delete their own account").into());
        }
        self.with_managed_user(id, actor, |user| user.delete(Some(actor), Utc::now()))
            .await?;
        info!(user_id = %id, "user deleted");
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    pub async fn unlock_user(&self, id: UserId, actor: UserId) -> ServiceResult<User> {
        let result = self
            .with_managed_user(id, actor, |user| user.unlock(Some(actor), Utc::now()))
            .await;
        let entry = RbacAuditEntry::new(Some(actor), RbacAction::UserUnlocked, Utc::now()).target(id);
        self.audited(entry, result).await
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    pub async fn assign_role(&self, id: UserId, role: &str, actor: UserId) -> ServiceResult<User> {
        let name = role.trim().to_lowercase();
        let result: ServiceResult<User> = async {
            let record = self.role_by_name(&name).await?;
            self.with_managed_user(id, actor, |user| user.assign_role(record.role(), Some(actor), Utc::now()))
                .await
        }
        .await;
        let entry = RbacAuditEntry::new(Some(actor), RbacAction::RoleAssigned, Utc::now())
            .target(id)
            .subject(name);
        self.audited(entry, result).await
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    pub async fn revoke_role(&self, id: UserId, role: &str, actor: UserId) -> ServiceResult<User> {
        let role = Role::new(role.trim().to_lowercase());
        let result = self
            .with_managed_user(id, actor, |user| user.revoke_role(&role, Some(actor), Utc::now()))
            .await;
        let entry = RbacAuditEntry::new(Some(actor), RbacAction::RoleRevoked, Utc::now())
            .target(id)
            .subject(role.as_str());
        self.audited(entry, result).await
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    pub async fn grant_permission(&self, id: UserId, permission: &str, actor: UserId) -> ServiceResult<User> {
        let permission = Permission::new(permission.trim().to_string());
        let result = self
            .with_managed_user(id, actor, |user| {
                user.grant_permission(permission.clone(), Some(actor), Utc::now())
            })
            .await;
        let entry = RbacAuditEntry::new(Some(actor), RbacAction::PermissionGranted, Utc::now())
            .target(id)
            .subject(permission.as_str());
        self.audited(entry, result).await
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    pub async fn revoke_permission(&self, id: UserId, permission: &str, actor: UserId) -> ServiceResult<User> {
        let permission = Permission::new(permission.trim().to_string());
        let result = self
            .with_managed_user(id, actor, |user| user.revoke_permission(&permission, Some(actor), Utc::now()))
            .await;
        let entry = RbacAuditEntry::new(Some(actor), RbacAction::PermissionRevoked, Utc::now())
            .target(id)
            .subject(permission.as_str());
        self.audited(entry, result).await
    }

    /// Role grants and direct grants, resolved against the current roles.
    pub async fn user_permissions(&self, id: UserId) -> ServiceResult<Vec<Permission>> {
        let user = load_active(&*self.stores.users, id, "user").await?;
        self.effective_permissions(&user).await
    }

    /// The principal a fresh token for `id` would carry.
    pub async fn principal_for(&self, id: UserId) -> ServiceResult<Principal> {
        let user = load_active(&*self.stores.users, id, "user").await?;
        let permissions = self.effective_permissions(&user).await?;
        Ok(Principal {
            user_id: id,
            username: user.username().to_string(),
            roles: user.roles().cloned().collect(),
            permissions,
        })
    }

    // ── roles ───────────────────────────────────────────────────────────────

    async fn role_by_name(&self, name: &str) -> ServiceResult<RoleRecord> {
        list_active(&*self.stores.roles)
            .await?
            .into_iter()
            .find(|r| r.name() == name)
            .ok_or_else(|| DomainError::not_found(format!("role '{name}'")).into())
    }

    #[instrument(skip(self, input), fields(role = %input.name), err)]
    pub async fn create_role(&self, input: &RoleInput, actor: UserId) -> ServiceResult<RoleRecord> {
        let result: ServiceResult<RoleRecord> = async {
            let _guard = self.write_lock.lock().await;
            let role = RoleRecord::create(
                RoleId::new(),
                &input.name,
                input.description.as_deref(),
                input.permissions.clone(),
                Some(actor),
                Utc::now(),
            )?;
            if self.role_by_name(role.name()).await.is_ok() {
                return Err(DomainError::conflict(format!("role '{}' already exists", role.name())).into());
            }
            self.stores.roles.upsert(&role).await?;
            Ok(role)
        }
        .await;
        let entry = RbacAuditEntry::new(Some(actor), RbacAction::RoleCreated, Utc::now())
            .subject(input.name.trim().to_lowercase());
        self.audited(entry, result).await
    }

    pub async fn get_role(&self, id: RoleId) -> ServiceResult<RoleRecord> {
        load_active(&*self.stores.roles, id, "role").await
    }

    pub async fn list_roles(&self, page: PageRequest) -> ServiceResult<Page<RoleRecord>> {
        let mut roles = list_active(&*self.stores.roles).await?;
        roles.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(Page::from_vec(roles, page))
    }

    #[instrument(skip(self, update), fields(role_id = %id), err)]
    pub async fn update_role(&self, id: RoleId, update: &RoleUpdate, actor: UserId) -> ServiceResult<RoleRecord> {
        let result: ServiceResult<RoleRecord> = async {
            let _guard = self.write_lock.lock().await;
            let mut role = load_active(&*self.stores.roles, id, "role").await?;
            let now = Utc::now();
            if let Some(permissions) = &update.permissions {
                role.set_permissions(permissions.clone(), Some(actor), now)?;
            }
            if update.description.is_some() {
                role.update_description(update.description.as_deref(), Some(actor), now)?;
            }
            self.stores.roles.upsert(&role).await?;
            Ok(role)
        }
        .await;
        let subject = match &result {
            Ok(role) => role.name().to_string(),
            Err(_) => id.to_string(),
        };
        let entry = RbacAuditEntry::new(Some(actor), RbacAction::RoleUpdated, Utc::now()).subject(subject);
        self.audited(entry, result).await
    }

    /// Refused while any active user still holds the role.
    #[instrument(skip(self), fields(role_id = %id), err)]
    pub async fn delete_role(&self, id: RoleId, actor: UserId) -> ServiceResult<()> {
        let result: ServiceResult<String> = async {
            let _guard = self.write_lock.lock().await;
            let mut role = load_active(&*self.stores.roles, id, "role").await?;
            let holders = list_active(&*self.stores.users)
                .await?
                .iter()
                .filter(|u| u.has_role(&role.role()))
                .count();
            if holders > 0 {
                return Err(DomainError::conflict(format!(
                    "role '{}' is assigned to {holders} user(s)",
                    role.name()
                ))
                .into());
            }
            role.delete(Some(actor), Utc::now())?;
            self.stores.roles.upsert(&role).await?;
            Ok(role.name().to_string())
        }
        .await;
        let subject = result.as_ref().map_or_else(|_| id.to_string(), Clone::clone);
        let entry = RbacAuditEntry::new(Some(actor), RbacAction::RoleDeleted, Utc::now()).subject(subject);
        self.audited(entry, result).await.map(|_| ())
    }

    // ── rbac introspection ──────────────────────────────────────────────────

    pub async fn registry(&self) -> ServiceResult<RbacRegistry> {
        let roles = list_active(&*self.stores.roles).await?;
        Ok(RbacRegistry::build(&roles))
    }

    pub async fn explain(&self, principal: &Principal, required: &Permission) -> ServiceResult<AuthorizationExplanation> {
        let roles = self.role_permissions().await?;
        Ok(explain_authorization(principal, required, |name| {
            roles.get(name).cloned().unwrap_or_default()
        }))
    }

    /// Newest first.
    pub async fn audit_log(&self, page: PageRequest) -> ServiceResult<Page<RbacAuditEntry>> {
        let mut entries = self.stores.rbac_audit.list().await?;
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        Ok(Page::from_vec(entries, page))
    }
}
