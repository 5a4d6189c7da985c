use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    routing::{get, post},
    Json, Router,
};

use rentdesk_auth::{Permission, permissions};
use rentdesk_core::{RoleId, UserId};
use rentdesk_infra::services::{RoleInput, RoleUpdate, Services, UserFilter, UserInput, UserUpdate};

use crate::app::dto::{self, PageQuery, TokenResponse, UserView};
use crate::app::errors::ApiResult;
use crate::authz;
use crate::context::PrincipalContext;

/// Authenticated `/auth` routes; `POST /auth/login` is mounted publicly.
pub fn router() -> Router {
    Router::new()
        .route("/refresh", post(refresh))
        .route("/me", get(me))
        .route("/change-password", post(change_password))
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", get(get_user).patch(update_user).delete(delete_user))
        .route("/users/:id/unlock", post(unlock_user))
        .route("/users/:id/roles/:role", post(assign_role).delete(revoke_role))
        .route("/users/:id/permissions", get(user_permissions))
        .route(
            "/users/:id/permissions/:permission",
            post(grant_permission).delete(revoke_permission),
        )
        .route("/roles", get(list_roles).post(create_role))
        .route("/roles/:id", get(get_role).patch(update_role).delete(delete_role))
        .route("/permissions", get(permission_catalog))
        .route("/rbac/registry", get(registry))
        .route("/rbac/explain", post(explain))
        .route("/rbac/audit", get(audit_log))
}

// ── session ─────────────────────────────────────────────────────────────────

pub async fn login(
    Extension(services): Extension<Arc<Services>>,
    Json(body): Json<dto::LoginRequest>,
) -> ApiResult {
    let result = services.auth.login(&body.username, &body.password).await?;
    Ok(dto::ok(TokenResponse::from(result)))
}

pub async fn refresh(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    let result = services.auth.refresh(principal.user_id()).await?;
    Ok(dto::ok(TokenResponse::from(result)))
}

pub async fn me(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    let user = services.auth.me(principal.user_id()).await?;
    Ok(dto::ok(serde_json::json!({
        "user": UserView::from(&user),
        "permissions": principal.permissions(),
    })))
}

pub async fn change_password(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::ChangePasswordRequest>,
) -> ApiResult {
    services
        .auth
        .change_password(principal.user_id(), &body.current_password, &body.new_password)
        .await?;
    Ok(dto::no_content())
}

// ── users ───────────────────────────────────────────────────────────────────

pub async fn list_users(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<UserFilter>,
) -> ApiResult {
    authz::require(&principal, "users.read")?;
    let users = services.auth.list_users(&filter, page.request()?).await?;
    Ok(dto::ok(dto::map_page(users, UserView::from)))
}

pub async fn create_user(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<UserInput>,
) -> ApiResult {
    authz::require(&principal, "users.create")?;
    let user = services.auth.create_user(&body, principal.user_id()).await?;
    Ok(dto::created(UserView::from(&user)))
}

pub async fn get_user(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let id: UserId = dto::parse_id(&id)?;
    if id != principal.user_id() {
        authz::require(&principal, "users.read")?;
    }
    let user = services.auth.get_user(id).await?;
    Ok(dto::ok(UserView::from(&user)))
}

pub async fn update_user(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<UserUpdate>,
) -> ApiResult {
    authz::require(&principal, "users.update")?;
    let id: UserId = dto::parse_id(&id)?;
    let user = services.auth.update_user(id, &body, principal.user_id()).await?;
    Ok(dto::ok(UserView::from(&user)))
}

pub async fn delete_user(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&principal, "users.delete")?;
    let id: UserId = dto::parse_id(&id)?;
    services.auth.delete_user(id, principal.user_id()).await?;
    Ok(dto::no_content())
}

pub async fn unlock_user(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&principal, "users.unlock")?;
    let id: UserId = dto::parse_id(&id)?;
    let user = services.auth.unlock_user(id, principal.user_id()).await?;
    Ok(dto::ok(UserView::from(&user)))
}

pub async fn assign_role(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, role)): Path<(String, String)>,
) -> ApiResult {
    authz::require(&principal, "roles.assign")?;
    let id: UserId = dto::parse_id(&id)?;
    let user = services.auth.assign_role(id, &role, principal.user_id()).await?;
    Ok(dto::ok(UserView::from(&user)))
}

pub async fn revoke_role(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, role)): Path<(String, String)>,
) -> ApiResult {
    authz::require(&principal, "roles.assign")?;
    let id: UserId = dto::parse_id(&id)?;
    let user = services.auth.revoke_role(id, &role, principal.user_id()).await?;
    Ok(dto::ok(UserView::from(&user)))
}

pub async fn grant_permission(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, permission)): Path<(String, String)>,
) -> ApiResult {
    authz::require(&principal, "users.manage_permissions")?;
    let id: UserId = dto::parse_id(&id)?;
    let user = services
        .auth
        .grant_permission(id, &permission, principal.user_id())
        .await?;
    Ok(dto::ok(UserView::from(&user)))
}

pub async fn revoke_permission(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, permission)): Path<(String, String)>,
) -> ApiResult {
    authz::require(&principal, "users.manage_permissions")?;
    let id: UserId = dto::parse_id(&id)?;
    let user = services
        .auth
        .revoke_permission(id, &permission, principal.user_id())
        .await?;
    Ok(dto::ok(UserView::from(&user)))
}

pub async fn user_permissions(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let id: UserId = dto::parse_id(&id)?;
    if id != principal.user_id() {
        authz::require(&principal, "users.read")?;
    }
    let permissions = services.auth.user_permissions(id).await?;
    Ok(dto::ok(serde_json::json!({
        "user_id": id,
        "permissions": permissions,
    })))
}

// ── roles ───────────────────────────────────────────────────────────────────

pub async fn list_roles(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(page): Query<PageQuery>,
) -> ApiResult {
    authz::require(&principal, "roles.read")?;
    Ok(dto::ok(services.auth.list_roles(page.request()?).await?))
}

pub async fn create_role(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<RoleInput>,
) -> ApiResult {
    authz::require(&principal, "roles.create")?;
    let role = services.auth.create_role(&body, principal.user_id()).await?;
    Ok(dto::created(role))
}

pub async fn get_role(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&principal, "roles.read")?;
    let id: RoleId = dto::parse_id(&id)?;
    Ok(dto::ok(services.auth.get_role(id).await?))
}

pub async fn update_role(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<RoleUpdate>,
) -> ApiResult {
    authz::require(&principal, "roles.update")?;
    let id: RoleId = dto::parse_id(&id)?;
    Ok(dto::ok(services.auth.update_role(id, &body, principal.user_id()).await?))
}

pub async fn delete_role(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&principal, "roles.delete")?;
    let id: RoleId = dto::parse_id(&id)?;
    services.auth.delete_role(id, principal.user_id()).await?;
    Ok(dto::no_content())
}

// ── rbac introspection ──────────────────────────────────────────────────────

pub async fn permission_catalog(Extension(principal): Extension<PrincipalContext>) -> ApiResult {
    authz::require(&principal, "roles.read")?;
    Ok(dto::ok(permissions::CATALOG))
}

pub async fn registry(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    authz::require(&principal, "roles.read")?;
    Ok(dto::ok(services.auth.registry().await?))
}

/// Explains the caller's own token by default; explaining another user
/// resolves that user's current grants.
pub async fn explain(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::ExplainRequest>,
) -> ApiResult {
    let subject = match body.user_id {
        Some(id) if id != principal.user_id() => {
            authz::require_all(&principal, &["users.read", "roles.read"])?;
            services.auth.principal_for(id).await?
        }
        _ => principal.principal().clone(),
    };
    let required = Permission::new(body.permission.trim().to_string());
    Ok(dto::ok(services.auth.explain(&subject, &required).await?))
}

pub async fn audit_log(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(page): Query<PageQuery>,
) -> ApiResult {
    authz::require(&principal, "audit.read")?;
    Ok(dto::ok(services.auth.audit_log(page.request()?).await?))
}
