use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use rentdesk_infra::services::Services;
use rentdesk_system::{NewSetting, Setting, SettingFilter, SettingView};

use crate::app::dto::{self, SettingValueRequest};
use crate::app::errors::ApiResult;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/info", get(system_info))
        .route("/settings", get(list_settings).post(create_setting))
        .route("/settings/initialize", post(initialize_settings))
        .route(
            "/settings/:key",
            get(get_setting).put(update_setting).delete(delete_setting),
        )
        .route("/settings/:key/value", get(setting_value))
        .route("/settings/:key/reset", post(reset_setting))
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn whoami(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    Json(json!({
        "user_id": principal.user_id().to_string(),
        "username": principal.username(),
        "roles": principal.roles().iter().map(|r| r.as_str()).collect::<Vec<_>>(),
        "permissions": principal.permissions().iter().map(|p| p.as_str()).collect::<Vec<_>>(),
    }))
}

fn views(settings: &[Setting]) -> Vec<SettingView> {
    settings.iter().map(Setting::view).collect()
}

pub async fn system_info(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    authz::require(&principal, "system.read")?;
    Ok(dto::ok(services.system.system_info().await?))
}

/// `category` narrows to one category; `include_system=false` hides
/// read-only system settings.
pub async fn list_settings(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(filter): Query<SettingFilter>,
) -> ApiResult {
    authz::require(&principal, "system.read")?;
    Ok(dto::ok(views(&services.system.list_settings(&filter).await?)))
}

pub async fn get_setting(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(key): Path<String>,
) -> ApiResult {
    authz::require(&principal, "system.read")?;
    Ok(dto::ok(services.system.get_setting(&key).await?.view()))
}

/// Unmasked typed value. Sensitive settings also need `system.manage`.
pub async fn setting_value(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(key): Path<String>,
) -> ApiResult {
    authz::require(&principal, "system.read")?;
    let setting = services.system.get_setting(&key).await?;
    if setting.is_sensitive() {
        authz::require(&principal, "system.manage")?;
    }
    Ok(dto::ok(json!({
        "key": setting.key(),
        "value": setting.typed_value()?,
    })))
}

pub async fn create_setting(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<NewSetting>,
) -> ApiResult {
    authz::require(&principal, "system.manage")?;
    Ok(dto::created(services.system.create_setting(&body, principal.actor()).await?.view()))
}

pub async fn update_setting(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(key): Path<String>,
    Json(body): Json<SettingValueRequest>,
) -> ApiResult {
    authz::require(&principal, "system.update")?;
    let setting = services
        .system
        .update_setting(&key, &body.value, principal.actor())
        .await?;
    Ok(dto::ok(setting.view()))
}

pub async fn reset_setting(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(key): Path<String>,
) -> ApiResult {
    authz::require(&principal, "system.update")?;
    Ok(dto::ok(services.system.reset_setting(&key, principal.actor()).await?.view()))
}

pub async fn delete_setting(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(key): Path<String>,
) -> ApiResult {
    authz::require(&principal, "system.manage")?;
    services.system.delete_setting(&key, principal.actor()).await?;
    Ok(dto::no_content())
}

/// Idempotent; returns only the settings created by this call.
pub async fn initialize_settings(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    authz::require(&principal, "system.manage")?;
    let created = services.system.initialize_default_settings(principal.actor()).await?;
    Ok(dto::ok(views(&created)))
}
