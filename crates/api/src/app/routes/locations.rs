use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    routing::{get, post},
    Json, Router,
};

use rentdesk_catalog::LocationInput;
use rentdesk_core::LocationId;
use rentdesk_infra::services::Services;

use crate::app::dto::{self, PageQuery};
use crate::app::errors::ApiResult;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_location).get(list_locations))
        .route(
            "/:id",
            get(get_location).put(update_location).delete(delete_location),
        )
        .route("/:id/manager", post(assign_manager).delete(clear_manager))
}

pub async fn create_location(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<LocationInput>,
) -> ApiResult {
    authz::require(&principal, "locations.create")?;
    Ok(dto::created(
        services.catalog.create_location(&body, principal.actor()).await?,
    ))
}

pub async fn list_locations(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(page): Query<PageQuery>,
) -> ApiResult {
    authz::require(&principal, "locations.read")?;
    Ok(dto::ok(services.catalog.list_locations(page.request()?).await?))
}

pub async fn get_location(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&principal, "locations.read")?;
    let id: LocationId = dto::parse_id(&id)?;
    Ok(dto::ok(services.catalog.get_location(id).await?))
}

pub async fn update_location(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<LocationInput>,
) -> ApiResult {
    authz::require(&principal, "locations.update")?;
    let id: LocationId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services.catalog.update_location(id, &body, principal.actor()).await?,
    ))
}

pub async fn delete_location(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&principal, "locations.delete")?;
    let id: LocationId = dto::parse_id(&id)?;
    services.catalog.delete_location(id, principal.actor()).await?;
    Ok(dto::no_content())
}

pub async fn assign_manager(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ManagerRequest>,
) -> ApiResult {
    authz::require(&principal, "locations.update")?;
    let id: LocationId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services
            .catalog
            .set_location_manager(id, Some(body.manager_id), principal.actor())
            .await?,
    ))
}

pub async fn clear_manager(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&principal, "locations.update")?;
    let id: LocationId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services.catalog.set_location_manager(id, None, principal.actor()).await?,
    ))
}
