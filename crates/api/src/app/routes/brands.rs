use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    routing::{get, post},
    Json, Router,
};

use rentdesk_catalog::BrandInput;
use rentdesk_core::BrandId;
use rentdesk_infra::services::Services;

use crate::app::dto::{self, PageQuery, SearchQuery};
use crate::app::errors::ApiResult;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_brand).get(list_brands))
        .route("/:id", get(get_brand).put(update_brand).delete(delete_brand))
}

pub async fn create_brand(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<BrandInput>,
) -> ApiResult {
    authz::require(&principal, "brands.create")?;
    Ok(dto::created(services.catalog.create_brand(&body, principal.actor()).await?))
}

/// `q` filters by name or code.
pub async fn list_brands(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(page): Query<PageQuery>,
    Query(search): Query<SearchQuery>,
) -> ApiResult {
    authz::require(&principal, "brands.read")?;
    let term = Some(search.q.as_str()).filter(|q| !q.trim().is_empty());
    Ok(dto::ok(services.catalog.list_brands(term, page.request()?).await?))
}

pub async fn get_brand(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&principal, "brands.read")?;
    let id: BrandId = dto::parse_id(&id)?;
    Ok(dto::ok(services.catalog.get_brand(id).await?))
}

pub async fn update_brand(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<BrandInput>,
) -> ApiResult {
    authz::require(&principal, "brands.update")?;
    let id: BrandId = dto::parse_id(&id)?;
    Ok(dto::ok(services.catalog.update_brand(id, &body, principal.actor()).await?))
}

/// Refused while active items still reference the brand.
pub async fn delete_brand(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&principal, "brands.delete")?;
    let id: BrandId = dto::parse_id(&id)?;
    services.catalog.delete_brand(id, principal.actor()).await?;
    Ok(dto::no_content())
}
