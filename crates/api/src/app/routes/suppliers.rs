use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    routing::{get, post, put},
    Json, Router,
};

use rentdesk_core::SupplierId;
use rentdesk_infra::services::Services;
use rentdesk_parties::{SupplierFilter, SupplierInput};

use crate::app::dto::{self, PageQuery, SearchQuery};
use crate::app::errors::ApiResult;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_supplier).get(list_suppliers))
        .route("/code/:code", get(supplier_by_code))
        .route("/search", get(search_suppliers))
        .route("/stats", get(supplier_statistics))
        .route(
            "/:id",
            get(get_supplier).put(update_supplier).delete(delete_supplier),
        )
        .route("/:id/status", put(set_status))
        .route("/:id/performance", put(set_performance))
}

pub async fn create_supplier(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<SupplierInput>,
) -> ApiResult {
    authz::require(&principal, "suppliers.create")?;
    Ok(dto::created(
        services.parties.create_supplier(&body, principal.actor()).await?,
    ))
}

pub async fn list_suppliers(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<SupplierFilter>,
) -> ApiResult {
    authz::require(&principal, "suppliers.read")?;
    Ok(dto::ok(services.parties.list_suppliers(&filter, page.request()?).await?))
}

pub async fn supplier_by_code(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(code): Path<String>,
) -> ApiResult {
    authz::require(&principal, "suppliers.read")?;
    Ok(dto::ok(services.parties.supplier_by_code(&code).await?))
}

pub async fn search_suppliers(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(page): Query<PageQuery>,
    Query(search): Query<SearchQuery>,
) -> ApiResult {
    authz::require(&principal, "suppliers.read")?;
    Ok(dto::ok(
        services.parties.search_suppliers(&search.q, page.request()?).await?,
    ))
}

pub async fn supplier_statistics(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    authz::require(&principal, "suppliers.read")?;
    Ok(dto::ok(services.parties.supplier_statistics().await?))
}

pub async fn get_supplier(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&principal, "suppliers.read")?;
    let id: SupplierId = dto::parse_id(&id)?;
    Ok(dto::ok(services.parties.get_supplier(id).await?))
}

pub async fn update_supplier(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<SupplierInput>,
) -> ApiResult {
    authz::require(&principal, "suppliers.update")?;
    let id: SupplierId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services.parties.update_supplier(id, &body, principal.actor()).await?,
    ))
}

pub async fn delete_supplier(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&principal, "suppliers.delete")?;
    let id: SupplierId = dto::parse_id(&id)?;
    services.parties.delete_supplier(id, principal.actor()).await?;
    Ok(dto::no_content())
}

pub async fn set_status(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SupplierStatusRequest>,
) -> ApiResult {
    authz::require(&principal, "suppliers.update")?;
    let id: SupplierId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services
            .parties
            .set_supplier_status(id, body.status, principal.actor())
            .await?,
    ))
}

pub async fn set_performance(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::PerformanceRequest>,
) -> ApiResult {
    authz::require(&principal, "suppliers.update")?;
    let id: SupplierId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services
            .parties
            .set_supplier_performance(id, body.quality_rating, body.delivery_rating, principal.actor())
            .await?,
    ))
}
