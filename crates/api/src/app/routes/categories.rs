use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    routing::{get, post},
    Json, Router,
};

use rentdesk_catalog::{CategoryImportRow, CategoryUpdate, CheckedOperation, NewCategory};
use rentdesk_core::CategoryId;
use rentdesk_infra::services::{CategoryFilter, Services};

use crate::app::dto::{self, PageQuery};
use crate::app::errors::ApiResult;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_category).get(list_categories))
        .route("/tree", get(category_tree))
        .route("/roots", get(root_categories))
        .route("/leaves", get(leaf_categories))
        .route("/stats", get(category_statistics))
        .route("/by-path", get(category_by_path))
        .route("/bulk", post(bulk_categories))
        .route("/export", get(export_categories))
        .route("/import", post(import_categories))
        .route(
            "/:id",
            get(get_category).patch(update_category).delete(delete_category),
        )
        .route("/:id/move", post(move_category))
        .route("/:id/hierarchy", get(category_hierarchy))
        .route("/:id/children", get(child_categories))
        .route("/:id/validate/:operation", get(validate_operation))
}

pub async fn create_category(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<NewCategory>,
) -> ApiResult {
    authz::require(&principal, "categories.create")?;
    let category = services.catalog.create_category(body, principal.actor()).await?;
    Ok(dto::created(category))
}

pub async fn list_categories(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<CategoryFilter>,
) -> ApiResult {
    authz::require(&principal, "categories.read")?;
    Ok(dto::ok(services.catalog.list_categories(&filter, page.request()?).await?))
}

pub async fn category_tree(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::TreeQuery>,
) -> ApiResult {
    authz::require(&principal, "categories.read")?;
    Ok(dto::ok(services.catalog.category_tree(query.include_inactive).await?))
}

pub async fn root_categories(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    authz::require(&principal, "categories.read")?;
    Ok(dto::ok(services.catalog.root_categories().await?))
}

pub async fn leaf_categories(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    authz::require(&principal, "categories.read")?;
    Ok(dto::ok(services.catalog.leaf_categories().await?))
}

pub async fn category_statistics(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    authz::require(&principal, "categories.read")?;
    Ok(dto::ok(services.catalog.category_statistics().await?))
}

pub async fn category_by_path(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::PathQuery>,
) -> ApiResult {
    authz::require(&principal, "categories.read")?;
    Ok(dto::ok(services.catalog.category_by_path(&query.path).await?))
}

pub async fn get_category(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&principal, "categories.read")?;
    let id: CategoryId = dto::parse_id(&id)?;
    Ok(dto::ok(services.catalog.get_category(id).await?))
}

pub async fn update_category(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<CategoryUpdate>,
) -> ApiResult {
    authz::require(&principal, "categories.update")?;
    let id: CategoryId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services.catalog.update_category(id, body, principal.actor()).await?,
    ))
}

pub async fn delete_category(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&principal, "categories.delete")?;
    let id: CategoryId = dto::parse_id(&id)?;
    services.catalog.delete_category(id, principal.actor()).await?;
    Ok(dto::no_content())
}

pub async fn move_category(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::MoveCategoryRequest>,
) -> ApiResult {
    authz::require(&principal, "categories.update")?;
    let id: CategoryId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services
            .catalog
            .move_category(id, body.parent_id, principal.actor())
            .await?,
    ))
}

pub async fn category_hierarchy(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&principal, "categories.read")?;
    let id: CategoryId = dto::parse_id(&id)?;
    Ok(dto::ok(services.catalog.category_lineage(id).await?))
}

pub async fn child_categories(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&principal, "categories.read")?;
    let id: CategoryId = dto::parse_id(&id)?;
    Ok(dto::ok(services.catalog.child_categories(id).await?))
}

pub async fn validate_operation(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, operation)): Path<(String, CheckedOperation)>,
) -> ApiResult {
    authz::require(&principal, "categories.read")?;
    let id: CategoryId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services.catalog.validate_category_operation(id, operation).await?,
    ))
}

pub async fn bulk_categories(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::BulkCategoryRequest>,
) -> ApiResult {
    authz::require(&principal, "categories.update")?;
    Ok(dto::ok(
        services
            .catalog
            .bulk_categories(body.operation, &body.category_ids, principal.actor())
            .await?,
    ))
}

pub async fn export_categories(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    authz::require(&principal, "categories.read")?;
    Ok(dto::ok(services.catalog.export_categories().await?))
}

pub async fn import_categories(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(rows): Json<Vec<CategoryImportRow>>,
) -> ApiResult {
    authz::require(&principal, "categories.create")?;
    Ok(dto::ok(
        services.catalog.import_categories(rows, principal.actor()).await?,
    ))
}
