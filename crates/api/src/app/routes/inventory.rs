use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    routing::{get, post},
    Json, Router,
};

use rentdesk_core::{ItemId, StockLevelId, UnitId};
use rentdesk_infra::services::{ItemFilter, Services, StockFilter, UnitFilter};
use rentdesk_inventory::{ItemInput, StockInput, UnitInput};

use crate::app::dto::{self, PageQuery};
use crate::app::errors::ApiResult;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        // items
        .route("/items", post(create_item).get(list_items))
        .route("/items/code/:code", get(item_by_code))
        .route("/items/rentable", get(rentable_items))
        .route("/items/sellable", get(sellable_items))
        .route("/items/:id", get(get_item).put(update_item).delete(delete_item))
        // units
        .route("/units", post(create_unit).get(list_units))
        .route("/units/available", get(available_units))
        .route("/units/:id", get(get_unit).patch(update_unit).delete(delete_unit))
        .route("/units/:id/rent", post(rent_unit))
        .route("/units/:id/return", post(return_unit))
        .route("/units/:id/sell", post(sell_unit))
        .route("/units/:id/maintenance", post(send_to_maintenance))
        .route("/units/:id/maintenance-complete", post(complete_maintenance))
        .route("/units/:id/damage", post(mark_damaged))
        .route("/units/:id/retire", post(retire_unit))
        // stock
        .route("/stock", post(create_stock).get(list_stock))
        .route("/stock/low", get(low_stock))
        .route("/stock/:id", get(get_stock).put(update_stock).delete(delete_stock))
        .route("/stock/:id/adjust", post(adjust_stock))
        .route("/stock/:id/reserve", post(reserve_stock))
        .route("/stock/:id/release", post(release_stock))
        .route("/stock/:id/receive", post(receive_stock))
}

// ── items ───────────────────────────────────────────────────────────────────

pub async fn create_item(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<ItemInput>,
) -> ApiResult {
    authz::require(&principal, "inventory.create")?;
    Ok(dto::created(services.inventory.create_item(&body, principal.actor()).await?))
}

pub async fn list_items(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<ItemFilter>,
) -> ApiResult {
    authz::require(&principal, "inventory.read")?;
    Ok(dto::ok(services.inventory.list_items(&filter, page.request()?).await?))
}

pub async fn item_by_code(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(code): Path<String>,
) -> ApiResult {
    authz::require(&principal, "inventory.read")?;
    Ok(dto::ok(services.inventory.item_by_code(&code).await?))
}

pub async fn rentable_items(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    authz::require(&principal, "inventory.read")?;
    Ok(dto::ok(services.inventory.rentable_items().await?))
}

pub async fn sellable_items(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    authz::require(&principal, "inventory.read")?;
    Ok(dto::ok(services.inventory.sellable_items().await?))
}

pub async fn get_item(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&principal, "inventory.read")?;
    let id: ItemId = dto::parse_id(&id)?;
    Ok(dto::ok(services.inventory.get_item(id).await?))
}

pub async fn update_item(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<ItemInput>,
) -> ApiResult {
    authz::require(&principal, "inventory.update")?;
    let id: ItemId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services.inventory.update_item(id, &body, principal.actor()).await?,
    ))
}

pub async fn delete_item(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&principal, "inventory.delete")?;
    let id: ItemId = dto::parse_id(&id)?;
    services.inventory.delete_item(id, principal.actor()).await?;
    Ok(dto::no_content())
}

// ── units ───────────────────────────────────────────────────────────────────

pub async fn create_unit(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<UnitInput>,
) -> ApiResult {
    authz::require(&principal, "inventory.create")?;
    Ok(dto::created(services.inventory.create_unit(&body, principal.actor()).await?))
}

pub async fn list_units(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<UnitFilter>,
) -> ApiResult {
    authz::require(&principal, "inventory.read")?;
    Ok(dto::ok(services.inventory.list_units(&filter, page.request()?).await?))
}

pub async fn available_units(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::AvailableUnitsQuery>,
) -> ApiResult {
    authz::require(&principal, "inventory.read")?;
    Ok(dto::ok(services.inventory.available_units(query.item_id).await?))
}

pub async fn get_unit(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&principal, "inventory.read")?;
    let id: UnitId = dto::parse_id(&id)?;
    Ok(dto::ok(services.inventory.get_unit(id).await?))
}

/// Moves a unit between locations and edits its notes.
pub async fn update_unit(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateUnitRequest>,
) -> ApiResult {
    authz::require(&principal, "inventory.update")?;
    let id: UnitId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services
            .inventory
            .update_unit(id, body.location_id, body.notes.as_deref(), principal.actor())
            .await?,
    ))
}

pub async fn delete_unit(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&principal, "inventory.delete")?;
    let id: UnitId = dto::parse_id(&id)?;
    services.inventory.delete_unit(id, principal.actor()).await?;
    Ok(dto::no_content())
}

pub async fn rent_unit(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RentUnitRequest>,
) -> ApiResult {
    authz::require(&principal, "inventory.update")?;
    let id: UnitId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services
            .inventory
            .rent_unit(id, body.rental_days, principal.actor())
            .await?,
    ))
}

pub async fn return_unit(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReturnUnitRequest>,
) -> ApiResult {
    authz::require(&principal, "inventory.update")?;
    let id: UnitId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services
            .inventory
            .return_unit(id, body.condition, principal.actor())
            .await?,
    ))
}

pub async fn sell_unit(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&principal, "inventory.update")?;
    let id: UnitId = dto::parse_id(&id)?;
    Ok(dto::ok(services.inventory.sell_unit(id, principal.actor()).await?))
}

pub async fn send_to_maintenance(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&principal, "inventory.update")?;
    let id: UnitId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services
            .inventory
            .send_unit_to_maintenance(id, principal.actor())
            .await?,
    ))
}

pub async fn complete_maintenance(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::MaintenanceCompleteRequest>,
) -> ApiResult {
    authz::require(&principal, "inventory.update")?;
    let id: UnitId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services
            .inventory
            .complete_unit_maintenance(id, body.condition, principal.actor())
            .await?,
    ))
}

pub async fn mark_damaged(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::DamageNotesRequest>,
) -> ApiResult {
    authz::require(&principal, "inventory.update")?;
    let id: UnitId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services
            .inventory
            .mark_unit_damaged(id, body.notes.as_deref(), principal.actor())
            .await?,
    ))
}

pub async fn retire_unit(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&principal, "inventory.update")?;
    let id: UnitId = dto::parse_id(&id)?;
    Ok(dto::ok(services.inventory.retire_unit(id, principal.actor()).await?))
}

// ── stock ───────────────────────────────────────────────────────────────────

pub async fn create_stock(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<StockInput>,
) -> ApiResult {
    authz::require(&principal, "inventory.create")?;
    Ok(dto::created(services.inventory.create_stock(&body, principal.actor()).await?))
}

pub async fn list_stock(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<StockFilter>,
) -> ApiResult {
    authz::require(&principal, "inventory.read")?;
    Ok(dto::ok(services.inventory.list_stock(&filter, page.request()?).await?))
}

pub async fn low_stock(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    authz::require(&principal, "inventory.read")?;
    Ok(dto::ok(services.inventory.low_stock().await?))
}

pub async fn get_stock(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&principal, "inventory.read")?;
    let id: StockLevelId = dto::parse_id(&id)?;
    Ok(dto::ok(services.inventory.get_stock(id).await?))
}

pub async fn update_stock(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<StockInput>,
) -> ApiResult {
    authz::require(&principal, "inventory.update")?;
    let id: StockLevelId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services.inventory.update_stock(id, &body, principal.actor()).await?,
    ))
}

pub async fn delete_stock(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&principal, "inventory.delete")?;
    let id: StockLevelId = dto::parse_id(&id)?;
    services.inventory.delete_stock(id, principal.actor()).await?;
    Ok(dto::no_content())
}

pub async fn adjust_stock(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AdjustStockRequest>,
) -> ApiResult {
    authz::require(&principal, "inventory.adjust")?;
    let id: StockLevelId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services
            .inventory
            .adjust_stock(id, body.delta, &body.reason, principal.actor())
            .await?,
    ))
}

pub async fn reserve_stock(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::QuantityRequest>,
) -> ApiResult {
    authz::require(&principal, "inventory.adjust")?;
    let id: StockLevelId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services
            .inventory
            .reserve_stock(id, body.quantity, principal.actor())
            .await?,
    ))
}

pub async fn release_stock(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::QuantityRequest>,
) -> ApiResult {
    authz::require(&principal, "inventory.adjust")?;
    let id: StockLevelId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services
            .inventory
            .release_stock(id, body.quantity, principal.actor())
            .await?,
    ))
}

pub async fn receive_stock(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::QuantityRequest>,
) -> ApiResult {
    authz::require(&principal, "inventory.adjust")?;
    let id: StockLevelId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services
            .inventory
            .receive_stock(id, body.quantity, principal.actor())
            .await?,
    ))
}
