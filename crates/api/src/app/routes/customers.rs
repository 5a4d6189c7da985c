use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    routing::{get, post, put},
    Json, Router,
};

use rentdesk_core::CustomerId;
use rentdesk_infra::services::Services;
use rentdesk_parties::{CustomerFilter, NewCustomer};

use crate::app::dto::{self, IdsRequest, PageQuery, SearchQuery};
use crate::app::errors::ApiResult;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_customer).get(list_customers))
        .route("/code/:code", get(customer_by_code))
        .route("/search", get(search_customers))
        .route("/stats", get(customer_statistics))
        .route("/bulk/activate", post(bulk_activate))
        .route("/bulk/deactivate", post(bulk_deactivate))
        .route(
            "/:id",
            get(get_customer).patch(update_customer).delete(delete_customer),
        )
        .route("/:id/blacklist", post(blacklist_customer))
        .route("/:id/clear-blacklist", post(clear_blacklist))
        .route("/:id/warning", post(warn_customer))
        .route("/:id/status", put(set_status))
        .route("/:id/tier", put(set_tier))
        .route("/:id/credit-limit", put(set_credit_limit))
}

pub async fn create_customer(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<NewCustomer>,
) -> ApiResult {
    authz::require(&principal, "customers.create")?;
    Ok(dto::created(
        services.parties.create_customer(body, principal.actor()).await?,
    ))
}

pub async fn list_customers(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<CustomerFilter>,
) -> ApiResult {
    authz::require(&principal, "customers.read")?;
    Ok(dto::ok(services.parties.list_customers(&filter, page.request()?).await?))
}

pub async fn customer_by_code(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(code): Path<String>,
) -> ApiResult {
    authz::require(&principal, "customers.read")?;
    Ok(dto::ok(services.parties.customer_by_code(&code).await?))
}

pub async fn search_customers(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(page): Query<PageQuery>,
    Query(search): Query<SearchQuery>,
) -> ApiResult {
    authz::require(&principal, "customers.read")?;
    Ok(dto::ok(
        services.parties.search_customers(&search.q, page.request()?).await?,
    ))
}

pub async fn customer_statistics(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    authz::require(&principal, "customers.read")?;
    Ok(dto::ok(services.parties.customer_statistics().await?))
}

pub async fn get_customer(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&principal, "customers.read")?;
    let id: CustomerId = dto::parse_id(&id)?;
    Ok(dto::ok(services.parties.get_customer(id).await?))
}

pub async fn update_customer(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateCustomerRequest>,
) -> ApiResult {
    authz::require(&principal, "customers.update")?;
    let id: CustomerId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services
            .parties
            .update_customer(id, body.update, body.contact, principal.actor())
            .await?,
    ))
}

pub async fn delete_customer(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&principal, "customers.delete")?;
    let id: CustomerId = dto::parse_id(&id)?;
    services.parties.delete_customer(id, principal.actor()).await?;
    Ok(dto::no_content())
}

pub async fn blacklist_customer(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReasonRequest>,
) -> ApiResult {
    authz::require(&principal, "customers.blacklist")?;
    let id: CustomerId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services
            .parties
            .blacklist_customer(id, &body.reason, principal.actor())
            .await?,
    ))
}

pub async fn clear_blacklist(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&principal, "customers.blacklist")?;
    let id: CustomerId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services.parties.clear_customer_blacklist(id, principal.actor()).await?,
    ))
}

pub async fn warn_customer(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReasonRequest>,
) -> ApiResult {
    authz::require(&principal, "customers.blacklist")?;
    let id: CustomerId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services
            .parties
            .warn_customer(id, &body.reason, principal.actor())
            .await?,
    ))
}

pub async fn set_status(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CustomerStatusRequest>,
) -> ApiResult {
    authz::require(&principal, "customers.update")?;
    let id: CustomerId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services
            .parties
            .set_customer_status(id, body.status, principal.actor())
            .await?,
    ))
}

pub async fn set_tier(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CustomerTierRequest>,
) -> ApiResult {
    authz::require(&principal, "customers.credit")?;
    let id: CustomerId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services
            .parties
            .set_customer_tier(id, body.tier, principal.actor())
            .await?,
    ))
}

pub async fn set_credit_limit(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CreditLimitRequest>,
) -> ApiResult {
    authz::require(&principal, "customers.credit")?;
    let id: CustomerId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services
            .parties
            .set_customer_credit_limit(id, body.credit_limit, principal.actor())
            .await?,
    ))
}

pub async fn bulk_activate(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<IdsRequest<CustomerId>>,
) -> ApiResult {
    authz::require(&principal, "customers.update")?;
    Ok(dto::ok(
        services
            .parties
            .bulk_set_customers_active(&body.ids, true, principal.actor())
            .await?,
    ))
}

pub async fn bulk_deactivate(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<IdsRequest<CustomerId>>,
) -> ApiResult {
    authz::require(&principal, "customers.update")?;
    Ok(dto::ok(
        services
            .parties
            .bulk_set_customers_active(&body.ids, false, principal.actor())
            .await?,
    ))
}
