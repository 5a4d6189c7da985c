use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::json;

use rentdesk_core::{ReturnId, ReturnLineId};
use rentdesk_infra::services::{ReturnFilter, Services};
use rentdesk_transactions::{ReturnInput, ReturnLineInput, ReturnLineUpdate, ReturnStatus, ReturnUpdate};

use crate::app::dto::{self, PageQuery, TodayQuery};
use crate::app::errors::{ApiError, ApiResult};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/returns", post(create_return).get(list_returns))
        .route(
            "/returns/:id",
            get(get_return).patch(update_return).delete(delete_return),
        )
        .route("/returns/:id/status", post(change_status))
        .route("/returns/:id/finalize", post(finalize_return))
        .route("/returns/:id/cancel", post(cancel_return))
        .route("/returns/:id/late-fees", post(calculate_late_fees))
        .route("/returns/:id/deposit", post(release_deposit))
        .route("/returns/:id/lines", post(add_line))
        .route("/returns/:id/lines/:line_id", patch(update_line).delete(remove_line))
        .route("/returns/:id/lines/:line_id/status", post(set_line_status))
        .route("/returns/:id/lines/:line_id/damage", post(assess_damage))
        .route("/returns/:id/lines/:line_id/fees", post(set_line_fees))
        .route("/reports/overdue", get(overdue_returns))
        .route("/reports/due-today", get(returns_due_today))
        .route("/reports/pending-inspections", get(pending_inspections))
}

fn line_ids(id: &str, line_id: &str) -> Result<(ReturnId, ReturnLineId), ApiError> {
    Ok((dto::parse_id(id)?, dto::parse_id(line_id)?))
}

// ── returns ─────────────────────────────────────────────────────────────────

pub async fn create_return(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<ReturnInput>,
) -> ApiResult {
    authz::require(&principal, "rentals.create")?;
    Ok(dto::created(services.rentals.create_return(&body, principal.actor()).await?))
}

pub async fn list_returns(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<ReturnFilter>,
) -> ApiResult {
    authz::require(&principal, "rentals.read")?;
    Ok(dto::ok(services.rentals.list_returns(&filter, page.request()?).await?))
}

pub async fn get_return(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&principal, "rentals.read")?;
    let id: ReturnId = dto::parse_id(&id)?;
    Ok(dto::ok(services.rentals.get_return(id).await?))
}

pub async fn update_return(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<ReturnUpdate>,
) -> ApiResult {
    authz::require(&principal, "rentals.update")?;
    let id: ReturnId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services.rentals.update_return(id, &body, principal.actor()).await?,
    ))
}

pub async fn delete_return(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&principal, "rentals.delete")?;
    let id: ReturnId = dto::parse_id(&id)?;
    services.rentals.delete_return(id, principal.actor()).await?;
    Ok(dto::no_content())
}

/// Moving to `COMPLETED` or `CANCELLED` closes the return and needs
/// `rentals.finalize`.
pub async fn change_status(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReturnStatusRequest>,
) -> ApiResult {
    if matches!(body.status, ReturnStatus::Completed | ReturnStatus::Cancelled) {
        authz::require_all(&principal, &["rentals.update", "rentals.finalize"])?;
    } else {
        authz::require(&principal, "rentals.update")?;
    }
    let id: ReturnId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services
            .rentals
            .change_status(id, body.status, principal.actor())
            .await?,
    ))
}

pub async fn finalize_return(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&principal, "rentals.finalize")?;
    let id: ReturnId = dto::parse_id(&id)?;
    Ok(dto::ok(services.rentals.finalize(id, principal.actor()).await?))
}

pub async fn cancel_return(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::OptionalReasonRequest>,
) -> ApiResult {
    authz::require(&principal, "rentals.finalize")?;
    let id: ReturnId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services
            .rentals
            .cancel_return(id, body.reason.as_deref(), principal.actor())
            .await?,
    ))
}

pub async fn calculate_late_fees(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::LateFeeRequest>,
) -> ApiResult {
    authz::require(&principal, "rentals.update")?;
    let id: ReturnId = dto::parse_id(&id)?;
    let (ret, late_fees) = services
        .rentals
        .calculate_late_fees(id, body.daily_rate, principal.actor())
        .await?;
    Ok(dto::ok(json!({ "return": ret, "late_fees": late_fees })))
}

pub async fn release_deposit(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::DepositRequest>,
) -> ApiResult {
    authz::require(&principal, "rentals.update")?;
    let id: ReturnId = dto::parse_id(&id)?;
    let (ret, refund) = services
        .rentals
        .release_deposit(id, body.deposit, principal.actor())
        .await?;
    Ok(dto::ok(json!({ "return": ret, "deposit_refund": refund })))
}

// ── lines ───────────────────────────────────────────────────────────────────

pub async fn add_line(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<ReturnLineInput>,
) -> ApiResult {
    authz::require(&principal, "rentals.update")?;
    let id: ReturnId = dto::parse_id(&id)?;
    Ok(dto::created(services.rentals.add_line(id, &body, principal.actor()).await?))
}

pub async fn update_line(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, line_id)): Path<(String, String)>,
    Json(body): Json<ReturnLineUpdate>,
) -> ApiResult {
    authz::require(&principal, "rentals.update")?;
    let (id, line_id) = line_ids(&id, &line_id)?;
    Ok(dto::ok(
        services
            .rentals
            .update_line(id, line_id, &body, principal.actor())
            .await?,
    ))
}

pub async fn remove_line(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, line_id)): Path<(String, String)>,
) -> ApiResult {
    authz::require(&principal, "rentals.update")?;
    let (id, line_id) = line_ids(&id, &line_id)?;
    Ok(dto::ok(
        services.rentals.remove_line(id, line_id, principal.actor()).await?,
    ))
}

pub async fn set_line_status(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, line_id)): Path<(String, String)>,
    Json(body): Json<dto::ReturnLineStatusRequest>,
) -> ApiResult {
    authz::require(&principal, "rentals.update")?;
    let (id, line_id) = line_ids(&id, &line_id)?;
    Ok(dto::ok(
        services
            .rentals
            .set_line_status(id, line_id, body.status, principal.actor())
            .await?,
    ))
}

pub async fn assess_damage(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, line_id)): Path<(String, String)>,
    Json(body): Json<dto::DamageAssessmentRequest>,
) -> ApiResult {
    authz::require(&principal, "rentals.update")?;
    let (id, line_id) = line_ids(&id, &line_id)?;
    Ok(dto::ok(
        services
            .rentals
            .assess_damage(
                id,
                line_id,
                body.damage_level,
                body.estimated_cost,
                body.description.as_deref(),
                principal.actor(),
            )
            .await?,
    ))
}

pub async fn set_line_fees(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, line_id)): Path<(String, String)>,
    Json(body): Json<dto::LineFeesRequest>,
) -> ApiResult {
    authz::require(&principal, "rentals.update")?;
    let (id, line_id) = line_ids(&id, &line_id)?;
    Ok(dto::ok(
        services
            .rentals
            .set_line_fees(id, line_id, body.late_fee, body.damage_fee, principal.actor())
            .await?,
    ))
}

// ── reports ─────────────────────────────────────────────────────────────────

pub async fn overdue_returns(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(today): Query<TodayQuery>,
) -> ApiResult {
    authz::require(&principal, "rentals.read")?;
    Ok(dto::ok(services.rentals.overdue_returns(today.resolve()).await?))
}

pub async fn returns_due_today(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(today): Query<TodayQuery>,
) -> ApiResult {
    authz::require(&principal, "rentals.read")?;
    Ok(dto::ok(services.rentals.returns_due_today(today.resolve()).await?))
}

pub async fn pending_inspections(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    authz::require(&principal, "rentals.read")?;
    Ok(dto::ok(services.rentals.pending_inspections().await?))
}
