use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    routing::{get, patch, post},
    Json, Router,
};

use rentdesk_core::{LineId, TransactionId};
use rentdesk_infra::services::{Services, TransactionFilter};
use rentdesk_transactions::{LineInput, TransactionInput, TransactionStatus, TransactionUpdate};

use crate::app::dto::{self, PageQuery, TodayQuery};
use crate::app::errors::{ApiError, ApiResult};
use crate::authz;
use crate::context::PrincipalContext;

const DEFAULT_DUE_WINDOW_DAYS: u32 = 7;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_transaction).get(list_transactions))
        .route("/number/:number", get(transaction_by_number))
        .route("/reports/summary", get(summary_report))
        .route("/reports/overdue", get(overdue_report))
        .route("/reports/outstanding", get(outstanding_report))
        .route("/reports/due-for-return", get(due_for_return_report))
        .route(
            "/:id",
            get(get_transaction).patch(update_transaction).delete(delete_transaction),
        )
        .route("/:id/status", post(change_status))
        .route("/:id/payments", post(apply_payment))
        .route("/:id/refunds", post(refund))
        .route("/:id/cancel", post(cancel))
        .route("/:id/overdue", post(mark_overdue))
        .route("/:id/rental-return", post(complete_rental_return))
        .route("/:id/lines", post(add_line))
        .route("/:id/lines/:line_id", patch(update_line).delete(remove_line))
        .route("/:id/lines/:line_id/discount", post(apply_line_discount))
        .route("/:id/lines/:line_id/returns", post(process_line_return))
        .route("/:id/lines/:line_id/rental-period", post(update_rental_period))
}

fn line_ids(id: &str, line_id: &str) -> Result<(TransactionId, LineId), ApiError> {
    Ok((dto::parse_id(id)?, dto::parse_id(line_id)?))
}

// ── header ──────────────────────────────────────────────────────────────────

pub async fn create_transaction(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<TransactionInput>,
) -> ApiResult {
    authz::require(&principal, "transactions.create")?;
    Ok(dto::created(
        services
            .transactions
            .create_transaction(&body, principal.actor())
            .await?,
    ))
}

pub async fn list_transactions(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<TransactionFilter>,
) -> ApiResult {
    authz::require(&principal, "transactions.read")?;
    Ok(dto::ok(
        services
            .transactions
            .list_transactions(&filter, page.request()?)
            .await?,
    ))
}

pub async fn transaction_by_number(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(number): Path<String>,
) -> ApiResult {
    authz::require(&principal, "transactions.read")?;
    Ok(dto::ok(services.transactions.transaction_by_number(&number).await?))
}

pub async fn get_transaction(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&principal, "transactions.read")?;
    let id: TransactionId = dto::parse_id(&id)?;
    Ok(dto::ok(services.transactions.get_transaction(id).await?))
}

pub async fn update_transaction(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<TransactionUpdate>,
) -> ApiResult {
    authz::require(&principal, "transactions.update")?;
    let id: TransactionId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services
            .transactions
            .update_transaction(id, &body, principal.actor())
            .await?,
    ))
}

pub async fn delete_transaction(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&principal, "transactions.delete")?;
    let id: TransactionId = dto::parse_id(&id)?;
    services.transactions.delete_transaction(id, principal.actor()).await?;
    Ok(dto::no_content())
}

/// `CANCELLED` also needs `transactions.cancel`.
pub async fn change_status(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::TransactionStatusRequest>,
) -> ApiResult {
    if body.status == TransactionStatus::Cancelled {
        authz::require_all(&principal, &["transactions.update", "transactions.cancel"])?;
    } else {
        authz::require(&principal, "transactions.update")?;
    }
    let id: TransactionId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services
            .transactions
            .change_status(id, body.status, principal.actor())
            .await?,
    ))
}

pub async fn apply_payment(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::PaymentRequest>,
) -> ApiResult {
    authz::require(&principal, "transactions.payments")?;
    let id: TransactionId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services
            .transactions
            .apply_payment(id, body.amount, body.method, body.reference.as_deref(), principal.actor())
            .await?,
    ))
}

pub async fn refund(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RefundRequest>,
) -> ApiResult {
    authz::require(&principal, "transactions.refunds")?;
    let id: TransactionId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services
            .transactions
            .refund(id, body.amount, &body.reason, principal.actor())
            .await?,
    ))
}

pub async fn cancel(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::OptionalReasonRequest>,
) -> ApiResult {
    authz::require(&principal, "transactions.cancel")?;
    let id: TransactionId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services
            .transactions
            .cancel(id, body.reason.as_deref(), principal.actor())
            .await?,
    ))
}

pub async fn mark_overdue(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&principal, "transactions.update")?;
    let id: TransactionId = dto::parse_id(&id)?;
    Ok(dto::ok(services.transactions.mark_overdue(id, principal.actor()).await?))
}

pub async fn complete_rental_return(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RentalReturnRequest>,
) -> ApiResult {
    authz::require(&principal, "transactions.update")?;
    let id: TransactionId = dto::parse_id(&id)?;
    Ok(dto::ok(
        services
            .transactions
            .complete_rental_return(id, body.return_date, principal.actor())
            .await?,
    ))
}

// ── lines ───────────────────────────────────────────────────────────────────

pub async fn add_line(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<LineInput>,
) -> ApiResult {
    authz::require(&principal, "transactions.update")?;
    let id: TransactionId = dto::parse_id(&id)?;
    Ok(dto::created(
        services.transactions.add_line(id, &body, principal.actor()).await?,
    ))
}

pub async fn update_line(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, line_id)): Path<(String, String)>,
    Json(body): Json<LineInput>,
) -> ApiResult {
    authz::require(&principal, "transactions.update")?;
    let (id, line_id) = line_ids(&id, &line_id)?;
    Ok(dto::ok(
        services
            .transactions
            .update_line(id, line_id, &body, principal.actor())
            .await?,
    ))
}

pub async fn remove_line(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, line_id)): Path<(String, String)>,
) -> ApiResult {
    authz::require(&principal, "transactions.update")?;
    let (id, line_id) = line_ids(&id, &line_id)?;
    Ok(dto::ok(
        services
            .transactions
            .remove_line(id, line_id, principal.actor())
            .await?,
    ))
}

pub async fn apply_line_discount(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, line_id)): Path<(String, String)>,
    Json(body): Json<dto::DiscountRequest>,
) -> ApiResult {
    authz::require(&principal, "transactions.update")?;
    let (id, line_id) = line_ids(&id, &line_id)?;
    Ok(dto::ok(
        services
            .transactions
            .apply_line_discount(id, line_id, body.percentage, body.amount, principal.actor())
            .await?,
    ))
}

pub async fn process_line_return(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, line_id)): Path<(String, String)>,
    Json(body): Json<dto::LineReturnRequest>,
) -> ApiResult {
    authz::require(&principal, "transactions.update")?;
    let (id, line_id) = line_ids(&id, &line_id)?;
    Ok(dto::ok(
        services
            .transactions
            .process_line_return(
                id,
                line_id,
                body.quantity,
                body.return_date,
                body.reason.as_deref(),
                principal.actor(),
            )
            .await?,
    ))
}

pub async fn update_rental_period(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, line_id)): Path<(String, String)>,
    Json(body): Json<dto::RentalPeriodRequest>,
) -> ApiResult {
    authz::require(&principal, "transactions.update")?;
    let (id, line_id) = line_ids(&id, &line_id)?;
    Ok(dto::ok(
        services
            .transactions
            .update_line_rental_period(id, line_id, body.end_date, principal.actor())
            .await?,
    ))
}

// ── reports ─────────────────────────────────────────────────────────────────

pub async fn summary_report(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(range): Query<dto::DateRangeQuery>,
) -> ApiResult {
    authz::require(&principal, "reports.read")?;
    Ok(dto::ok(services.transactions.summary(range.from, range.to).await?))
}

pub async fn overdue_report(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(today): Query<TodayQuery>,
) -> ApiResult {
    authz::require(&principal, "reports.read")?;
    Ok(dto::ok(services.transactions.overdue(today.resolve()).await?))
}

pub async fn outstanding_report(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    authz::require(&principal, "reports.read")?;
    Ok(dto::ok(services.transactions.outstanding().await?))
}

pub async fn due_for_return_report(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::DueForReturnQuery>,
) -> ApiResult {
    authz::require(&principal, "reports.read")?;
    let today = TodayQuery { today: query.today }.resolve();
    let days_ahead = query.days_ahead.unwrap_or(DEFAULT_DUE_WINDOW_DAYS);
    Ok(dto::ok(
        services
            .transactions
            .rentals_due_for_return(today, days_ahead)
            .await?,
    ))
}
