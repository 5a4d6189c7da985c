use std::str::FromStr;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use rentdesk_auth::{JwtClaims, Permission, Role, User, UserStatus, UserType};
use rentdesk_catalog::BulkOperation;
use rentdesk_core::{
    AuditStamp, BasisPoints, CategoryId, DomainError, Entity, ItemId, LocationId, Money, Page, PageRequest, UserId,
};
use rentdesk_infra::services::LoginResult;
use rentdesk_inventory::UnitCondition;
use rentdesk_parties::{ContactInfo, CustomerStatus, CustomerTier, CustomerUpdate, Rating, SupplierStatus};
use rentdesk_transactions::{DamageLevel, PaymentMethod, ReturnLineStatus, ReturnStatus, TransactionStatus};

use crate::app::errors::ApiError;

// -------------------------
// Responses
// -------------------------

pub fn ok<T: Serialize>(body: T) -> Response {
    (StatusCode::OK, Json(body)).into_response()
}

pub fn created<T: Serialize>(body: T) -> Response {
    (StatusCode::CREATED, Json(body)).into_response()
}

pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Parse a path segment into a typed id.
pub fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse::<T>().map_err(ApiError::from)
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PageQuery {
    pub fn request(&self) -> Result<PageRequest, ApiError> {
        Ok(PageRequest::new(self.page, self.page_size)?)
    }
}

/// Re-wrap a page after mapping its items.
pub fn map_page<T, U>(page: Page<T>, f: impl FnMut(T) -> U) -> Page<U> {
    Page {
        items: page.items.into_iter().map(f).collect(),
        total: page.total,
        page: page.page,
        page_size: page.page_size,
        total_pages: page.total_pages,
        has_next: page.has_next,
        has_prev: page.has_prev,
    }
}

/// Optional `today` override for date-relative reports.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TodayQuery {
    pub today: Option<NaiveDate>,
}

impl TodayQuery {
    pub fn resolve(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }
}

// -------------------------
// Auth / RBAC
// -------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ExplainRequest {
    pub permission: String,
    /// Explain for another user instead of the caller.
    #[serde(default)]
    pub user_id: Option<UserId>,
}

/// A user without credentials.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub status: UserStatus,
    pub user_type: UserType,
    pub is_superuser: bool,
    pub roles: Vec<Role>,
    pub direct_permissions: Vec<Permission>,
    pub last_login: Option<DateTime<Utc>>,
    pub failed_login_attempts: u32,
    pub audit: AuditStamp,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: *Entity::id(user),
            username: user.username().to_string(),
            email: user.email().to_string(),
            first_name: user.first_name().to_string(),
            last_name: user.last_name().to_string(),
            full_name: user.full_name(),
            phone: user.phone().map(str::to_string),
            status: user.status(),
            user_type: user.user_type(),
            is_superuser: user.is_superuser(),
            roles: user.roles().cloned().collect(),
            direct_permissions: user.direct_permissions().cloned().collect(),
            last_login: user.last_login(),
            failed_login_attempts: user.failed_login_attempts(),
            audit: user.audit().clone(),
        }
    }
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self::from(&user)
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
    pub user: UserView,
}

impl From<LoginResult> for TokenResponse {
    fn from(result: LoginResult) -> Self {
        let JwtClaims { roles, permissions, .. } = result.claims;
        Self {
            access_token: result.access_token,
            token_type: "Bearer",
            expires_at: result.expires_at,
            roles,
            permissions,
            user: UserView::from(&result.user),
        }
    }
}

// -------------------------
// Catalog
// -------------------------

#[derive(Debug, Deserialize)]
pub struct MoveCategoryRequest {
    #[serde(default)]
    pub parent_id: Option<CategoryId>,
}

#[derive(Debug, Deserialize)]
pub struct BulkCategoryRequest {
    pub operation: BulkOperation,
    pub category_ids: Vec<CategoryId>,
}

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    pub path: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TreeQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct ManagerRequest {
    pub manager_id: UserId,
}

// -------------------------
// Parties
// -------------------------

#[derive(Debug, Deserialize)]
pub struct UpdateCustomerRequest {
    #[serde(flatten)]
    pub update: CustomerUpdate,
    #[serde(default)]
    pub contact: Option<ContactInfo>,
}

#[derive(Debug, Deserialize)]
pub struct ReasonRequest {
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct OptionalReasonRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CustomerStatusRequest {
    pub status: CustomerStatus,
}

#[derive(Debug, Deserialize)]
pub struct CustomerTierRequest {
    pub tier: CustomerTier,
}

#[derive(Debug, Deserialize)]
pub struct CreditLimitRequest {
    pub credit_limit: Money,
}

#[derive(Debug, Deserialize)]
pub struct IdsRequest<T> {
    pub ids: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct SupplierStatusRequest {
    pub status: SupplierStatus,
}

#[derive(Debug, Deserialize)]
pub struct PerformanceRequest {
    pub quality_rating: Rating,
    pub delivery_rating: Rating,
}

// -------------------------
// Inventory
// -------------------------

#[derive(Debug, Deserialize)]
pub struct AvailableUnitsQuery {
    pub item_id: ItemId,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUnitRequest {
    pub location_id: LocationId,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RentUnitRequest {
    pub rental_days: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReturnUnitRequest {
    #[serde(default)]
    pub condition: Option<UnitCondition>,
}

#[derive(Debug, Deserialize)]
pub struct MaintenanceCompleteRequest {
    pub condition: UnitCondition,
}

#[derive(Debug, Default, Deserialize)]
pub struct DamageNotesRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub delta: i64,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct QuantityRequest {
    pub quantity: i64,
}

// -------------------------
// Transactions
// -------------------------

#[derive(Debug, Deserialize)]
pub struct TransactionStatusRequest {
    pub status: TransactionStatus,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub amount: Money,
    pub method: PaymentMethod,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    pub amount: Money,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct RentalReturnRequest {
    pub return_date: NaiveDate,
}

#[derive(Debug, Default, Deserialize)]
pub struct DiscountRequest {
    #[serde(default)]
    pub percentage: Option<BasisPoints>,
    #[serde(default)]
    pub amount: Option<Money>,
}

#[derive(Debug, Deserialize)]
pub struct LineReturnRequest {
    pub quantity: i64,
    pub return_date: NaiveDate,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RentalPeriodRequest {
    pub end_date: NaiveDate,
}

#[derive(Debug, Default, Deserialize)]
pub struct DateRangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DueForReturnQuery {
    pub today: Option<NaiveDate>,
    pub days_ahead: Option<u32>,
}

// -------------------------
// Rental returns
// -------------------------

#[derive(Debug, Deserialize)]
pub struct ReturnStatusRequest {
    pub status: ReturnStatus,
}

#[derive(Debug, Deserialize)]
pub struct ReturnLineStatusRequest {
    pub status: ReturnLineStatus,
}

#[derive(Debug, Deserialize)]
pub struct DamageAssessmentRequest {
    pub damage_level: DamageLevel,
    #[serde(default)]
    pub estimated_cost: Option<Money>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LineFeesRequest {
    #[serde(default)]
    pub late_fee: Option<Money>,
    #[serde(default)]
    pub damage_fee: Option<Money>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LateFeeRequest {
    #[serde(default)]
    pub daily_rate: Option<Money>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DepositRequest {
    #[serde(default)]
    pub deposit: Option<Money>,
}

// -------------------------
// System settings
// -------------------------

/// Typed value: a JSON number, string, boolean, object or `null`.
#[derive(Debug, Deserialize)]
pub struct SettingValueRequest {
    pub value: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_query_applies_defaults_and_bounds() {
        let req = PageQuery::default().request().unwrap();
        assert_eq!((req.page, req.page_size), (1, 20));

        let err = PageQuery { page: Some(0), page_size: None }.request().unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn malformed_ids_are_bad_requests() {
        let err = parse_id::<CategoryId>("not-a-uuid").unwrap_err();
        assert_eq!(err.code, "invalid_id");
    }

    #[test]
    fn customer_update_accepts_contact_next_to_identity_fields() {
        let body: UpdateCustomerRequest = serde_json::from_value(serde_json::json!({
            "business_name": "Acme Events",
            "contact": { "email": "ops@acme.test" }
        }))
        .unwrap();
        assert_eq!(body.update.business_name.as_deref(), Some("Acme Events"));
        assert!(body.contact.is_some());
    }
}
