//! Customers: identity, tier, blacklist state and credit.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use rentdesk_core::{AuditStamp, CustomerId, DomainError, DomainResult, Entity, Money, UserId, validate};

use crate::contact::ContactInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerType {
    Individual,
    Business,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerTier {
    #[default]
    Bronze,
    Silver,
    Gold,
    Platinum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlacklistStatus {
    #[default]
    Clear,
    Warning,
    Blacklisted,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCustomer {
    pub customer_code: String,
    pub customer_type: CustomerType,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub business_name: Option<String>,
    #[serde(default)]
    pub contact: ContactInfo,
    #[serde(default)]
    pub tax_id: Option<String>,
    #[serde(default)]
    pub customer_tier: CustomerTier,
    #[serde(default)]
    pub credit_limit: Money,
}

/// Partial update of identity fields; `None` keeps the current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerUpdate {
    pub customer_type: Option<CustomerType>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub business_name: Option<String>,
    pub tax_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    id: CustomerId,
    customer_code: String,
    customer_type: CustomerType,
    first_name: Option<String>,
    last_name: Option<String>,
    business_name: Option<String>,
    contact: ContactInfo,
    tax_id: Option<String>,
    customer_tier: CustomerTier,
    status: CustomerStatus,
    blacklist_status: BlacklistStatus,
    blacklist_reason: Option<String>,
    credit_limit: Money,
    lifetime_value: Money,
    last_transaction_date: Option<NaiveDate>,
    audit: AuditStamp,
}

impl Entity for Customer {
    type Id = CustomerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn is_active(&self) -> bool {
        self.audit.is_active
    }
}

struct Identity {
    first_name: Option<String>,
    last_name: Option<String>,
    business_name: Option<String>,
}

fn validate_identity(
    customer_type: CustomerType,
    first_name: Option<&str>,
    last_name: Option<&str>,
    business_name: Option<&str>,
) -> DomainResult<Identity> {
    let identity = Identity {
        first_name: validate::optional_text("first name", first_name, 100)?,
        last_name: validate::optional_text("last name", last_name, 100)?,
        business_name: validate::optional_text("business name", business_name, 200)?,
    };
    match customer_type {
        CustomerType::Individual if identity.first_name.is_none() || identity.last_name.is_none() => Err(
            DomainError::validation("individual customers require first and last name"),
        ),
        CustomerType::Business if identity.business_name.is_none() => Err(DomainError::validation(
            "business customers require a business name",
        )),
        _ => Ok(identity),
    }
}

fn reason_text(reason: &str) -> DomainResult<String> {
    validate::required_text("reason", reason, 500)
}

fn check_limit(limit: Money) -> DomainResult<Money> {
    validate::non_negative("credit limit", limit).and_then(|limit| validate::amount("credit limit", limit))
}

impl Customer {
    pub fn create(id: CustomerId, input: NewCustomer, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<Self> {
        let identity = validate_identity(
            input.customer_type,
            input.first_name.as_deref(),
            input.last_name.as_deref(),
            input.business_name.as_deref(),
        )?;
        Ok(Self {
            id,
            customer_code: validate::code("customer code", &input.customer_code, 20)?,
            customer_type: input.customer_type,
            first_name: identity.first_name,
            last_name: identity.last_name,
            business_name: identity.business_name,
            contact: input.contact.validated()?,
            tax_id: validate::optional_text("tax id", input.tax_id.as_deref(), 50)?,
            customer_tier: input.customer_tier,
            status: CustomerStatus::Active,
            blacklist_status: BlacklistStatus::Clear,
            blacklist_reason: None,
            credit_limit: check_limit(input.credit_limit)?,
            lifetime_value: Money::zero(),
            last_transaction_date: None,
            audit: AuditStamp::new(actor, now),
        })
    }

    pub fn id_typed(&self) -> CustomerId {
        self.id
    }

    pub fn customer_code(&self) -> &str {
        &self.customer_code
    }

    pub fn customer_type(&self) -> CustomerType {
        self.customer_type
    }

    pub fn contact(&self) -> &ContactInfo {
        &self.contact
    }

    pub fn tax_id(&self) -> Option<&str> {
        self.tax_id.as_deref()
    }

    pub fn tier(&self) -> CustomerTier {
        self.customer_tier
    }

    pub fn status(&self) -> CustomerStatus {
        self.status
    }

    pub fn blacklist_status(&self) -> BlacklistStatus {
        self.blacklist_status
    }

    pub fn blacklist_reason(&self) -> Option<&str> {
        self.blacklist_reason.as_deref()
    }

    pub fn credit_limit(&self) -> Money {
        self.credit_limit
    }

    pub fn lifetime_value(&self) -> Money {
        self.lifetime_value
    }

    pub fn last_transaction_date(&self) -> Option<NaiveDate> {
        self.last_transaction_date
    }

    pub fn audit(&self) -> &AuditStamp {
        &self.audit
    }

    pub fn is_blacklisted(&self) -> bool {
        self.blacklist_status == BlacklistStatus::Blacklisted
    }

    /// Business name, or "First Last" for individuals.
    pub fn display_name(&self) -> String {
        match self.customer_type {
            CustomerType::Business => self.business_name.clone().unwrap_or_default(),
            CustomerType::Individual => [self.first_name.as_deref(), self.last_name.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    /// Whether new transactions may be opened for this customer.
    pub fn can_transact(&self) -> DomainResult<()> {
        if !self.audit.is_active || self.status != CustomerStatus::Active {
            return Err(DomainError::invariant("customer is not active"));
        }
        if self.is_blacklisted() {
            return Err(DomainError::invariant("customer is blacklisted"));
        }
        Ok(())
    }

    pub fn update(&mut self, update: CustomerUpdate, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        let customer_type = update.customer_type.unwrap_or(self.customer_type);
        let pick = |new: &Option<String>, old: &Option<String>| new.clone().or_else(|| old.clone());
        let first_name = pick(&update.first_name, &self.first_name);
        let last_name = pick(&update.last_name, &self.last_name);
        let business_name = pick(&update.business_name, &self.business_name);
        let identity = validate_identity(
            customer_type,
            first_name.as_deref(),
            last_name.as_deref(),
            business_name.as_deref(),
        )?;
        let tax_id = match update.tax_id.as_deref() {
            Some(tax_id) => validate::optional_text("tax id", Some(tax_id), 50)?,
            None => self.tax_id.clone(),
        };

        self.customer_type = customer_type;
        self.first_name = identity.first_name;
        self.last_name = identity.last_name;
        self.business_name = identity.business_name;
        self.tax_id = tax_id;
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn update_contact_info(&mut self, contact: &ContactInfo, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        self.contact = contact.validated()?;
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn blacklist(&mut self, reason: &str, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        if self.is_blacklisted() {
            return Err(DomainError::conflict("customer is already blacklisted"));
        }
        self.blacklist_reason = Some(reason_text(reason)?);
        self.blacklist_status = BlacklistStatus::Blacklisted;
        self.audit.touch(actor, now);
        tracing::info!(customer_id = %self.id, "customer blacklisted");
        Ok(())
    }

    pub fn set_warning(&mut self, reason: &str, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        if self.is_blacklisted() {
            return Err(DomainError::invariant("clear the blacklist before issuing a warning"));
        }
        self.blacklist_reason = Some(reason_text(reason)?);
        self.blacklist_status = BlacklistStatus::Warning;
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn clear_blacklist(&mut self, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        if self.blacklist_status == BlacklistStatus::Clear {
            return Err(DomainError::invariant("customer has no blacklist or warning to clear"));
        }
        self.blacklist_status = BlacklistStatus::Clear;
        self.blacklist_reason = None;
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn update_tier(&mut self, tier: CustomerTier, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        self.customer_tier = tier;
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn update_credit_limit(&mut self, limit: Money, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        self.credit_limit = check_limit(limit)?;
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn update_status(&mut self, status: CustomerStatus, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        self.status = status;
        self.audit.touch(actor, now);
        Ok(())
    }

    /// Book a completed transaction against the customer's history.
    pub fn record_transaction(&mut self, amount: Money, date: NaiveDate, now: DateTime<Utc>) -> DomainResult<()> {
        validate::non_negative("transaction amount", amount)?;
        self.lifetime_value = self.lifetime_value.checked_add(amount)?;
        if self.last_transaction_date.is_none_or(|last| date > last) {
            self.last_transaction_date = Some(date);
        }
        self.audit.updated_at = now;
        Ok(())
    }

    pub fn delete(&mut self, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        self.status = CustomerStatus::Inactive;
        self.audit.deactivate(actor, now);
        Ok(())
    }

    /// Bulk reactivation of a soft-deleted customer.
    pub fn reactivate(&mut self, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        if self.audit.is_active && self.status == CustomerStatus::Active {
            return Err(DomainError::conflict("customer is already active"));
        }
        self.status = CustomerStatus::Active;
        self.audit.activate(actor, now);
        Ok(())
    }

    fn ensure_active(&self) -> DomainResult<()> {
        if !self.audit.is_active {
            return Err(DomainError::not_found(format!("customer {}", self.id)));
        }
        Ok(())
    }
}

/// List filters; every `Some` field must match.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerFilter {
    pub customer_type: Option<CustomerType>,
    pub tier: Option<CustomerTier>,
    pub status: Option<CustomerStatus>,
    pub blacklist_status: Option<BlacklistStatus>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

impl CustomerFilter {
    pub fn matches(&self, c: &Customer) -> bool {
        self.customer_type.is_none_or(|t| c.customer_type == t)
            && self.tier.is_none_or(|t| c.customer_tier == t)
            && self.status.is_none_or(|s| c.status == s)
            && self.blacklist_status.is_none_or(|b| c.blacklist_status == b)
            && self.is_active.is_none_or(|a| c.audit.is_active == a)
            && self.search.as_deref().is_none_or(|term| c.matches_search(term))
    }
}

impl Customer {
    /// Case-insensitive match on code, names and e-mail.
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        [
            Some(self.customer_code.as_str()),
            self.first_name.as_deref(),
            self.last_name.as_deref(),
            self.business_name.as_deref(),
            self.contact.email.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&term))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CustomerStatistics {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
    pub blacklisted: usize,
    pub by_type: BTreeMap<CustomerType, usize>,
    pub by_tier: BTreeMap<CustomerTier, usize>,
    pub by_status: BTreeMap<CustomerStatus, usize>,
    pub total_lifetime_value: Money,
}

impl CustomerStatistics {
    pub fn collect<'a>(customers: impl IntoIterator<Item = &'a Customer>) -> Self {
        let mut stats = Self::default();
        for c in customers {
            stats.total += 1;
            if c.audit.is_active {
                stats.active += 1;
            } else {
                stats.inactive += 1;
            }
            if c.is_blacklisted() {
                stats.blacklisted += 1;
            }
            *stats.by_type.entry(c.customer_type).or_default() += 1;
            *stats.by_tier.entry(c.customer_tier).or_default() += 1;
            *stats.by_status.entry(c.status).or_default() += 1;
            stats.total_lifetime_value += c.lifetime_value;
        }
        stats
    }
}
