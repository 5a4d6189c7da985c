//! Suppliers: classification, terms, approval status and performance.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use rentdesk_core::{AuditStamp, DomainError, DomainResult, Entity, Money, SupplierId, UserId, validate};

use crate::contact::ContactInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SupplierType {
    Manufacturer,
    Distributor,
    Wholesaler,
    Retailer,
    Inventory,
    Service,
    Direct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SupplierTier {
    Premium,
    #[default]
    Standard,
    Basic,
    Trial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SupplierStatus {
    Active,
    Inactive,
    #[default]
    Pending,
    Approved,
    Suspended,
    Blacklisted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentTerms {
    Immediate,
    Net15,
    #[default]
    Net30,
    Net45,
    Net60,
    Net90,
    Cod,
}

impl PaymentTerms {
    /// Days until payment is due.
    pub fn days(self) -> u32 {
        match self {
            PaymentTerms::Immediate | PaymentTerms::Cod => 0,
            PaymentTerms::Net15 => 15,
            PaymentTerms::Net30 => 30,
            PaymentTerms::Net45 => 45,
            PaymentTerms::Net60 => 60,
            PaymentTerms::Net90 => 90,
        }
    }
}

/// Performance score from 0.0 to 5.0 in steps of 0.1, stored as tenths.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Rating(u8);

impl Rating {
    pub const MAX_TENTHS: u8 = 50;

    pub fn from_tenths(tenths: u8) -> DomainResult<Self> {
        if tenths > Self::MAX_TENTHS {
            return Err(DomainError::validation("rating must be between 0 and 5"));
        }
        Ok(Self(tenths))
    }

    pub fn tenths(self) -> u8 {
        self.0
    }
}

impl TryFrom<f64> for Rating {
    type Error = DomainError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() || !(0.0..=5.0).contains(&value) {
            return Err(DomainError::validation("rating must be between 0 and 5"));
        }
        Self::from_tenths((value * 10.0).round() as u8)
    }
}

impl From<Rating> for f64 {
    fn from(value: Rating) -> Self {
        f64::from(value.0) / 10.0
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupplierInput {
    pub supplier_code: String,
    pub company_name: String,
    pub supplier_type: SupplierType,
    #[serde(default)]
    pub contact_person: Option<String>,
    #[serde(default)]
    pub contact: ContactInfo,
    #[serde(default)]
    pub tax_id: Option<String>,
    #[serde(default)]
    pub payment_terms: PaymentTerms,
    #[serde(default)]
    pub credit_limit: Money,
    #[serde(default)]
    pub supplier_tier: SupplierTier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    id: SupplierId,
    supplier_code: String,
    company_name: String,
    supplier_type: SupplierType,
    contact_person: Option<String>,
    contact: ContactInfo,
    tax_id: Option<String>,
    payment_terms: PaymentTerms,
    credit_limit: Money,
    supplier_tier: SupplierTier,
    status: SupplierStatus,
    quality_rating: Rating,
    delivery_rating: Rating,
    total_orders: u32,
    total_spend: Money,
    last_order_date: Option<NaiveDate>,
    audit: AuditStamp,
}

impl Entity for Supplier {
    type Id = SupplierId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn is_active(&self) -> bool {
        self.audit.is_active
    }
}

impl Supplier {
    pub fn create(id: SupplierId, input: &SupplierInput, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<Self> {
        let mut supplier = Self {
            id,
            supplier_code: String::new(),
            company_name: String::new(),
            supplier_type: input.supplier_type,
            contact_person: None,
            contact: ContactInfo::default(),
            tax_id: None,
            payment_terms: input.payment_terms,
            credit_limit: Money::zero(),
            supplier_tier: input.supplier_tier,
            status: SupplierStatus::Pending,
            quality_rating: Rating::default(),
            delivery_rating: Rating::default(),
            total_orders: 0,
            total_spend: Money::zero(),
            last_order_date: None,
            audit: AuditStamp::new(actor, now),
        };
        supplier.apply(input)?;
        Ok(supplier)
    }

    fn apply(&mut self, input: &SupplierInput) -> DomainResult<()> {
        let supplier_code = validate::code("supplier code", &input.supplier_code, 50)?;
        let company_name = validate::required_text("company name", &input.company_name, 255)?;
        let contact_person = validate::optional_text("contact person", input.contact_person.as_deref(), 255)?;
        let contact = input.contact.validated()?;
        let tax_id = validate::optional_text("tax id", input.tax_id.as_deref(), 50)?;
        let credit_limit = validate::non_negative("credit limit", input.credit_limit)
            .and_then(|limit| validate::amount("credit limit", limit))?;

        self.supplier_code = supplier_code;
        self.company_name = company_name;
        self.supplier_type = input.supplier_type;
        self.contact_person = contact_person;
        self.contact = contact;
        self.tax_id = tax_id;
        self.payment_terms = input.payment_terms;
        self.credit_limit = credit_limit;
        self.supplier_tier = input.supplier_tier;
        Ok(())
    }

    pub fn id_typed(&self) -> SupplierId {
        self.id
    }

    pub fn supplier_code(&self) -> &str {
        &self.supplier_code
    }

    pub fn company_name(&self) -> &str {
        &self.company_name
    }

    pub fn supplier_type(&self) -> SupplierType {
        self.supplier_type
    }

    pub fn tier(&self) -> SupplierTier {
        self.supplier_tier
    }

    pub fn status(&self) -> SupplierStatus {
        self.status
    }

    pub fn payment_terms(&self) -> PaymentTerms {
        self.payment_terms
    }

    pub fn quality_rating(&self) -> Rating {
        self.quality_rating
    }

    pub fn delivery_rating(&self) -> Rating {
        self.delivery_rating
    }

    pub fn total_orders(&self) -> u32 {
        self.total_orders
    }

    pub fn total_spend(&self) -> Money {
        self.total_spend
    }

    pub fn last_order_date(&self) -> Option<NaiveDate> {
        self.last_order_date
    }

    pub fn audit(&self) -> &AuditStamp {
        &self.audit
    }

    /// Only ACTIVE or APPROVED suppliers may receive purchase orders.
    pub fn can_supply(&self) -> bool {
        self.audit.is_active && matches!(self.status, SupplierStatus::Active | SupplierStatus::Approved)
    }

    pub fn ensure_can_supply(&self) -> DomainResult<()> {
        if !self.can_supply() {
            return Err(DomainError::invariant(format!(
                "supplier {} cannot supply (status {:?})",
                self.supplier_code, self.status
            )));
        }
        Ok(())
    }

    /// Mean of quality and delivery, in tenths.
    pub fn overall_rating_tenths(&self) -> u8 {
        let sum = u16::from(self.quality_rating.tenths()) + u16::from(self.delivery_rating.tenths());
        (sum / 2) as u8
    }

    pub fn update(&mut self, input: &SupplierInput, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        self.apply(input)?;
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn update_status(&mut self, status: SupplierStatus, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        self.status = status;
        self.audit.touch(actor, now);
        tracing::info!(supplier_id = %self.id, ?status, "supplier status changed");
        Ok(())
    }

    pub fn update_performance(
        &mut self,
        quality: Rating,
        delivery: Rating,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_active()?;
        self.quality_rating = quality;
        self.delivery_rating = delivery;
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn record_order(&mut self, amount: Money, date: NaiveDate, now: DateTime<Utc>) -> DomainResult<()> {
        validate::non_negative("order amount", amount)?;
        self.total_spend = self.total_spend.checked_add(amount)?;
        self.total_orders += 1;
        if self.last_order_date.is_none_or(|last| date > last) {
            self.last_order_date = Some(date);
        }
        self.audit.updated_at = now;
        Ok(())
    }

    pub fn delete(&mut self, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        self.status = SupplierStatus::Inactive;
        self.audit.deactivate(actor, now);
        Ok(())
    }

    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        term.is_empty()
            || [
                Some(self.supplier_code.as_str()),
                Some(self.company_name.as_str()),
                self.contact_person.as_deref(),
                self.contact.email.as_deref(),
            ]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&term))
    }

    fn ensure_active(&self) -> DomainResult<()> {
        if !self.audit.is_active {
            return Err(DomainError::not_found(format!("supplier {}", self.id)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SupplierFilter {
    pub supplier_type: Option<SupplierType>,
    pub status: Option<SupplierStatus>,
    pub tier: Option<SupplierTier>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

impl SupplierFilter {
    pub fn matches(&self, s: &Supplier) -> bool {
        self.supplier_type.is_none_or(|t| s.supplier_type == t)
            && self.status.is_none_or(|st| s.status == st)
            && self.tier.is_none_or(|t| s.supplier_tier == t)
            && self.is_active.is_none_or(|a| s.audit.is_active == a)
            && self.search.as_deref().is_none_or(|term| s.matches_search(term))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SupplierStatistics {
    pub total: usize,
    pub active: usize,
    pub can_supply: usize,
    pub by_type: BTreeMap<SupplierType, usize>,
    pub by_tier: BTreeMap<SupplierTier, usize>,
    pub by_status: BTreeMap<SupplierStatus, usize>,
    pub total_spend: Money,
}

impl SupplierStatistics {
    pub fn collect<'a>(suppliers: impl IntoIterator<Item = &'a Supplier>) -> Self {
        let mut stats = Self::default();
        for s in suppliers {
            stats.total += 1;
            if s.audit.is_active {
                stats.active += 1;
            }
            if s.can_supply() {
                stats.can_supply += 1;
            }
            *stats.by_type.entry(s.supplier_type).or_default() += 1;
            *stats.by_tier.entry(s.supplier_tier).or_default() += 1;
            *stats.by_status.entry(s.status).or_default() += 1;
            stats.total_spend += s.total_spend;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 10, 8, 30, 0).unwrap()
    }

    fn input() -> SupplierInput {
        SupplierInput {
            supplier_code: "acme".into(),
            company_name: "Acme Outdoor".into(),
            supplier_type: SupplierType::Distributor,
            contact_person: Some("Wile E.".into()),
            contact: ContactInfo::default(),
            tax_id: None,
            payment_terms: PaymentTerms::default(),
            credit_limit: Money::from_major(10_000),
            supplier_tier: SupplierTier::default(),
        }
    }

    #[test]
    fn new_supplier_is_pending_until_approved() {
        let mut s = Supplier::create(SupplierId::new(), &input(), None, test_time()).unwrap();
        assert_eq!(s.supplier_code(), "ACME");
        assert_eq!(s.payment_terms().days(), 30);
        assert!(!s.can_supply());

        s.update_status(SupplierStatus::Approved, None, test_time()).unwrap();
        assert!(s.can_supply());
        s.update_status(SupplierStatus::Blacklisted, None, test_time()).unwrap();
        assert!(s.ensure_can_supply().is_err());
    }

    #[test]
    fn ratings_are_bounded_tenths() {
        assert_eq!(Rating::try_from(4.25).unwrap().tenths(), 43);
        assert!(Rating::try_from(5.1).is_err());
        assert!(Rating::try_from(-0.1).is_err());
        assert_eq!(f64::from(Rating::from_tenths(35).unwrap()), 3.5);
    }

    #[test]
    fn performance_and_orders() {
        let mut s = Supplier::create(SupplierId::new(), &input(), None, test_time()).unwrap();
        s.update_performance(Rating::from_tenths(40).unwrap(), Rating::from_tenths(30).unwrap(), None, test_time())
            .unwrap();
        assert_eq!(s.overall_rating_tenths(), 35);

        let day = NaiveDate::from_ymd_opt(2026, 2, 9).unwrap();
        s.record_order(Money::from_major(250), day, test_time()).unwrap();
        s.record_order(Money::from_major(50), day, test_time()).unwrap();
        assert_eq!(s.total_orders(), 2);
        assert_eq!(s.total_spend(), Money::from_major(300));
    }

    #[test]
    fn statistics_group_by_status() {
        let a = Supplier::create(SupplierId::new(), &input(), None, test_time()).unwrap();
        let mut b = Supplier::create(SupplierId::new(), &input(), None, test_time()).unwrap();
        b.update_status(SupplierStatus::Active, None, test_time()).unwrap();
        let stats = SupplierStatistics::collect([&a, &b]);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.can_supply, 1);
        assert_eq!(stats.by_status[&SupplierStatus::Pending], 1);
    }
}
