//! Item master: what can be rented or sold, and at what price.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rentdesk_core::{
    AuditStamp, BrandId, CategoryId, DomainError, DomainResult, Entity, ItemId, Money, SupplierId, UserId, validate,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemType {
    Rental,
    Sale,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    #[default]
    Active,
    Inactive,
    Discontinued,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemInput {
    pub item_code: String,
    pub item_name: String,
    pub item_type: ItemType,
    #[serde(default)]
    pub item_status: ItemStatus,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub brand_id: Option<BrandId>,
    #[serde(default)]
    pub supplier_id: Option<SupplierId>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub model_number: Option<String>,
    #[serde(default)]
    pub purchase_price: Money,
    #[serde(default)]
    pub rental_price_per_day: Money,
    #[serde(default)]
    pub rental_price_per_week: Money,
    #[serde(default)]
    pub rental_price_per_month: Money,
    #[serde(default)]
    pub sale_price: Money,
    #[serde(default)]
    pub security_deposit: Money,
    #[serde(default = "default_min_rental_days")]
    pub min_rental_days: u32,
    #[serde(default)]
    pub max_rental_days: Option<u32>,
    #[serde(default)]
    pub serial_number_required: bool,
    #[serde(default)]
    pub reorder_level: u32,
}

fn default_min_rental_days() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    id: ItemId,
    item_code: String,
    item_name: String,
    item_type: ItemType,
    item_status: ItemStatus,
    category_id: Option<CategoryId>,
    brand_id: Option<BrandId>,
    supplier_id: Option<SupplierId>,
    description: Option<String>,
    model_number: Option<String>,
    purchase_price: Money,
    rental_price_per_day: Money,
    rental_price_per_week: Money,
    rental_price_per_month: Money,
    sale_price: Money,
    security_deposit: Money,
    min_rental_days: u32,
    max_rental_days: Option<u32>,
    serial_number_required: bool,
    reorder_level: u32,
    audit: AuditStamp,
}

impl Entity for Item {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn is_active(&self) -> bool {
        self.audit.is_active
    }
}

impl Item {
    /// References (category, brand, supplier) are checked by the caller.
    pub fn create(id: ItemId, input: &ItemInput, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<Self> {
        let mut item = Self {
            id,
            item_code: String::new(),
            item_name: String::new(),
            item_type: input.item_type,
            item_status: input.item_status,
            category_id: None,
            brand_id: None,
            supplier_id: None,
            description: None,
            model_number: None,
            purchase_price: Money::zero(),
            rental_price_per_day: Money::zero(),
            rental_price_per_week: Money::zero(),
            rental_price_per_month: Money::zero(),
            sale_price: Money::zero(),
            security_deposit: Money::zero(),
            min_rental_days: 1,
            max_rental_days: None,
            serial_number_required: false,
            reorder_level: 0,
            audit: AuditStamp::new(actor, now),
        };
        item.apply(input)?;
        Ok(item)
    }

    fn apply(&mut self, input: &ItemInput) -> DomainResult<()> {
        let item_code = validate::code("item code", &input.item_code, 50)?;
        let item_name = validate::required_text("item name", &input.item_name, 200)?;
        let description = validate::optional_text("description", input.description.as_deref(), 1000)?;
        let model_number = validate::optional_text("model number", input.model_number.as_deref(), 100)?;
        for (field, amount) in [
            ("purchase price", input.purchase_price),
            ("daily rental price", input.rental_price_per_day),
            ("weekly rental price", input.rental_price_per_week),
            ("monthly rental price", input.rental_price_per_month),
            ("sale price", input.sale_price),
            ("security deposit", input.security_deposit),
        ] {
            validate::non_negative(field, amount)?;
        }
        if input.min_rental_days < 1 {
            return Err(DomainError::validation("minimum rental days must be at least 1"));
        }
        if input.max_rental_days.is_some_and(|max| max < input.min_rental_days) {
            return Err(DomainError::validation(
                "maximum rental days cannot be less than minimum rental days",
            ));
        }

        self.item_code = item_code;
        self.item_name = item_name;
        self.item_type = input.item_type;
        self.item_status = input.item_status;
        self.category_id = input.category_id;
        self.brand_id = input.brand_id;
        self.supplier_id = input.supplier_id;
        self.description = description;
        self.model_number = model_number;
        self.purchase_price = input.purchase_price;
        self.rental_price_per_day = input.rental_price_per_day;
        self.rental_price_per_week = input.rental_price_per_week;
        self.rental_price_per_month = input.rental_price_per_month;
        self.sale_price = input.sale_price;
        self.security_deposit = input.security_deposit;
        self.min_rental_days = input.min_rental_days;
        self.max_rental_days = input.max_rental_days;
        self.serial_number_required = input.serial_number_required;
        self.reorder_level = input.reorder_level;
        Ok(())
    }

    pub fn id_typed(&self) -> ItemId {
        self.id
    }

    pub fn item_code(&self) -> &str {
        &self.item_code
    }

    pub fn item_name(&self) -> &str {
        &self.item_name
    }

    pub fn item_type(&self) -> ItemType {
        self.item_type
    }

    pub fn status(&self) -> ItemStatus {
        self.item_status
    }

    pub fn category_id(&self) -> Option<CategoryId> {
        self.category_id
    }

    pub fn brand_id(&self) -> Option<BrandId> {
        self.brand_id
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn rental_price_per_day(&self) -> Money {
        self.rental_price_per_day
    }

    pub fn sale_price(&self) -> Money {
        self.sale_price
    }

    pub fn security_deposit(&self) -> Money {
        self.security_deposit
    }

    pub fn serial_number_required(&self) -> bool {
        self.serial_number_required
    }

    pub fn reorder_level(&self) -> u32 {
        self.reorder_level
    }

    pub fn audit(&self) -> &AuditStamp {
        &self.audit
    }

    fn is_live(&self) -> bool {
        self.audit.is_active && self.item_status == ItemStatus::Active
    }

    pub fn can_be_rented(&self) -> bool {
        self.is_live()
            && matches!(self.item_type, ItemType::Rental | ItemType::Both)
            && self.rental_price_per_day.is_positive()
    }

    pub fn can_be_sold(&self) -> bool {
        self.is_live() && matches!(self.item_type, ItemType::Sale | ItemType::Both) && self.sale_price.is_positive()
    }

    /// Rental length must sit within the item's min/max.
    pub fn check_rental_days(&self, days: u32) -> DomainResult<()> {
        if days < self.min_rental_days {
            return Err(DomainError::validation(format!(
                "minimum rental period is {} days",
                self.min_rental_days
            )));
        }
        if self.max_rental_days.is_some_and(|max| days > max) {
            return Err(DomainError::validation(format!(
                "maximum rental period is {} days",
                self.max_rental_days.unwrap_or_default()
            )));
        }
        Ok(())
    }

    /// Cheapest price for `days` using whole months (30 days) and weeks where
    /// those rates are set, then single days.
    pub fn rental_quote(&self, days: u32) -> Money {
        let mut remaining = i64::from(days);
        let mut total = Money::zero();
        let daily = self.rental_price_per_day;
        for (block, rate) in [(30, self.rental_price_per_month), (7, self.rental_price_per_week)] {
            if rate.is_positive() && rate < daily.times(block) {
                total += rate.times(remaining / block);
                remaining %= block;
            }
        }
        total + daily.times(remaining)
    }

    pub fn update(&mut self, input: &ItemInput, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        self.apply(input)?;
        self.audit.touch(actor, now);
        Ok(())
    }

    /// Soft delete; refused while inventory units still exist for the item.
    pub fn delete(&mut self, unit_count: usize, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        if unit_count > 0 {
            return Err(DomainError::invariant(format!(
                "cannot delete item with {unit_count} inventory units"
            )));
        }
        self.item_status = ItemStatus::Inactive;
        self.audit.deactivate(actor, now);
        Ok(())
    }

    fn ensure_active(&self) -> DomainResult<()> {
        if !self.audit.is_active {
            return Err(DomainError::not_found(format!("item {}", self.id)));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn rental_input() -> ItemInput {
        ItemInput {
            item_code: "tent-4p".into(),
            item_name: "Four person tent".into(),
            item_type: ItemType::Rental,
            item_status: ItemStatus::Active,
            category_id: None,
            brand_id: None,
            supplier_id: None,
            description: None,
            model_number: None,
            purchase_price: Money::from_major(300),
            rental_price_per_day: Money::from_major(20),
            rental_price_per_week: Money::from_major(100),
            rental_price_per_month: Money::zero(),
            sale_price: Money::zero(),
            security_deposit: Money::from_major(150),
            min_rental_days: 1,
            max_rental_days: Some(28),
            serial_number_required: true,
            reorder_level: 0,
        }
    }

    #[test]
    fn rentable_but_not_sellable() {
        let item = Item::create(ItemId::new(), &rental_input(), None, Utc::now()).unwrap();
        assert_eq!(item.item_code(), "TENT-4P");
        assert!(item.can_be_rented());
        assert!(!item.can_be_sold());
    }

    #[test]
    fn rental_day_bounds() {
        let mut bad = rental_input();
        bad.max_rental_days = Some(0);
        assert!(Item::create(ItemId::new(), &bad, None, Utc::now()).is_err());

        let item = Item::create(ItemId::new(), &rental_input(), None, Utc::now()).unwrap();
        assert!(item.check_rental_days(28).is_ok());
        assert!(item.check_rental_days(29).is_err());
        assert!(item.check_rental_days(0).is_err());
    }

    #[test]
    fn quote_uses_weekly_rate_when_cheaper() {
        let item = Item::create(ItemId::new(), &rental_input(), None, Utc::now()).unwrap();
        assert_eq!(item.rental_quote(3), Money::from_major(60));
        assert_eq!(item.rental_quote(9), Money::from_major(140));
    }

    #[test]
    fn negative_prices_are_rejected() {
        let mut bad = rental_input();
        bad.sale_price = Money::from_minor(-1);
        assert!(matches!(
            Item::create(ItemId::new(), &bad, None, Utc::now()),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn delete_refused_with_units() {
        let mut item = Item::create(ItemId::new(), &rental_input(), None, Utc::now()).unwrap();
        assert!(matches!(
            item.delete(2, None, Utc::now()),
            Err(DomainError::InvariantViolation(_))
        ));
        item.delete(0, None, Utc::now()).unwrap();
        assert!(!item.can_be_rented());
    }
}
