//! Transaction lines and per-line arithmetic.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use rentdesk_core::{BasisPoints, DomainError, DomainResult, ItemId, LineId, Money, UnitId, validate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineType {
    Product,
    Service,
    Fee,
    Discount,
    Tax,
    Deposit,
    LateFee,
    DamageFee,
    Refund,
}

impl LineType {
    /// Lines whose pre-tax amount counts toward the subtotal.
    pub fn is_chargeable(self) -> bool {
        matches!(
            self,
            LineType::Product | LineType::Service | LineType::Fee | LineType::LateFee | LineType::DamageFee
        )
    }

    pub fn requires_item(self) -> bool {
        matches!(self, LineType::Product | LineType::Service)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RentalPeriodUnit {
    Hour,
    Day,
    Week,
    Month,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineInput {
    pub line_type: LineType,
    #[serde(default)]
    pub item_id: Option<ItemId>,
    #[serde(default)]
    pub inventory_unit_id: Option<UnitId>,
    pub description: String,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(default)]
    pub unit_price: Money,
    #[serde(default)]
    pub discount_percentage: Option<BasisPoints>,
    #[serde(default)]
    pub discount_amount: Option<Money>,
    #[serde(default)]
    pub tax_rate: BasisPoints,
    #[serde(default)]
    pub rental_period_value: Option<u32>,
    #[serde(default)]
    pub rental_period_unit: Option<RentalPeriodUnit>,
    #[serde(default)]
    pub rental_start_date: Option<NaiveDate>,
    #[serde(default)]
    pub rental_end_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_quantity() -> i64 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionLine {
    id: LineId,
    line_number: u32,
    line_type: LineType,
    item_id: Option<ItemId>,
    inventory_unit_id: Option<UnitId>,
    description: String,
    quantity: i64,
    unit_price: Money,
    discount_percentage: BasisPoints,
    discount_amount: Money,
    tax_rate: BasisPoints,
    tax_amount: Money,
    line_total: Money,
    rental_period_value: Option<u32>,
    rental_period_unit: Option<RentalPeriodUnit>,
    rental_start_date: Option<NaiveDate>,
    rental_end_date: Option<NaiveDate>,
    returned_quantity: i64,
    return_date: Option<NaiveDate>,
    notes: Option<String>,
}

fn check_percentage(field: &str, rate: BasisPoints) -> DomainResult<BasisPoints> {
    if !rate.is_percentage() {
        return Err(DomainError::validation(format!("{field} must be between 0 and 100%")));
    }
    Ok(rate)
}

impl TransactionLine {
    pub fn new(id: LineId, line_number: u32, input: &LineInput) -> DomainResult<Self> {
        if line_number == 0 {
            return Err(DomainError::validation("line number must be at least 1"));
        }
        let mut line = Self {
            id,
            line_number,
            line_type: input.line_type,
            item_id: None,
            inventory_unit_id: None,
            description: String::new(),
            quantity: 0,
            unit_price: Money::zero(),
            discount_percentage: BasisPoints::default(),
            discount_amount: Money::zero(),
            tax_rate: BasisPoints::default(),
            tax_amount: Money::zero(),
            line_total: Money::zero(),
            rental_period_value: None,
            rental_period_unit: None,
            rental_start_date: None,
            rental_end_date: None,
            returned_quantity: 0,
            return_date: None,
            notes: None,
        };
        line.apply(input)?;
        Ok(line)
    }

    /// Replace the editable fields; returned quantity is preserved.
    pub fn apply(&mut self, input: &LineInput) -> DomainResult<()> {
        if input.line_type.requires_item() && input.item_id.is_none() {
            return Err(DomainError::validation(format!(
                "{:?} lines require an item",
                input.line_type
            )));
        }
        let description = validate::required_text("description", &input.description, 500)?;
        validate::quantity("quantity", input.quantity)?;
        validate::amount("unit price", input.unit_price)?;
        if input.quantity < self.returned_quantity {
            return Err(DomainError::invariant("quantity cannot drop below the returned quantity"));
        }
        if input.line_type != LineType::Discount {
            validate::non_negative("unit price", input.unit_price)?;
        }
        if input.discount_percentage.is_some() && input.discount_amount.is_some() {
            return Err(DomainError::validation(
                "cannot apply both percentage and amount discount",
            ));
        }
        let discount_percentage = check_percentage(
            "discount percentage",
            input.discount_percentage.unwrap_or_default(),
        )?;
        let discount_amount = validate::non_negative("discount amount", input.discount_amount.unwrap_or_default())
            .and_then(|amount| validate::amount("discount amount", amount))?;
        let tax_rate = check_percentage("tax rate", input.tax_rate)?;
        if input.rental_period_value.is_some_and(|v| v < 1) {
            return Err(DomainError::validation("rental period must be at least 1"));
        }
        if input.rental_period_value.is_some() && input.rental_period_unit.is_none() {
            return Err(DomainError::validation("rental period value requires a period unit"));
        }
        if let (Some(start), Some(end)) = (input.rental_start_date, input.rental_end_date) {
            if end < start {
                return Err(DomainError::validation("rental end date cannot be before start date"));
            }
        }

        let notes = validate::optional_text("notes", input.notes.as_deref(), 1000)?;

        let mut next = self.clone();
        next.line_type = input.line_type;
        next.item_id = input.item_id;
        next.inventory_unit_id = input.inventory_unit_id;
        next.description = description;
        next.quantity = input.quantity;
        next.unit_price = input.unit_price;
        next.discount_percentage = discount_percentage;
        next.discount_amount = discount_amount;
        next.tax_rate = tax_rate;
        next.rental_period_value = input.rental_period_value;
        next.rental_period_unit = input.rental_period_unit;
        next.rental_start_date = input.rental_start_date;
        next.rental_end_date = input.rental_end_date;
        next.notes = notes;
        next.calculate_line_total()?;
        *self = next;
        Ok(())
    }

    pub fn id_typed(&self) -> LineId {
        self.id
    }

    pub fn line_number(&self) -> u32 {
        self.line_number
    }

    pub fn line_type(&self) -> LineType {
        self.line_type
    }

    pub fn item_id(&self) -> Option<ItemId> {
        self.item_id
    }

    pub fn inventory_unit_id(&self) -> Option<UnitId> {
        self.inventory_unit_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn discount_amount(&self) -> Money {
        self.discount_amount
    }

    pub fn tax_amount(&self) -> Money {
        self.tax_amount
    }

    pub fn line_total(&self) -> Money {
        self.line_total
    }

    /// Line total without its own tax.
    pub fn pre_tax_amount(&self) -> Money {
        self.line_total - self.tax_amount
    }

    pub fn rental_period_value(&self) -> Option<u32> {
        self.rental_period_value
    }

    pub fn rental_end_date(&self) -> Option<NaiveDate> {
        self.rental_end_date
    }

    pub fn returned_quantity(&self) -> i64 {
        self.returned_quantity
    }

    pub fn return_date(&self) -> Option<NaiveDate> {
        self.return_date
    }

    /// base = qty × price; a percentage discount replaces the flat amount;
    /// tax applies to the discounted amount; DISCOUNT lines are stored negative.
    /// Fails without touching the line when the arithmetic overflows.
    pub fn calculate_line_total(&mut self) -> DomainResult<()> {
        let base = self.unit_price.checked_times(self.quantity)?;
        if self.line_type == LineType::Discount {
            self.discount_amount = Money::zero();
            self.tax_amount = Money::zero();
            self.line_total = -base.abs();
            return Ok(());
        }
        let discount_amount = if self.discount_percentage.is_zero() {
            self.discount_amount
        } else {
            base.apply_rate(self.discount_percentage)
        };
        let discounted = base.checked_sub(discount_amount)?.non_negative();
        let tax_amount = discounted.apply_rate(self.tax_rate);
        let line_total = discounted.checked_add(tax_amount)?;
        self.discount_amount = discount_amount;
        self.tax_amount = tax_amount;
        self.line_total = line_total;
        Ok(())
    }

    pub fn apply_discount(&mut self, percentage: Option<BasisPoints>, amount: Option<Money>) -> DomainResult<()> {
        match (percentage, amount) {
            (Some(_), Some(_)) => Err(DomainError::validation(
                "cannot apply both percentage and amount discount",
            )),
            (None, None) => Err(DomainError::validation("a discount percentage or amount is required")),
            (Some(pct), None) => {
                let mut next = self.clone();
                next.discount_percentage = check_percentage("discount percentage", pct)?;
                next.calculate_line_total()?;
                *self = next;
                Ok(())
            }
            (None, Some(amount)) => {
                let amount = validate::non_negative("discount amount", amount)?;
                if amount > self.unit_price.checked_times(self.quantity)? {
                    return Err(DomainError::validation("discount cannot exceed the line amount"));
                }
                let mut next = self.clone();
                next.discount_percentage = BasisPoints::default();
                next.discount_amount = amount;
                next.calculate_line_total()?;
                *self = next;
                Ok(())
            }
        }
    }

    pub fn remaining_quantity(&self) -> i64 {
        self.quantity - self.returned_quantity
    }

    pub fn is_fully_returned(&self) -> bool {
        self.quantity > 0 && self.returned_quantity >= self.quantity
    }

    pub fn is_partially_returned(&self) -> bool {
        self.returned_quantity > 0 && self.returned_quantity < self.quantity
    }

    pub fn process_return(&mut self, qty: i64, date: NaiveDate, reason: Option<&str>) -> DomainResult<()> {
        if qty <= 0 {
            return Err(DomainError::validation("return quantity must be positive"));
        }
        if qty > self.remaining_quantity() {
            return Err(DomainError::invariant(format!(
                "cannot return {qty}, only {} outstanding",
                self.remaining_quantity()
            )));
        }
        self.returned_quantity += qty;
        self.return_date = Some(date);
        if let Some(reason) = validate::optional_text("reason", reason, 500)? {
            let entry = format!("Returned {qty} on {date}: {reason}");
            self.notes = Some(match self.notes.take() {
                Some(existing) => format!("{existing}\n{entry}"),
                None => entry,
            });
        }
        Ok(())
    }

    /// Move the rental end date. For day-based periods the period value follows
    /// the inclusive day count.
    pub fn update_rental_period(&mut self, end: NaiveDate) -> DomainResult<()> {
        let start = self
            .rental_start_date
            .ok_or_else(|| DomainError::invariant("line has no rental start date"))?;
        if end < start {
            return Err(DomainError::validation("rental end date cannot be before start date"));
        }
        self.rental_end_date = Some(end);
        if self.rental_period_unit == Some(RentalPeriodUnit::Day) {
            let days = (end - start + Duration::days(1)).num_days();
            self.rental_period_value = Some(days as u32);
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;

    pub(crate) fn product(qty: i64, price_minor: i64) -> LineInput {
        LineInput {
            line_type: LineType::Product,
            item_id: Some(ItemId::new()),
            inventory_unit_id: None,
            description: "Camping stove".into(),
            quantity: qty,
            unit_price: Money::from_minor(price_minor),
            discount_percentage: None,
            discount_amount: None,
            tax_rate: BasisPoints::default(),
            rental_period_value: None,
            rental_period_unit: None,
            rental_start_date: None,
            rental_end_date: None,
            notes: None,
        }
    }

    pub(crate) fn simple(line_type: LineType, price_minor: i64) -> LineInput {
        LineInput {
            line_type,
            item_id: None,
            description: format!("{line_type:?}"),
            ..product(1, price_minor)
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, d).unwrap()
    }

    #[test]
    fn percentage_discount_then_tax() {
        let mut input = product(2, 5_000);
        input.discount_percentage = Some(BasisPoints::from_percent(10));
        input.tax_rate = BasisPoints::new(825);
        let line = TransactionLine::new(LineId::new(), 1, &input).unwrap();
        // base 100.00, discount 10.00, tax 8.25% of 90.00 = 7.43 (7.425 rounds up)
        assert_eq!(line.discount_amount(), Money::from_minor(1_000));
        assert_eq!(line.tax_amount(), Money::from_minor(743));
        assert_eq!(line.line_total(), Money::from_minor(9_743));
        assert_eq!(line.pre_tax_amount(), Money::from_minor(9_000));
    }

    #[test]
    fn discount_lines_are_negative() {
        let line = TransactionLine::new(LineId::new(), 1, &simple(LineType::Discount, 1_500)).unwrap();
        assert_eq!(line.line_total(), Money::from_minor(-1_500));
    }

    #[test]
    fn product_line_needs_item_and_single_discount_kind() {
        let mut input = product(1, 100);
        input.item_id = None;
        assert!(TransactionLine::new(LineId::new(), 1, &input).is_err());

        let mut input = product(1, 100);
        input.discount_percentage = Some(BasisPoints::from_percent(5));
        input.discount_amount = Some(Money::from_minor(5));
        assert!(TransactionLine::new(LineId::new(), 1, &input).is_err());
    }

    #[test]
    fn partial_then_full_return() {
        let mut line = TransactionLine::new(LineId::new(), 1, &product(3, 100)).unwrap();
        line.process_return(1, day(5), Some("one early")).unwrap();
        assert!(line.is_partially_returned());
        assert!(line.process_return(3, day(6), None).is_err());
        line.process_return(2, day(6), None).unwrap();
        assert!(line.is_fully_returned());
        assert_eq!(line.remaining_quantity(), 0);
        assert_eq!(line.return_date(), Some(day(6)));
    }

    #[test]
    fn rental_period_follows_end_date_for_days() {
        let mut input = product(1, 2_000);
        input.rental_period_value = Some(3);
        input.rental_period_unit = Some(RentalPeriodUnit::Day);
        input.rental_start_date = Some(day(1));
        input.rental_end_date = Some(day(3));
        let mut line = TransactionLine::new(LineId::new(), 1, &input).unwrap();

        line.update_rental_period(day(10)).unwrap();
        assert_eq!(line.rental_period_value(), Some(10));
        assert!(line.update_rental_period(NaiveDate::from_ymd_opt(2026, 5, 31).unwrap()).is_err());
    }

    #[test]
    fn flat_discount_cannot_exceed_amount() {
        let mut line = TransactionLine::new(LineId::new(), 1, &product(1, 1_000)).unwrap();
        assert!(line.apply_discount(None, Some(Money::from_minor(1_001))).is_err());
        line.apply_discount(None, Some(Money::from_minor(250))).unwrap();
        assert_eq!(line.line_total(), Money::from_minor(750));
    }

    #[test]
    fn oversized_quantity_and_price_are_rejected() {
        let err = TransactionLine::new(LineId::new(), 1, &product(10_000_000_000, 10_000_000_000)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let mut line = TransactionLine::new(LineId::new(), 1, &product(2, 500)).unwrap();
        let before = line.clone();
        assert!(line.apply(&product(1, Money::MAX.minor() + 1)).is_err());
        assert_eq!(line, before);

        // Largest accepted inputs still total without overflow.
        let mut input = product(validate::MAX_QUANTITY, Money::MAX.minor());
        input.tax_rate = BasisPoints::from_percent(100);
        let line = TransactionLine::new(LineId::new(), 1, &input).unwrap();
        assert!(line.line_total().is_positive());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 500,
            ..ProptestConfig::default()
        })]

        #[test]
        fn total_is_discounted_plus_tax(
            qty in 0i64..1_000,
            price in 0i64..1_000_000,
            pct in 0u32..=10_000,
            tax in 0u32..=10_000,
        ) {
            let mut input = product(qty, price);
            input.discount_percentage = Some(BasisPoints::new(pct));
            input.tax_rate = BasisPoints::new(tax);
            let line = TransactionLine::new(LineId::new(), 1, &input).unwrap();

            let base = Money::from_minor(price).times(qty);
            prop_assert!(!line.line_total().is_negative());
            prop_assert!(line.pre_tax_amount() <= base);
            prop_assert_eq!(line.pre_tax_amount() + line.discount_amount(), base);
            prop_assert_eq!(line.line_total(), line.pre_tax_amount() + line.tax_amount());
        }
    }
}
