//! Individually tracked inventory units and their lifecycle.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use rentdesk_core::{AuditStamp, DomainError, DomainResult, Entity, ItemId, LocationId, Money, UnitId, UserId, validate};

use crate::item::Item;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitStatus {
    #[default]
    Available,
    Rented,
    Sold,
    Maintenance,
    Damaged,
    Retired,
}

impl UnitStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, UnitStatus::Sold | UnitStatus::Retired)
    }
}

impl core::fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            UnitStatus::Available => "AVAILABLE",
            UnitStatus::Rented => "RENTED",
            UnitStatus::Sold => "SOLD",
            UnitStatus::Maintenance => "MAINTENANCE",
            UnitStatus::Damaged => "DAMAGED",
            UnitStatus::Retired => "RETIRED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitCondition {
    #[default]
    New,
    Excellent,
    Good,
    Fair,
    Poor,
    Damaged,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnitInput {
    pub item_id: ItemId,
    pub location_id: LocationId,
    pub unit_code: String,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub condition: UnitCondition,
    #[serde(default)]
    pub purchase_date: Option<NaiveDate>,
    #[serde(default)]
    pub purchase_cost: Money,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryUnit {
    id: UnitId,
    item_id: ItemId,
    location_id: LocationId,
    unit_code: String,
    serial_number: Option<String>,
    status: UnitStatus,
    condition: UnitCondition,
    purchase_date: Option<NaiveDate>,
    purchase_cost: Money,
    rental_count: u32,
    total_rental_days: u32,
    last_maintenance_date: Option<NaiveDate>,
    notes: Option<String>,
    audit: AuditStamp,
}

impl Entity for InventoryUnit {
    type Id = UnitId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn is_active(&self) -> bool {
        self.audit.is_active
    }
}

impl InventoryUnit {
    /// Uniqueness of code and serial is checked by the caller.
    pub fn create(
        id: UnitId,
        item: &Item,
        input: &UnitInput,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if !item.is_active() {
            return Err(DomainError::not_found(format!("item {}", item.id_typed())));
        }
        if input.item_id != item.id_typed() {
            return Err(DomainError::invariant("unit item does not match"));
        }
        let serial_number = validate::optional_text("serial number", input.serial_number.as_deref(), 100)?;
        if item.serial_number_required() && serial_number.is_none() {
            return Err(DomainError::validation(format!(
                "serial number is required for item {}",
                item.item_code()
            )));
        }
        Ok(Self {
            id,
            item_id: input.item_id,
            location_id: input.location_id,
            unit_code: validate::code("unit code", &input.unit_code, 50)?,
            serial_number,
            status: UnitStatus::Available,
            condition: input.condition,
            purchase_date: input.purchase_date,
            purchase_cost: validate::non_negative("purchase cost", input.purchase_cost)?,
            rental_count: 0,
            total_rental_days: 0,
            last_maintenance_date: None,
            notes: validate::optional_text("notes", input.notes.as_deref(), 1000)?,
            audit: AuditStamp::new(actor, now),
        })
    }

    pub fn id_typed(&self) -> UnitId {
        self.id
    }

    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    pub fn location_id(&self) -> LocationId {
        self.location_id
    }

    pub fn unit_code(&self) -> &str {
        &self.unit_code
    }

    pub fn serial_number(&self) -> Option<&str> {
        self.serial_number.as_deref()
    }

    pub fn status(&self) -> UnitStatus {
        self.status
    }

    pub fn condition(&self) -> UnitCondition {
        self.condition
    }

    pub fn rental_count(&self) -> u32 {
        self.rental_count
    }

    pub fn total_rental_days(&self) -> u32 {
        self.total_rental_days
    }

    pub fn last_maintenance_date(&self) -> Option<NaiveDate> {
        self.last_maintenance_date
    }

    pub fn audit(&self) -> &AuditStamp {
        &self.audit
    }

    pub fn is_available(&self) -> bool {
        self.audit.is_active && self.status == UnitStatus::Available
    }

    fn transition(&mut self, allowed_from: &[UnitStatus], to: UnitStatus, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.audit.is_active {
            return Err(DomainError::not_found(format!("inventory unit {}", self.id)));
        }
        if !allowed_from.contains(&self.status) {
            return Err(DomainError::invariant(format!(
                "cannot transition unit from {} to {to}",
                self.status
            )));
        }
        tracing::debug!(unit_id = %self.id, from = %self.status, %to, "unit status change");
        self.status = to;
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn rent_out(&mut self, days: u32, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        if days == 0 {
            return Err(DomainError::validation("rental days must be at least 1"));
        }
        self.transition(&[UnitStatus::Available], UnitStatus::Rented, actor, now)?;
        self.rental_count += 1;
        self.total_rental_days += days;
        Ok(())
    }

    /// Back from a rental; a unit returned in DAMAGED condition is parked as DAMAGED.
    pub fn return_from_rent(
        &mut self,
        condition: Option<UnitCondition>,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let to = match condition {
            Some(UnitCondition::Damaged) => UnitStatus::Damaged,
            _ => UnitStatus::Available,
        };
        self.transition(&[UnitStatus::Rented], to, actor, now)?;
        if let Some(condition) = condition {
            self.condition = condition;
        }
        Ok(())
    }

    pub fn mark_sold(&mut self, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.transition(&[UnitStatus::Available], UnitStatus::Sold, actor, now)
    }

    pub fn send_to_maintenance(&mut self, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.transition(
            &[UnitStatus::Available, UnitStatus::Damaged],
            UnitStatus::Maintenance,
            actor,
            now,
        )?;
        self.last_maintenance_date = Some(now.date_naive());
        Ok(())
    }

    pub fn return_from_maintenance(
        &mut self,
        condition: UnitCondition,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if condition == UnitCondition::Damaged {
            return Err(DomainError::validation("a unit cannot leave maintenance still damaged"));
        }
        self.transition(&[UnitStatus::Maintenance], UnitStatus::Available, actor, now)?;
        self.condition = condition;
        Ok(())
    }

    pub fn mark_damaged(&mut self, notes: Option<&str>, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.transition(
            &[UnitStatus::Available, UnitStatus::Rented, UnitStatus::Maintenance, UnitStatus::Damaged],
            UnitStatus::Damaged,
            actor,
            now,
        )?;
        self.condition = UnitCondition::Damaged;
        if let Some(notes) = validate::optional_text("notes", notes, 1000)? {
            self.notes = Some(notes);
        }
        Ok(())
    }

    pub fn retire(&mut self, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.transition(
            &[UnitStatus::Available, UnitStatus::Rented, UnitStatus::Maintenance, UnitStatus::Damaged],
            UnitStatus::Retired,
            actor,
            now,
        )
    }

    /// Edit location and notes of a unit that is not rented out or terminal.
    pub fn update_details(
        &mut self,
        location_id: LocationId,
        notes: Option<&str>,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if !self.audit.is_active {
            return Err(DomainError::not_found(format!("inventory unit {}", self.id)));
        }
        if self.status == UnitStatus::Rented || self.status.is_terminal() {
            return Err(DomainError::invariant(format!(
                "cannot edit a unit in status {}",
                self.status
            )));
        }
        self.notes = validate::optional_text("notes", notes, 1000)?;
        self.location_id = location_id;
        self.audit.touch(actor, now);
        Ok(())
    }

    /// Soft delete; a rented unit must come back first.
    pub fn delete(&mut self, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.audit.is_active {
            return Err(DomainError::not_found(format!("inventory unit {}", self.id)));
        }
        if self.status == UnitStatus::Rented {
            return Err(DomainError::invariant("cannot delete a rented unit"));
        }
        self.audit.deactivate(actor, now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::tests::rental_input;

    fn unit() -> InventoryUnit {
        let item = Item::create(ItemId::new(), &rental_input(), None, Utc::now()).unwrap();
        let input = UnitInput {
            item_id: item.id_typed(),
            location_id: LocationId::new(),
            unit_code: "tent-001".into(),
            serial_number: Some("SN-1".into()),
            condition: UnitCondition::New,
            purchase_date: None,
            purchase_cost: Money::from_major(300),
            notes: None,
        };
        InventoryUnit::create(UnitId::new(), &item, &input, None, Utc::now()).unwrap()
    }

    #[test]
    fn serial_required_by_item() {
        let item = Item::create(ItemId::new(), &rental_input(), None, Utc::now()).unwrap();
        let input = UnitInput {
            item_id: item.id_typed(),
            location_id: LocationId::new(),
            unit_code: "tent-002".into(),
            serial_number: None,
            condition: UnitCondition::New,
            purchase_date: None,
            purchase_cost: Money::zero(),
            notes: None,
        };
        assert!(matches!(
            InventoryUnit::create(UnitId::new(), &item, &input, None, Utc::now()),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn rental_cycle_updates_counters() {
        let mut u = unit();
        u.rent_out(3, None, Utc::now()).unwrap();
        assert_eq!(u.status(), UnitStatus::Rented);
        assert!(u.rent_out(1, None, Utc::now()).is_err());

        u.return_from_rent(Some(UnitCondition::Good), None, Utc::now()).unwrap();
        assert_eq!(u.status(), UnitStatus::Available);
        assert_eq!(u.condition(), UnitCondition::Good);
        assert_eq!((u.rental_count(), u.total_rental_days()), (1, 3));
    }

    #[test]
    fn damaged_return_goes_through_maintenance() {
        let mut u = unit();
        u.rent_out(1, None, Utc::now()).unwrap();
        u.return_from_rent(Some(UnitCondition::Damaged), None, Utc::now()).unwrap();
        assert_eq!(u.status(), UnitStatus::Damaged);

        u.send_to_maintenance(None, Utc::now()).unwrap();
        assert!(u.last_maintenance_date().is_some());
        u.return_from_maintenance(UnitCondition::Fair, None, Utc::now()).unwrap();
        assert!(u.is_available());
    }

    #[test]
    fn terminal_states_are_final() {
        let mut u = unit();
        u.mark_sold(None, Utc::now()).unwrap();
        for result in [
            u.clone().retire(None, Utc::now()),
            u.clone().mark_damaged(None, None, Utc::now()),
            u.clone().send_to_maintenance(None, Utc::now()),
        ] {
            assert!(matches!(result, Err(DomainError::InvariantViolation(_))));
        }

        let mut r = unit();
        r.retire(None, Utc::now()).unwrap();
        assert!(r.mark_sold(None, Utc::now()).is_err());
    }

    #[test]
    fn rented_unit_cannot_be_deleted() {
        let mut u = unit();
        u.rent_out(1, None, Utc::now()).unwrap();
        assert!(u.delete(None, Utc::now()).is_err());
    }
}
