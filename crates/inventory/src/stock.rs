//! Stock quantities per item and location.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rentdesk_core::{AuditStamp, DomainError, DomainResult, Entity, ItemId, LocationId, StockLevelId, UserId, validate};

#[derive(Debug, Clone, Deserialize)]
pub struct StockInput {
    pub item_id: ItemId,
    pub location_id: LocationId,
    #[serde(default)]
    pub quantity_on_hand: i64,
    #[serde(default)]
    pub quantity_on_order: i64,
    #[serde(default)]
    pub minimum_quantity: i64,
    #[serde(default)]
    pub maximum_quantity: Option<i64>,
    #[serde(default)]
    pub reorder_point: i64,
}

/// Last manual adjustment, kept for traceability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub delta: i64,
    pub reason: String,
    pub at: DateTime<Utc>,
    pub by: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    id: StockLevelId,
    item_id: ItemId,
    location_id: LocationId,
    quantity_on_hand: i64,
    quantity_reserved: i64,
    quantity_on_order: i64,
    minimum_quantity: i64,
    maximum_quantity: Option<i64>,
    reorder_point: i64,
    last_adjustment: Option<StockAdjustment>,
    audit: AuditStamp,
}

impl Entity for StockLevel {
    type Id = StockLevelId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn is_active(&self) -> bool {
        self.audit.is_active
    }
}

fn non_negative_qty(field: &str, qty: i64) -> DomainResult<i64> {
    if qty < 0 {
        return Err(DomainError::validation(format!("{field} cannot be negative")));
    }
    Ok(qty)
}

fn positive_qty(qty: i64) -> DomainResult<i64> {
    if qty <= 0 {
        return Err(DomainError::validation("quantity must be positive"));
    }
    Ok(qty)
}

impl StockLevel {
    /// One stock level per (item, location); uniqueness is checked by the caller.
    pub fn create(id: StockLevelId, input: &StockInput, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<Self> {
        let mut level = Self {
            id,
            item_id: input.item_id,
            location_id: input.location_id,
            quantity_on_hand: non_negative_qty("quantity on hand", input.quantity_on_hand)?,
            quantity_reserved: 0,
            quantity_on_order: 0,
            minimum_quantity: 0,
            maximum_quantity: None,
            reorder_point: 0,
            last_adjustment: None,
            audit: AuditStamp::new(actor, now),
        };
        level.apply_thresholds(input)?;
        Ok(level)
    }

    fn apply_thresholds(&mut self, input: &StockInput) -> DomainResult<()> {
        let on_order = non_negative_qty("quantity on order", input.quantity_on_order)?;
        let minimum = non_negative_qty("minimum quantity", input.minimum_quantity)?;
        let reorder_point = non_negative_qty("reorder point", input.reorder_point)?;
        let maximum = input
            .maximum_quantity
            .map(|max| non_negative_qty("maximum quantity", max))
            .transpose()?;
        if maximum.is_some_and(|max| max < minimum) {
            return Err(DomainError::validation(
                "maximum quantity cannot be less than minimum quantity",
            ));
        }
        self.quantity_on_order = on_order;
        self.minimum_quantity = minimum;
        self.maximum_quantity = maximum;
        self.reorder_point = reorder_point;
        Ok(())
    }

    pub fn id_typed(&self) -> StockLevelId {
        self.id
    }

    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    pub fn location_id(&self) -> LocationId {
        self.location_id
    }

    pub fn on_hand(&self) -> i64 {
        self.quantity_on_hand
    }

    pub fn reserved(&self) -> i64 {
        self.quantity_reserved
    }

    pub fn on_order(&self) -> i64 {
        self.quantity_on_order
    }

    pub fn last_adjustment(&self) -> Option<&StockAdjustment> {
        self.last_adjustment.as_ref()
    }

    pub fn audit(&self) -> &AuditStamp {
        &self.audit
    }

    /// On hand minus reserved, never below zero.
    pub fn available(&self) -> i64 {
        (self.quantity_on_hand - self.quantity_reserved).max(0)
    }

    pub fn is_below_minimum(&self) -> bool {
        self.quantity_on_hand < self.minimum_quantity
    }

    pub fn needs_reorder(&self) -> bool {
        self.quantity_on_hand <= self.reorder_point
    }

    /// Threshold edits; quantities move only through the stock operations.
    pub fn update_thresholds(&mut self, input: &StockInput, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        if input.item_id != self.item_id || input.location_id != self.location_id {
            return Err(DomainError::invariant("stock level item and location cannot change"));
        }
        self.apply_thresholds(input)?;
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn adjust(&mut self, delta: i64, reason: &str, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        if delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }
        let reason = validate::required_text("reason", reason, 500)?;
        let next = self.quantity_on_hand + delta;
        if next < 0 {
            return Err(DomainError::invariant("stock cannot go negative"));
        }
        if next < self.quantity_reserved {
            return Err(DomainError::invariant("stock cannot drop below reserved quantity"));
        }
        self.quantity_on_hand = next;
        self.last_adjustment = Some(StockAdjustment {
            delta,
            reason,
            at: now,
            by: actor,
        });
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn reserve(&mut self, qty: i64, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        let qty = positive_qty(qty)?;
        if qty > self.available() {
            return Err(DomainError::invariant(format!(
                "cannot reserve {qty}, only {} available",
                self.available()
            )));
        }
        self.quantity_reserved += qty;
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn release(&mut self, qty: i64, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        let qty = positive_qty(qty)?;
        if qty > self.quantity_reserved {
            return Err(DomainError::invariant(format!(
                "cannot release {qty}, only {} reserved",
                self.quantity_reserved
            )));
        }
        self.quantity_reserved -= qty;
        self.audit.touch(actor, now);
        Ok(())
    }

    /// Goods received: on hand grows by `qty`, on order shrinks by as much as
    /// was outstanding.
    pub fn receive(&mut self, qty: i64, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        let qty = positive_qty(qty)?;
        self.quantity_on_order = (self.quantity_on_order - qty).max(0);
        self.quantity_on_hand += qty;
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn delete(&mut self, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        if self.quantity_reserved > 0 {
            return Err(DomainError::invariant("cannot delete stock with reservations"));
        }
        self.audit.deactivate(actor, now);
        Ok(())
    }

    fn ensure_active(&self) -> DomainResult<()> {
        if !self.audit.is_active {
            return Err(DomainError::not_found(format!("stock level {}", self.id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn level(on_hand: i64) -> StockLevel {
        StockLevel::create(
            StockLevelId::new(),
            &StockInput {
                item_id: ItemId::new(),
                location_id: LocationId::new(),
                quantity_on_hand: on_hand,
                quantity_on_order: 5,
                minimum_quantity: 3,
                maximum_quantity: Some(50),
                reorder_point: 4,
            },
            None,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn reserve_and_release_track_availability() {
        let mut s = level(10);
        s.reserve(4, None, Utc::now()).unwrap();
        assert_eq!(s.available(), 6);
        assert!(s.reserve(7, None, Utc::now()).is_err());
        assert!(s.release(5, None, Utc::now()).is_err());
        s.release(4, None, Utc::now()).unwrap();
        assert_eq!(s.available(), 10);
    }

    #[test]
    fn adjust_cannot_go_negative() {
        let mut s = level(2);
        assert!(matches!(
            s.adjust(-3, "shrinkage", None, Utc::now()),
            Err(DomainError::InvariantViolation(_))
        ));
        s.adjust(-2, "shrinkage", None, Utc::now()).unwrap();
        assert_eq!(s.on_hand(), 0);
        assert!(s.is_below_minimum());
        assert!(s.needs_reorder());
        assert_eq!(s.last_adjustment().map(|a| a.delta), Some(-2));
    }

    #[test]
    fn receive_moves_on_order_to_on_hand() {
        let mut s = level(1);
        s.receive(3, None, Utc::now()).unwrap();
        assert_eq!((s.on_hand(), s.on_order()), (4, 2));
        s.receive(4, None, Utc::now()).unwrap();
        assert_eq!((s.on_hand(), s.on_order()), (8, 0));
    }

    #[test]
    fn maximum_must_cover_minimum() {
        let input = StockInput {
            item_id: ItemId::new(),
            location_id: LocationId::new(),
            quantity_on_hand: 0,
            quantity_on_order: 0,
            minimum_quantity: 10,
            maximum_quantity: Some(5),
            reorder_point: 0,
        };
        assert!(StockLevel::create(StockLevelId::new(), &input, None, Utc::now()).is_err());
    }

    proptest! {
        #[test]
        fn quantities_never_go_negative(ops in prop::collection::vec((0u8..4, -20i64..20), 1..50)) {
            let mut s = level(10);
            for (op, qty) in ops {
                let _ = match op {
                    0 => s.adjust(qty, "count", None, Utc::now()),
                    1 => s.reserve(qty, None, Utc::now()),
                    2 => s.release(qty, None, Utc::now()),
                    _ => s.receive(qty, None, Utc::now()),
                };
                prop_assert!(s.on_hand() >= 0);
                prop_assert!(s.reserved() >= 0);
                prop_assert!(s.reserved() <= s.on_hand());
                prop_assert!(s.on_order() >= 0);
            }
        }
    }
}
