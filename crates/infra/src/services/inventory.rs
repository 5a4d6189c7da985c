//! Items, inventory units and stock levels.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{info, instrument};

use rentdesk_core::{
    CategoryId, DomainError, DomainResult, ItemId, LocationId, Page, PageRequest, StockLevelId, UnitId, UserId,
};
use rentdesk_inventory::{
    InventoryUnit, Item, ItemInput, ItemStatus, ItemType, StockInput, StockLevel, UnitCondition, UnitInput, UnitStatus,
};

use super::{ServiceResult, Stores, list_active, load_active};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemFilter {
    pub item_type: Option<ItemType>,
    pub item_status: Option<ItemStatus>,
    pub category_id: Option<CategoryId>,
    pub search: Option<String>,
}

impl ItemFilter {
    fn matches(&self, item: &Item) -> bool {
        let term = self.search.as_deref().map(|t| t.trim().to_lowercase()).unwrap_or_default();
        self.item_type.is_none_or(|t| item.item_type() == t)
            && self.item_status.is_none_or(|s| item.status() == s)
            && self.category_id.is_none_or(|c| item.category_id() == Some(c))
            && (term.is_empty()
                || item.item_code().to_lowercase().contains(&term)
                || item.item_name().to_lowercase().contains(&term))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UnitFilter {
    pub item_id: Option<ItemId>,
    pub location_id: Option<LocationId>,
    pub status: Option<UnitStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StockFilter {
    pub item_id: Option<ItemId>,
    pub location_id: Option<LocationId>,
}

#[derive(Clone)]
pub struct InventoryService {
    stores: Stores,
    write_lock: Arc<Mutex<()>>,
}

impl InventoryService {
    pub fn new(stores: Stores) -> Self {
        Self {
            stores,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Shared with the rental return service, which restocks units.
    pub(crate) fn write_lock(&self) -> Arc<Mutex<()>> {
        Arc::clone(&self.write_lock)
    }

    // ── items ───────────────────────────────────────────────────────────────

    /// Referenced category must be active; brand and supplier must exist.
    async fn check_item_references(&self, input: &ItemInput) -> ServiceResult<()> {
        if let Some(category_id) = input.category_id {
            load_active(&*self.stores.categories, category_id, "category").await?;
        }
        if let Some(brand_id) = input.brand_id {
            load_active(&*self.stores.brands, brand_id, "brand").await?;
        }
        if let Some(supplier_id) = input.supplier_id {
            load_active(&*self.stores.suppliers, supplier_id, "supplier").await?;
        }
        Ok(())
    }

    async fn ensure_unique_item_code(&self, id: ItemId, code: &str) -> ServiceResult<()> {
        let clash = self
            .stores
            .items
            .list()
            .await?
            .iter()
            .any(|i| i.id_typed() != id && i.item_code().eq_ignore_ascii_case(code));
        if clash {
            return Err(DomainError::conflict(format!("item code '{code}' already exists")).into());
        }
        Ok(())
    }

    #[instrument(skip(self, input), fields(code = %input.item_code), err)]
    pub async fn create_item(&self, input: &ItemInput, actor: Option<UserId>) -> ServiceResult<Item> {
        let _guard = self.write_lock.lock().await;
        let item = Item::create(ItemId::new(), input, actor, Utc::now())?;
        self.ensure_unique_item_code(item.id_typed(), item.item_code()).await?;
        self.check_item_references(input).await?;
        self.stores.items.upsert(&item).await?;
        info!(item_id = %item.id_typed(), "item created");
        Ok(item)
    }

    pub async fn get_item(&self, id: ItemId) -> ServiceResult<Item> {
        load_active(&*self.stores.items, id, "item").await
    }

    pub async fn item_by_code(&self, code: &str) -> ServiceResult<Item> {
        list_active(&*self.stores.items)
            .await?
            .into_iter()
            .find(|i| i.item_code().eq_ignore_ascii_case(code.trim()))
            .ok_or_else(|| DomainError::not_found(format!("item code '{code}'")).into())
    }

    pub async fn list_items(&self, filter: &ItemFilter, page: PageRequest) -> ServiceResult<Page<Item>> {
        let mut items: Vec<Item> = list_active(&*self.stores.items)
            .await?
            .into_iter()
            .filter(|i| filter.matches(i))
            .collect();
        items.sort_by(|a, b| a.item_code().cmp(b.item_code()));
        Ok(Page::from_vec(items, page))
    }

    pub async fn rentable_items(&self) -> ServiceResult<Vec<Item>> {
        let mut items: Vec<Item> = list_active(&*self.stores.items)
            .await?
            .into_iter()
            .filter(Item::can_be_rented)
            .collect();
        items.sort_by(|a, b| a.item_code().cmp(b.item_code()));
        Ok(items)
    }

    pub async fn sellable_items(&self) -> ServiceResult<Vec<Item>> {
        let mut items: Vec<Item> = list_active(&*self.stores.items)
            .await?
            .into_iter()
            .filter(Item::can_be_sold)
            .collect();
        items.sort_by(|a, b| a.item_code().cmp(b.item_code()));
        Ok(items)
    }

    #[instrument(skip(self, input), fields(item_id = %id), err)]
    pub async fn update_item(&self, id: ItemId, input: &ItemInput, actor: Option<UserId>) -> ServiceResult<Item> {
        let _guard = self.write_lock.lock().await;
        let mut item = load_active(&*self.stores.items, id, "item").await?;
        item.update(input, actor, Utc::now())?;
        self.ensure_unique_item_code(id, item.item_code()).await?;
        self.check_item_references(input).await?;
        self.stores.items.upsert(&item).await?;
        Ok(item)
    }

    #[instrument(skip(self), fields(item_id = %id), err)]
    pub async fn delete_item(&self, id: ItemId, actor: Option<UserId>) -> ServiceResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut item = load_active(&*self.stores.items, id, "item").await?;
        let units = list_active(&*self.stores.units)
            .await?
            .iter()
            .filter(|u| u.item_id() == id)
            .count();
        item.delete(units, actor, Utc::now())?;
        self.stores.items.upsert(&item).await?;
        info!(item_id = %id, "item deleted");
        Ok(())
    }

    // ── units ───────────────────────────────────────────────────────────────

    async fn ensure_unique_unit(&self, unit: &InventoryUnit) -> ServiceResult<()> {
        for other in self.stores.units.list().await? {
            if other.id_typed() == unit.id_typed() {
                continue;
            }
            if other.unit_code().eq_ignore_ascii_case(unit.unit_code()) {
                return Err(DomainError::conflict(format!("unit code '{}' already exists", unit.unit_code())).into());
            }
            if let (Some(a), Some(b)) = (other.serial_number(), unit.serial_number()) {
                if a == b {
                    return Err(DomainError::conflict(format!("serial number '{b}' already exists")).into());
                }
            }
        }
        Ok(())
    }

    async fn with_unit<F>(&self, id: UnitId, apply: F) -> ServiceResult<InventoryUnit>
    where
        F: FnOnce(&mut InventoryUnit) -> DomainResult<()>,
    {
        let _guard = self.write_lock.lock().await;
        let mut unit = load_active(&*self.stores.units, id, "inventory unit").await?;
        let before = unit.status();
        apply(&mut unit)?;
        self.stores.units.upsert(&unit).await?;
        if before != unit.status() {
            info!(unit_id = %id, from = %before, to = %unit.status(), "unit status changed");
        }
        Ok(unit)
    }

    #[instrument(skip(self, input), fields(code = %input.unit_code), err)]
    pub async fn create_unit(&self, input: &UnitInput, actor: Option<UserId>) -> ServiceResult<InventoryUnit> {
        let _guard = self.write_lock.lock().await;
        let item = load_active(&*self.stores.items, input.item_id, "item").await?;
        load_active(&*self.stores.locations, input.location_id, "location").await?;
        let unit = InventoryUnit::create(UnitId::new(), &item, input, actor, Utc::now())?;
        self.ensure_unique_unit(&unit).await?;
        self.stores.units.upsert(&unit).await?;
        info!(unit_id = %unit.id_typed(), item_id = %item.id_typed(), "inventory unit created");
        Ok(unit)
    }

    pub async fn get_unit(&self, id: UnitId) -> ServiceResult<InventoryUnit> {
        load_active(&*self.stores.units, id, "inventory unit").await
    }

    pub async fn list_units(&self, filter: &UnitFilter, page: PageRequest) -> ServiceResult<Page<InventoryUnit>> {
        let mut units: Vec<InventoryUnit> = list_active(&*self.stores.units)
            .await?
            .into_iter()
            .filter(|u| {
                filter.item_id.is_none_or(|i| u.item_id() == i)
                    && filter.location_id.is_none_or(|l| u.location_id() == l)
                    && filter.status.is_none_or(|s| u.status() == s)
            })
            .collect();
        units.sort_by(|a, b| a.unit_code().cmp(b.unit_code()));
        Ok(Page::from_vec(units, page))
    }

    pub async fn available_units(&self, item_id: ItemId) -> ServiceResult<Vec<InventoryUnit>> {
        let mut units: Vec<InventoryUnit> = list_active(&*self.stores.units)
            .await?
            .into_iter()
            .filter(|u| u.item_id() == item_id && u.is_available())
            .collect();
        units.sort_by(|a, b| a.unit_code().cmp(b.unit_code()));
        Ok(units)
    }

    /// Rent out a unit; the rental length must respect the item's limits.
    #[instrument(skip(self), fields(unit_id = %id), err)]
    pub async fn rent_unit(&self, id: UnitId, days: u32, actor: Option<UserId>) -> ServiceResult<InventoryUnit> {
        let unit = self.get_unit(id).await?;
        let item = load_active(&*self.stores.items, unit.item_id(), "item").await?;
        if !item.can_be_rented() {
            return Err(DomainError::invariant(format!("item {} cannot be rented", item.item_code())).into());
        }
        item.check_rental_days(days)?;
        self.with_unit(id, |u| u.rent_out(days, actor, Utc::now())).await
    }

    #[instrument(skip(self), fields(unit_id = %id), err)]
    pub async fn return_unit(
        &self,
        id: UnitId,
        condition: Option<UnitCondition>,
        actor: Option<UserId>,
    ) -> ServiceResult<InventoryUnit> {
        self.with_unit(id, |u| u.return_from_rent(condition, actor, Utc::now())).await
    }

    #[instrument(skip(self), fields(unit_id = %id), err)]
    pub async fn sell_unit(&self, id: UnitId, actor: Option<UserId>) -> ServiceResult<InventoryUnit> {
        self.with_unit(id, |u| u.mark_sold(actor, Utc::now())).await
    }

    #[instrument(skip(self), fields(unit_id = %id), err)]
    pub async fn send_unit_to_maintenance(&self, id: UnitId, actor: Option<UserId>) -> ServiceResult<InventoryUnit> {
        self.with_unit(id, |u| u.send_to_maintenance(actor, Utc::now())).await
    }

    #[instrument(skip(self), fields(unit_id = %id), err)]
    pub async fn complete_unit_maintenance(
        &self,
        id: UnitId,
        condition: UnitCondition,
        actor: Option<UserId>,
    ) -> ServiceResult<InventoryUnit> {
        self.with_unit(id, |u| u.return_from_maintenance(condition, actor, Utc::now()))
            .await
    }

    #[instrument(skip(self, notes), fields(unit_id = %id), err)]
    pub async fn mark_unit_damaged(
        &self,
        id: UnitId,
        notes: Option<&str>,
        actor: Option<UserId>,
    ) -> ServiceResult<InventoryUnit> {
        self.with_unit(id, |u| u.mark_damaged(notes, actor, Utc::now())).await
    }

    #[instrument(skip(self), fields(unit_id = %id), err)]
    pub async fn retire_unit(&self, id: UnitId, actor: Option<UserId>) -> ServiceResult<InventoryUnit> {
        self.with_unit(id, |u| u.retire(actor, Utc::now())).await
    }

    #[instrument(skip(self, notes), fields(unit_id = %id), err)]
    pub async fn update_unit(
        &self,
        id: UnitId,
        location_id: LocationId,
        notes: Option<&str>,
        actor: Option<UserId>,
    ) -> ServiceResult<InventoryUnit> {
        load_active(&*self.stores.locations, location_id, "location").await?;
        self.with_unit(id, |u| u.update_details(location_id, notes, actor, Utc::now()))
            .await
    }

    #[instrument(skip(self), fields(unit_id = %id), err)]
    pub async fn delete_unit(&self, id: UnitId, actor: Option<UserId>) -> ServiceResult<()> {
        self.with_unit(id, |u| u.delete(actor, Utc::now())).await?;
        info!(unit_id = %id, "inventory unit deleted");
        Ok(())
    }

    // ── stock ───────────────────────────────────────────────────────────────

    async fn with_stock<F>(&self, id: StockLevelId, apply: F) -> ServiceResult<StockLevel>
    where
        F: FnOnce(&mut StockLevel) -> DomainResult<()>,
    {
        let _guard = self.write_lock.lock().await;
        let mut stock = load_active(&*self.stores.stock, id, "stock level").await?;
        apply(&mut stock)?;
        self.stores.stock.upsert(&stock).await?;
        Ok(stock)
    }

    #[instrument(skip(self, input), fields(item_id = %input.item_id, location_id = %input.location_id), err)]
    pub async fn create_stock(&self, input: &StockInput, actor: Option<UserId>) -> ServiceResult<StockLevel> {
        let _guard = self.write_lock.lock().await;
        load_active(&*self.stores.items, input.item_id, "item").await?;
        load_active(&*self.stores.locations, input.location_id, "location").await?;
        let exists = list_active(&*self.stores.stock)
            .await?
            .iter()
            .any(|s| s.item_id() == input.item_id && s.location_id() == input.location_id);
        if exists {
            return Err(DomainError::conflict("stock level already exists for this item and location").into());
        }
        let stock = StockLevel::create(StockLevelId::new(), input, actor, Utc::now())?;
        self.stores.stock.upsert(&stock).await?;
        info!(stock_id = %stock.id_typed(), "stock level created");
        Ok(stock)
    }

    pub async fn get_stock(&self, id: StockLevelId) -> ServiceResult<StockLevel> {
        load_active(&*self.stores.stock, id, "stock level").await
    }

    pub async fn list_stock(&self, filter: &StockFilter, page: PageRequest) -> ServiceResult<Page<StockLevel>> {
        let stock: Vec<StockLevel> = list_active(&*self.stores.stock)
            .await?
            .into_iter()
            .filter(|s| {
                filter.item_id.is_none_or(|i| s.item_id() == i)
                    && filter.location_id.is_none_or(|l| s.location_id() == l)
            })
            .collect();
        Ok(Page::from_vec(stock, page))
    }

    /// Stock at or below its minimum or reorder point.
    pub async fn low_stock(&self) -> ServiceResult<Vec<StockLevel>> {
        Ok(list_active(&*self.stores.stock)
            .await?
            .into_iter()
            .filter(|s| s.is_below_minimum() || s.needs_reorder())
            .collect())
    }

    #[instrument(skip(self, input), fields(stock_id = %id), err)]
    pub async fn update_stock(&self, id: StockLevelId, input: &StockInput, actor: Option<UserId>) -> ServiceResult<StockLevel> {
        self.with_stock(id, |s| s.update_thresholds(input, actor, Utc::now())).await
    }

    #[instrument(skip(self, reason), fields(stock_id = %id), err)]
    pub async fn adjust_stock(
        &self,
        id: StockLevelId,
        delta: i64,
        reason: &str,
        actor: Option<UserId>,
    ) -> ServiceResult<StockLevel> {
        let stock = self.with_stock(id, |s| s.adjust(delta, reason, actor, Utc::now())).await?;
        info!(stock_id = %id, delta, on_hand = stock.on_hand(), "stock adjusted");
        Ok(stock)
    }

    #[instrument(skip(self), fields(stock_id = %id), err)]
    pub async fn reserve_stock(&self, id: StockLevelId, qty: i64, actor: Option<UserId>) -> ServiceResult<StockLevel> {
        self.with_stock(id, |s| s.reserve(qty, actor, Utc::now())).await
    }

    #[instrument(skip(self), fields(stock_id = %id), err)]
    pub async fn release_stock(&self, id: StockLevelId, qty: i64, actor: Option<UserId>) -> ServiceResult<StockLevel> {
        self.with_stock(id, |s| s.release(qty, actor, Utc::now())).await
    }

    #[instrument(skip(self), fields(stock_id = %id), err)]
    pub async fn receive_stock(&self, id: StockLevelId, qty: i64, actor: Option<UserId>) -> ServiceResult<StockLevel> {
        self.with_stock(id, |s| s.receive(qty, actor, Utc::now())).await
    }

    #[instrument(skip(self), fields(stock_id = %id), err)]
    pub async fn delete_stock(&self, id: StockLevelId, actor: Option<UserId>) -> ServiceResult<()> {
        self.with_stock(id, |s| s.delete(actor, Utc::now())).await?;
        info!(stock_id = %id, "stock level deleted");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rentdesk_catalog::{Location, LocationInput, LocationType};
    use rentdesk_core::Money;

    use crate::services::ServiceError;

    pub(crate) fn item_input(code: &str) -> ItemInput {
        ItemInput {
            item_code: code.to_string(),
            item_name: format!("{code} drill"),
            item_type: ItemType::Both,
            item_status: ItemStatus::Active,
            category_id: None,
            brand_id: None,
            supplier_id: None,
            description: None,
            model_number: None,
            purchase_price: Money::from_major(200),
            rental_price_per_day: Money::from_major(15),
            rental_price_per_week: Money::zero(),
            rental_price_per_month: Money::zero(),
            sale_price: Money::from_major(250),
            security_deposit: Money::from_major(100),
            min_rental_days: 1,
            max_rental_days: Some(30),
            serial_number_required: false,
            reorder_level: 0,
        }
    }

    pub(crate) async fn seed_location(stores: &Stores) -> Location {
        let input = LocationInput {
            code: "MAIN".to_string(),
            name: "Main store".to_string(),
            location_type: LocationType::Store,
            address: "1 High Street".to_string(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            country: "US".to_string(),
            postal_code: None,
            contact_number: None,
            email: None,
            manager_user_id: None,
        };
        let location = Location::create(LocationId::new(), &input, None, Utc::now()).unwrap();
        stores.locations.upsert(&location).await.unwrap();
        location
    }

    pub(crate) fn unit_input(item: &Item, location: &Location, code: &str) -> UnitInput {
        UnitInput {
            item_id: item.id_typed(),
            location_id: location.id_typed(),
            unit_code: code.to_string(),
            serial_number: None,
            condition: UnitCondition::Good,
            purchase_date: None,
            purchase_cost: Money::zero(),
            notes: None,
        }
    }

    fn stock_input(item: &Item, location: &Location) -> StockInput {
        StockInput {
            item_id: item.id_typed(),
            location_id: location.id_typed(),
            quantity_on_hand: 10,
            quantity_on_order: 0,
            minimum_quantity: 5,
            maximum_quantity: None,
            reorder_point: 3,
        }
    }

    #[tokio::test]
    async fn item_with_unknown_category_is_rejected() {
        let svc = InventoryService::new(Stores::in_memory());
        let mut input = item_input("DRL-1");
        input.category_id = Some(CategoryId::new());
        let err = svc.create_item(&input, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn item_with_units_cannot_be_deleted() {
        let stores = Stores::in_memory();
        let svc = InventoryService::new(stores.clone());
        let location = seed_location(&stores).await;
        let item = svc.create_item(&item_input("DRL-1"), None).await.unwrap();
        svc.create_unit(&unit_input(&item, &location, "U-1"), None).await.unwrap();

        let err = svc.delete_item(item.id_typed(), None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::InvariantViolation(_))));
    }

    #[tokio::test]
    async fn duplicate_unit_code_is_a_conflict() {
        let stores = Stores::in_memory();
        let svc = InventoryService::new(stores.clone());
        let location = seed_location(&stores).await;
        let item = svc.create_item(&item_input("DRL-1"), None).await.unwrap();
        svc.create_unit(&unit_input(&item, &location, "U-1"), None).await.unwrap();

        let err = svc
            .create_unit(&unit_input(&item, &location, "u-1"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn rented_unit_leaves_the_available_list_until_returned() {
        let stores = Stores::in_memory();
        let svc = InventoryService::new(stores.clone());
        let location = seed_location(&stores).await;
        let item = svc.create_item(&item_input("DRL-1"), None).await.unwrap();
        let unit = svc.create_unit(&unit_input(&item, &location, "U-1"), None).await.unwrap();

        svc.rent_unit(unit.id_typed(), 3, None).await.unwrap();
        assert!(svc.available_units(item.id_typed()).await.unwrap().is_empty());

        let back = svc
            .return_unit(unit.id_typed(), Some(UnitCondition::Damaged), None)
            .await
            .unwrap();
        assert_eq!(back.status(), UnitStatus::Damaged);
        assert!(svc.available_units(item.id_typed()).await.unwrap().is_empty());

        svc.send_unit_to_maintenance(unit.id_typed(), None).await.unwrap();
        svc.complete_unit_maintenance(unit.id_typed(), UnitCondition::Good, None)
            .await
            .unwrap();
        assert_eq!(svc.available_units(item.id_typed()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rental_longer_than_item_maximum_is_rejected() {
        let stores = Stores::in_memory();
        let svc = InventoryService::new(stores.clone());
        let location = seed_location(&stores).await;
        let item = svc.create_item(&item_input("DRL-1"), None).await.unwrap();
        let unit = svc.create_unit(&unit_input(&item, &location, "U-1"), None).await.unwrap();

        let err = svc.rent_unit(unit.id_typed(), 45, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn one_stock_level_per_item_and_location() {
        let stores = Stores::in_memory();
        let svc = InventoryService::new(stores.clone());
        let location = seed_location(&stores).await;
        let item = svc.create_item(&item_input("DRL-1"), None).await.unwrap();
        let stock = svc.create_stock(&stock_input(&item, &location), None).await.unwrap();

        let err = svc
            .create_stock(&stock_input(&item, &location), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Conflict(_))));

        svc.adjust_stock(stock.id_typed(), -8, "cycle count", None).await.unwrap();
        let low = svc.low_stock().await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].on_hand(), 2);
    }
}
