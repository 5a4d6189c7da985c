//! Collection bindings for every persisted entity.

use uuid::Uuid;

use rentdesk_auth::{RbacAuditEntry, RoleRecord, User};
use rentdesk_catalog::{Brand, Category, Location};
use rentdesk_core::{
    BrandId, CategoryId, CustomerId, Entity, ItemId, LocationId, ReturnId, RoleId, SettingId, StockLevelId, SupplierId,
    TransactionId, UnitId, UserId,
};
use rentdesk_inventory::{InventoryUnit, Item, StockLevel};
use rentdesk_parties::{Customer, Supplier};
use rentdesk_system::Setting;
use rentdesk_transactions::{RentalReturn, Transaction};

use super::r#trait::Document;

macro_rules! entity_document {
    ($t:ty, $key:ty, $collection:literal) => {
        impl Document for $t {
            const COLLECTION: &'static str = $collection;
            type Key = $key;

            fn document_id(&self) -> Uuid {
                *Entity::id(self).as_uuid()
            }
        }
    };
}

entity_document!(User, UserId, "users");
entity_document!(RoleRecord, RoleId, "roles");
entity_document!(Category, CategoryId, "categories");
entity_document!(Brand, BrandId, "brands");
entity_document!(Location, LocationId, "locations");
entity_document!(Customer, CustomerId, "customers");
entity_document!(Supplier, SupplierId, "suppliers");
entity_document!(Item, ItemId, "items");
entity_document!(InventoryUnit, UnitId, "inventory_units");
entity_document!(StockLevel, StockLevelId, "stock_levels");
entity_document!(Transaction, TransactionId, "transactions");
entity_document!(RentalReturn, ReturnId, "rental_returns");
entity_document!(Setting, SettingId, "system_settings");

impl Document for RbacAuditEntry {
    const COLLECTION: &'static str = "rbac_audit";
    type Key = Uuid;

    fn document_id(&self) -> Uuid {
        self.id
    }
}
