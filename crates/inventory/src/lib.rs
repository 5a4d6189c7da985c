//! Inventory domain: items, individually tracked units and stock levels.
//!
//! Deterministic domain logic only (no IO, no HTTP, no storage).

pub mod item;
pub mod stock;
pub mod unit;

pub use item::{Item, ItemInput, ItemStatus, ItemType};
pub use stock::{StockAdjustment, StockInput, StockLevel};
pub use unit::{InventoryUnit, UnitCondition, UnitInput, UnitStatus};
