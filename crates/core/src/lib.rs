//! `rentdesk-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the domain error model, money, pagination and the audit
//! columns shared by every entity.

pub mod audit;
pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod page;
pub mod validate;
pub mod value_object;

pub use audit::AuditStamp;
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{
    BrandId, CategoryId, CustomerId, ItemId, LineId, LocationId, ReturnId, ReturnLineId, RoleId,
    SettingId, StockLevelId, SupplierId, TransactionId, UnitId, UserId,
};
pub use money::{BasisPoints, Money};
pub use page::{Page, PageRequest};
pub use value_object::ValueObject;
