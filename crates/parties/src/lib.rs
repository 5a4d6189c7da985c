//! Parties: customers and suppliers.
//!
//! This crate contains business rules only, implemented as deterministic
//! domain logic (no IO, no HTTP, no storage).

pub mod contact;
pub mod customer;
pub mod supplier;

pub use contact::ContactInfo;
pub use customer::{
    BlacklistStatus, Customer, CustomerFilter, CustomerStatistics, CustomerStatus, CustomerTier, CustomerType,
    CustomerUpdate, NewCustomer,
};
pub use supplier::{
    PaymentTerms, Rating, Supplier, SupplierFilter, SupplierInput, SupplierStatistics, SupplierStatus, SupplierTier,
    SupplierType,
};
