//! Application services: load documents, apply domain operations, persist.
//!
//! Services are auth-agnostic. Permission checks happen at the API boundary;
//! services receive the acting user id only to stamp audit fields.

pub mod auth;
pub mod catalog;
pub mod inventory;
pub mod parties;
pub mod rentals;
pub mod system;
pub mod transactions;

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use rentdesk_auth::{RbacAuditEntry, RoleRecord, User};
use rentdesk_catalog::{Brand, Category, Location};
use rentdesk_core::{DomainError, Entity};
use rentdesk_inventory::{InventoryUnit, Item, StockLevel};
use rentdesk_parties::{Customer, Supplier};
use rentdesk_system::Setting;
use rentdesk_transactions::{RentalReturn, Transaction};

use crate::store::{BatchWriter, Document, InMemoryDocumentStore, PostgresDocumentStore, Repository, StoreError};

pub use auth::{AdminSeed, AuthService, AuthSettings, LoginResult, RoleInput, RoleUpdate, UserFilter, UserInput, UserUpdate};
pub use catalog::{CatalogService, CategoryFilter, CategoryLineage};
pub use inventory::{InventoryService, ItemFilter, StockFilter, UnitFilter};
pub use parties::PartyService;
pub use rentals::{RentalService, ReturnFilter};
pub use system::{SystemInfo, SystemService};
pub use transactions::{TransactionFilter, TransactionService};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("authentication failed: {0}")]
    Unauthenticated(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Per-id result of a bulk request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkFailure {
    pub id: Uuid,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    pub success_count: usize,
    pub failure_count: usize,
    pub errors: Vec<BulkFailure>,
}

impl BulkOutcome {
    fn record(&mut self, id: Uuid, result: ServiceResult<()>) {
        match result {
            Ok(()) => self.success_count += 1,
            Err(err) => {
                self.failure_count += 1;
                self.errors.push(BulkFailure {
                    id,
                    message: err.to_string(),
                });
            }
        }
    }
}

/// One repository per collection.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn Repository<User>>,
    pub roles: Arc<dyn Repository<RoleRecord>>,
    pub rbac_audit: Arc<dyn Repository<RbacAuditEntry>>,
    pub categories: Arc<dyn Repository<Category>>,
    pub brands: Arc<dyn Repository<Brand>>,
    pub locations: Arc<dyn Repository<Location>>,
    pub customers: Arc<dyn Repository<Customer>>,
    pub suppliers: Arc<dyn Repository<Supplier>>,
    pub items: Arc<dyn Repository<Item>>,
    pub units: Arc<dyn Repository<InventoryUnit>>,
    pub stock: Arc<dyn Repository<StockLevel>>,
    pub transactions: Arc<dyn Repository<Transaction>>,
    pub returns: Arc<dyn Repository<RentalReturn>>,
    pub settings: Arc<dyn Repository<Setting>>,
    /// Atomic writes across the collections above.
    pub batch: Arc<dyn BatchWriter>,
}

impl Stores {
    pub fn in_memory() -> Self {
        let store = InMemoryDocumentStore::new();
        Self {
            users: Arc::new(store.repository()),
            roles: Arc::new(store.repository()),
            rbac_audit: Arc::new(store.repository()),
            categories: Arc::new(store.repository()),
            brands: Arc::new(store.repository()),
            locations: Arc::new(store.repository()),
            customers: Arc::new(store.repository()),
            suppliers: Arc::new(store.repository()),
            items: Arc::new(store.repository()),
            units: Arc::new(store.repository()),
            stock: Arc::new(store.repository()),
            transactions: Arc::new(store.repository()),
            returns: Arc::new(store.repository()),
            settings: Arc::new(store.repository()),
            batch: Arc::new(store),
        }
    }

    pub fn postgres(store: &PostgresDocumentStore) -> Self {
        Self {
            users: Arc::new(store.repository()),
            roles: Arc::new(store.repository()),
            rbac_audit: Arc::new(store.repository()),
            categories: Arc::new(store.repository()),
            brands: Arc::new(store.repository()),
            locations: Arc::new(store.repository()),
            customers: Arc::new(store.repository()),
            suppliers: Arc::new(store.repository()),
            items: Arc::new(store.repository()),
            units: Arc::new(store.repository()),
            stock: Arc::new(store.repository()),
            transactions: Arc::new(store.repository()),
            returns: Arc::new(store.repository()),
            settings: Arc::new(store.repository()),
            batch: Arc::new(store.clone()),
        }
    }
}

/// Every service, wired over one set of stores.
#[derive(Clone)]
pub struct Services {
    pub auth: AuthService,
    pub catalog: CatalogService,
    pub parties: PartyService,
    pub inventory: InventoryService,
    pub transactions: TransactionService,
    pub rentals: RentalService,
    pub system: SystemService,
}

impl Services {
    pub fn new(stores: Stores, auth: AuthSettings) -> Self {
        let transactions = TransactionService::new(stores.clone());
        let inventory = InventoryService::new(stores.clone());
        Self {
            auth: AuthService::new(stores.clone(), auth),
            catalog: CatalogService::new(stores.clone()),
            parties: PartyService::new(stores.clone()),
            system: SystemService::new(stores.clone()),
            rentals: RentalService::new(stores, transactions.write_lock(), inventory.write_lock()),
            inventory,
            transactions,
        }
    }
}

/// Load a document that must exist (soft-deleted ones included).
pub(crate) async fn load<T>(repo: &dyn Repository<T>, id: T::Key, what: &str) -> ServiceResult<T>
where
    T: Document,
{
    let uuid: Uuid = id.into();
    repo.get(id)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("{what} {uuid}")).into())
}

/// Load a document that must exist and not be soft-deleted.
pub(crate) async fn load_active<T>(repo: &dyn Repository<T>, id: T::Key, what: &str) -> ServiceResult<T>
where
    T: Document + Entity,
{
    let uuid: Uuid = id.into();
    match repo.get(id).await? {
        Some(doc) if doc.is_active() => Ok(doc),
        _ => Err(DomainError::not_found(format!("{what} {uuid}")).into()),
    }
}

/// Active documents only.
pub(crate) async fn list_active<T>(repo: &dyn Repository<T>) -> ServiceResult<Vec<T>>
where
    T: Document + Entity,
{
    Ok(repo.list().await?.into_iter().filter(|doc| doc.is_active()).collect())
}
