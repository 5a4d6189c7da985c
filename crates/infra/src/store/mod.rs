//! Document persistence boundary.
//!
//! Entities are stored whole, as JSON documents keyed by collection and id.
//! Services load, mutate through the domain API, then write back.

pub mod batch;
pub mod documents;
pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use batch::{BatchWriter, DocumentBatch};
pub use in_memory::{InMemoryDocumentStore, InMemoryRepository};
pub use postgres::{PostgresDocumentStore, PostgresRepository};
pub use r#trait::{Document, Repository, StoreError};
