use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use uuid::Uuid;

/// Storage-level failures. Domain rule violations never surface here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage backend failure: {0}")]
    Backend(String),

    #[error("document (de)serialization failed: {0}")]
    Serialization(String),
}

/// An entity that can be persisted as a document.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection (table partition) the document lives in.
    const COLLECTION: &'static str;

    type Key: Copy + Into<Uuid> + Send + Sync;

    fn document_id(&self) -> Uuid;
}

/// Whole-document repository for one collection.
///
/// Soft-deleted entities stay in the store; filtering on `is_active` is the
/// caller's job.
#[async_trait::async_trait]
pub trait Repository<T: Document>: Send + Sync {
    async fn get(&self, id: T::Key) -> Result<Option<T>, StoreError>;

    /// Every document in the collection, ordered by id (creation order for v7 ids).
    async fn list(&self) -> Result<Vec<T>, StoreError>;

    async fn upsert(&self, doc: &T) -> Result<(), StoreError>;

    /// Write several documents atomically: all or none become visible.
    async fn upsert_many(&self, docs: &[T]) -> Result<(), StoreError>;

    /// Hard delete. Returns whether a document was removed.
    async fn delete(&self, id: T::Key) -> Result<bool, StoreError>;
}

#[async_trait::async_trait]
impl<T, R> Repository<T> for Arc<R>
where
    T: Document,
    R: Repository<T> + ?Sized,
{
    async fn get(&self, id: T::Key) -> Result<Option<T>, StoreError> {
        (**self).get(id).await
    }

    async fn list(&self) -> Result<Vec<T>, StoreError> {
        (**self).list().await
    }

    async fn upsert(&self, doc: &T) -> Result<(), StoreError> {
        (**self).upsert(doc).await
    }

    async fn upsert_many(&self, docs: &[T]) -> Result<(), StoreError> {
        (**self).upsert_many(docs).await
    }

    async fn delete(&self, id: T::Key) -> Result<bool, StoreError> {
        (**self).delete(id).await
    }
}
