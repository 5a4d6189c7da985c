use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, RwLock};

use uuid::Uuid;

use super::batch::{BatchWriter, DocumentBatch};
use super::r#trait::{Document, Repository, StoreError};

type Collections = HashMap<&'static str, HashMap<Uuid, serde_json::Value>>;

/// Every collection behind one lock, so a batch commits atomically.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentStore {
    inner: Arc<RwLock<Collections>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn repository<T: Document>(&self) -> InMemoryRepository<T> {
        InMemoryRepository {
            inner: Arc::clone(&self.inner),
            _doc: PhantomData,
        }
    }
}

#[async_trait::async_trait]
impl BatchWriter for InMemoryDocumentStore {
    async fn commit(&self, batch: DocumentBatch) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        for entry in batch.into_entries() {
            map.entry(entry.collection).or_default().insert(entry.id, entry.body);
        }
        Ok(())
    }
}

/// In-memory repository for tests/dev.
///
/// Documents are kept as serialized JSON so that a round trip through the
/// store behaves like the Postgres backend (no shared mutable state leaks).
#[derive(Debug)]
pub struct InMemoryRepository<T> {
    inner: Arc<RwLock<Collections>>,
    _doc: PhantomData<fn() -> T>,
}

impl<T: Document> InMemoryRepository<T> {
    pub fn new() -> Self {
        InMemoryDocumentStore::new().repository()
    }
}

impl<T: Document> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("in-memory store lock poisoned".to_string())
}

fn encode<T: Document>(doc: &T) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(doc).map_err(|e| StoreError::Serialization(format!("{}: {e}", T::COLLECTION)))
}

fn decode<T: Document>(value: &serde_json::Value) -> Result<T, StoreError> {
    serde_json::from_value(value.clone()).map_err(|e| StoreError::Serialization(format!("{}: {e}", T::COLLECTION)))
}

#[async_trait::async_trait]
impl<T: Document> Repository<T> for InMemoryRepository<T> {
    async fn get(&self, id: T::Key) -> Result<Option<T>, StoreError> {
        let key: Uuid = id.into();
        let map = self.inner.read().map_err(|_| poisoned())?;
        map.get(T::COLLECTION)
            .and_then(|docs| docs.get(&key))
            .map(decode::<T>)
            .transpose()
    }

    async fn list(&self) -> Result<Vec<T>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        let Some(docs) = map.get(T::COLLECTION) else {
            return Ok(Vec::new());
        };
        let mut entries: Vec<(&Uuid, &serde_json::Value)> = docs.iter().collect();
        entries.sort_by_key(|(id, _)| **id);
        entries.into_iter().map(|(_, v)| decode::<T>(v)).collect()
    }

    async fn upsert(&self, doc: &T) -> Result<(), StoreError> {
        let value = encode(doc)?;
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        map.entry(T::COLLECTION).or_default().insert(doc.document_id(), value);
        Ok(())
    }

    async fn upsert_many(&self, docs: &[T]) -> Result<(), StoreError> {
        // Encode everything before taking the lock so a failure writes nothing.
        let encoded = docs
            .iter()
            .map(|d| Ok((d.document_id(), encode(d)?)))
            .collect::<Result<Vec<_>, StoreError>>()?;
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        map.entry(T::COLLECTION).or_default().extend(encoded);
        Ok(())
    }

    async fn delete(&self, id: T::Key) -> Result<bool, StoreError> {
        let key: Uuid = id.into();
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        Ok(map
            .get_mut(T::COLLECTION)
            .is_some_and(|docs| docs.remove(&key).is_some()))
    }
}
