//! Atomic writes spanning several collections.

use uuid::Uuid;

use super::r#trait::{Document, StoreError};

#[derive(Debug, Clone)]
pub(crate) struct BatchEntry {
    pub(crate) collection: &'static str,
    pub(crate) id: Uuid,
    pub(crate) body: serde_json::Value,
}

/// Documents queued for one atomic commit. Encoding happens on `put`, so a
/// batch that was built successfully cannot fail on serialization.
#[derive(Debug, Clone, Default)]
pub struct DocumentBatch {
    entries: Vec<BatchEntry>,
}

impl DocumentBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put<T: Document>(&mut self, doc: &T) -> Result<&mut Self, StoreError> {
        let body = serde_json::to_value(doc)
            .map_err(|e| StoreError::Serialization(format!("{}: {e}", T::COLLECTION)))?;
        self.entries.push(BatchEntry {
            collection: T::COLLECTION,
            id: doc.document_id(),
            body,
        });
        Ok(self)
    }

    pub fn put_all<'a, T: Document>(&mut self, docs: impl IntoIterator<Item = &'a T>) -> Result<&mut Self, StoreError> {
        for doc in docs {
            self.put(doc)?;
        }
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> Vec<BatchEntry> {
        self.entries
    }
}

/// Commits a batch: every document becomes visible, or none does.
#[async_trait::async_trait]
pub trait BatchWriter: Send + Sync {
    async fn commit(&self, batch: DocumentBatch) -> Result<(), StoreError>;
}
