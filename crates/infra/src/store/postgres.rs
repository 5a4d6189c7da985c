//! Postgres-backed document store.
//!
//! All collections share one table; the body is the serde JSON form of the
//! entity stored as JSONB.
//!
//! ## Error Mapping
//!
//! | SQLx Error | StoreError |
//! |------------|------------|
//! | Database (any code) | `Backend` with the code and message |
//! | PoolClosed | `Backend` |
//! | Decode / ColumnDecode | `Serialization` |
//! | Other | `Backend` |

use std::marker::PhantomData;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use super::batch::{BatchWriter, DocumentBatch};
use super::r#trait::{Document, Repository, StoreError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id UUID NOT NULL,
    body JSONB NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (collection, id)
)
"#;

const UPSERT: &str = r#"
INSERT INTO documents (collection, id, body, updated_at)
VALUES ($1, $2, $3, NOW())
ON CONFLICT (collection, id)
DO UPDATE SET body = EXCLUDED.body, updated_at = NOW()
"#;

/// Connection pool plus schema management; hands out typed repositories.
#[derive(Debug, Clone)]
pub struct PostgresDocumentStore {
    pool: Arc<PgPool>,
}

impl PostgresDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    pub fn repository<T: Document>(&self) -> PostgresRepository<T> {
        PostgresRepository {
            pool: Arc::clone(&self.pool),
            _doc: PhantomData,
        }
    }
}

#[async_trait::async_trait]
impl BatchWriter for PostgresDocumentStore {
    #[instrument(skip(self, batch), fields(count = batch.len()), err)]
    async fn commit(&self, batch: DocumentBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("commit_begin", e))?;
        for entry in batch.into_entries() {
            sqlx::query(UPSERT)
                .bind(entry.collection)
                .bind(entry.id)
                .bind(entry.body)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("commit", e))?;
        }
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_commit", e))?;
        Ok(())
    }
}

/// Typed view of one collection in the `documents` table.
#[derive(Debug)]
pub struct PostgresRepository<T> {
    pool: Arc<PgPool>,
    _doc: PhantomData<fn() -> T>,
}

impl<T> Clone for PostgresRepository<T> {
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
            _doc: PhantomData,
        }
    }
}

fn encode<T: Document>(doc: &T) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(doc).map_err(|e| StoreError::Serialization(format!("{}: {e}", T::COLLECTION)))
}

fn decode<T: Document>(row: &sqlx::postgres::PgRow) -> Result<T, StoreError> {
    let body: serde_json::Value = row.try_get("body").map_err(|e| map_sqlx_error("decode", e))?;
    serde_json::from_value(body).map_err(|e| StoreError::Serialization(format!("{}: {e}", T::COLLECTION)))
}

#[async_trait::async_trait]
impl<T: Document> Repository<T> for PostgresRepository<T> {
    #[instrument(skip(self, id), fields(collection = T::COLLECTION), err)]
    async fn get(&self, id: T::Key) -> Result<Option<T>, StoreError> {
        let id: Uuid = id.into();
        let row = sqlx::query("SELECT body FROM documents WHERE collection = $1 AND id = $2")
            .bind(T::COLLECTION)
            .bind(id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get", e))?;
        row.as_ref().map(decode::<T>).transpose()
    }

    #[instrument(skip(self), fields(collection = T::COLLECTION), err)]
    async fn list(&self) -> Result<Vec<T>, StoreError> {
        let rows = sqlx::query("SELECT body FROM documents WHERE collection = $1 ORDER BY id ASC")
            .bind(T::COLLECTION)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list", e))?;
        rows.iter().map(decode::<T>).collect()
    }

    #[instrument(skip(self, doc), fields(collection = T::COLLECTION, id = %doc.document_id()), err)]
    async fn upsert(&self, doc: &T) -> Result<(), StoreError> {
        sqlx::query(UPSERT)
            .bind(T::COLLECTION)
            .bind(doc.document_id())
            .bind(encode(doc)?)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("upsert", e))?;
        Ok(())
    }

    #[instrument(skip(self, docs), fields(collection = T::COLLECTION, count = docs.len()), err)]
    async fn upsert_many(&self, docs: &[T]) -> Result<(), StoreError> {
        if docs.is_empty() {
            return Ok(());
        }
        let encoded = docs
            .iter()
            .map(|d| Ok((d.document_id(), encode(d)?)))
            .collect::<Result<Vec<_>, StoreError>>()?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("upsert_many_begin", e))?;
        for (id, body) in encoded {
            sqlx::query(UPSERT)
                .bind(T::COLLECTION)
                .bind(id)
                .bind(body)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("upsert_many", e))?;
        }
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("upsert_many_commit", e))?;
        Ok(())
    }

    #[instrument(skip(self, id), fields(collection = T::COLLECTION), err)]
    async fn delete(&self, id: T::Key) -> Result<bool, StoreError> {
        let id: Uuid = id.into();
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(T::COLLECTION)
            .bind(id)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete", e))?;
        Ok(result.rows_affected() > 0)
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.to_string()).unwrap_or_default();
            StoreError::Backend(format!(
                "database error in {operation} ({code}): {}",
                db_err.message()
            ))
        }
        sqlx::Error::PoolClosed => StoreError::Backend(format!("connection pool closed in {operation}")),
        sqlx::Error::Decode(e) => StoreError::Serialization(format!("decode error in {operation}: {e}")),
        sqlx::Error::ColumnDecode { index, source } => {
            StoreError::Serialization(format!("column {index} decode error in {operation}: {source}"))
        }
        other => StoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}
