use async_trait::async_trait;
use bb8_redis::redis;
use libs::{Collection, DocumentField};

pub mod memory;
pub mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// A stored document: a JSON object that carries its own `id` field.
pub type Document = serde_json::Map<String, serde_json::Value>;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Connection pool error: {0}")]
    PoolError(String),

    #[error("JSON error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("`{id}` not found in `{collection}`")]
    NotFound { collection: Collection, id: String },

    #[error("`{field}` already taken in `{collection}`")]
    Conflict { collection: Collection, field: String },

    #[error("document has no string `{0}` field")]
    MissingField(String),
}

/// Key-document store over named collections: whole-collection fetch,
/// insert, field-level update and delete by id, and equality lookup.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list_all(&self, collection: Collection) -> Result<Vec<Document>, StoreError>;

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError>;

    /// Stores `doc` under a fresh id and returns it.
    async fn insert(&self, collection: Collection, doc: Document) -> Result<String, StoreError>;

    /// Like [`DocumentStore::insert`], but fails with `Conflict` if another
    /// document already holds the same value for `field`.
    async fn insert_unique(
        &self,
        collection: Collection,
        field: DocumentField,
        doc: Document,
    ) -> Result<String, StoreError>;

    /// Overwrites only the given fields. `NotFound` when `id` is absent.
    async fn update_fields(
        &self,
        collection: Collection,
        id: &str,
        fields: Document,
    ) -> Result<(), StoreError>;

    /// Returns whether a document was removed.
    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError>;

    async fn find_by_field(
        &self,
        collection: Collection,
        field: DocumentField,
        value: &str,
    ) -> Result<Vec<Document>, StoreError>;
}

pub(crate) fn string_field(doc: &Document, field: DocumentField) -> Result<String, StoreError> {
    doc.get(&field.to_string())
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| StoreError::MissingField(field.to_string()))
}

pub(crate) fn field_matches(doc: &Document, field: DocumentField, value: &str) -> bool {
    doc.get(&field.to_string()).and_then(serde_json::Value::as_str) == Some(value)
}
