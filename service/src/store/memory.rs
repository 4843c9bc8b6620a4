use std::collections::HashMap;

use async_trait::async_trait;
use libs::{Collection, DocumentField};
use tokio::sync::RwLock;

use super::{field_matches, string_field, Document, DocumentStore, StoreError};

#[derive(Default)]
struct Collections {
    documents: HashMap<Collection, Vec<Document>>,
    current_id: HashMap<Collection, u64>,
}

impl Collections {
    fn next_id(&mut self, collection: Collection) -> String {
        let current = self.current_id.entry(collection).or_insert(0);
        *current += 1;
        format!("{:04}", *current)
    }

    fn push(&mut self, collection: Collection, mut doc: Document) -> String {
        let id = self.next_id(collection);
        doc.insert(DocumentField::Id.to_string(), serde_json::json!(id));
        self.documents.entry(collection).or_default().push(doc);
        id
    }

    fn position(&self, collection: Collection, id: &str) -> Option<usize> {
        self.documents
            .get(&collection)?
            .iter()
            .position(|doc| field_matches(doc, DocumentField::Id, id))
    }
}

/// In-process store with the same semantics as [`super::RedisStore`]. Used
/// when no Redis URL is configured and by the tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_all(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .documents
            .get(&collection)
            .cloned()
            .unwrap_or_default())
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .position(collection, id)
            .and_then(|index| inner.documents.get(&collection)?.get(index).cloned()))
    }

    async fn insert(&self, collection: Collection, doc: Document) -> Result<String, StoreError> {
        let mut inner = self.inner.write().await;
        Ok(inner.push(collection, doc))
    }

    async fn insert_unique(
        &self,
        collection: Collection,
        field: DocumentField,
        doc: Document,
    ) -> Result<String, StoreError> {
        let value = string_field(&doc, field)?;
        let mut inner = self.inner.write().await;
        let taken = inner
            .documents
            .get(&collection)
            .map(|docs| docs.iter().any(|d| field_matches(d, field, &value)))
            .unwrap_or(false);
        if taken {
            return Err(StoreError::Conflict {
                collection,
                field: field.to_string(),
            });
        }
        Ok(inner.push(collection, doc))
    }

    async fn update_fields(
        &self,
        collection: Collection,
        id: &str,
        fields: Document,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let not_found = || StoreError::NotFound {
            collection,
            id: id.to_string(),
        };
        let index = inner.position(collection, id).ok_or_else(not_found)?;
        let doc = inner
            .documents
            .get_mut(&collection)
            .and_then(|docs| docs.get_mut(index))
            .ok_or_else(not_found)?;
        doc.extend(fields);
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.position(collection, id) {
            Some(index) => {
                if let Some(docs) = inner.documents.get_mut(&collection) {
                    docs.remove(index);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_by_field(
        &self,
        collection: Collection,
        field: DocumentField,
        value: &str,
    ) -> Result<Vec<Document>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .documents
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| field_matches(doc, field, value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc(value: serde_json::Value) -> Document {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[tokio::test]
    async fn ids_are_assigned_per_collection() {
        let store = MemoryStore::new();
        let first = store
            .insert(Collection::Todos, doc(json!({"task": "a"})))
            .await
            .unwrap();
        let second = store
            .insert(Collection::Todos, doc(json!({"task": "b"})))
            .await
            .unwrap();
        let user = store
            .insert(Collection::Users, doc(json!({"email": "a@b.c"})))
            .await
            .unwrap();

        assert_eq!(first, "0001");
        assert_eq!(second, "0002");
        assert_eq!(user, "0001");
        let stored = store.get(Collection::Todos, &second).await.unwrap().unwrap();
        assert_eq!(stored["id"], "0002");
        assert_eq!(stored["task"], "b");
    }

    #[tokio::test]
    async fn update_overwrites_only_given_fields() {
        let store = MemoryStore::new();
        let id = store
            .insert(Collection::Todos, doc(json!({"task": "a", "priority": "low"})))
            .await
            .unwrap();

        store
            .update_fields(Collection::Todos, &id, doc(json!({"priority": "high"})))
            .await
            .unwrap();

        let stored = store.get(Collection::Todos, &id).await.unwrap().unwrap();
        assert_eq!(stored["task"], "a");
        assert_eq!(stored["priority"], "high");
    }

    #[tokio::test]
    async fn update_of_missing_document_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update_fields(Collection::Todos, "0042", doc(json!({"task": "x"})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn delete_reports_whether_something_went() {
        let store = MemoryStore::new();
        let id = store
            .insert(Collection::Todos, doc(json!({"task": "a"})))
            .await
            .unwrap();

        assert!(store.delete(Collection::Todos, &id).await.unwrap());
        assert!(!store.delete(Collection::Todos, &id).await.unwrap());
        assert!(store.list_all(Collection::Todos).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unique_insert_rejects_duplicates() {
        let store = MemoryStore::new();
        store
            .insert_unique(
                Collection::Users,
                DocumentField::Email,
                doc(json!({"email": "ann@example.com"})),
            )
            .await
            .unwrap();

        let err = store
            .insert_unique(
                Collection::Users,
                DocumentField::Email,
                doc(json!({"email": "ann@example.com"})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        let found = store
            .find_by_field(Collection::Users, DocumentField::Email, "ann@example.com")
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }
}
