use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{document_id, document_rev, next_revision, with_rev, DocumentStore, StoreError};

/// In-process document store, used when no database is configured and in tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    docs: Arc<RwLock<HashMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Value, StoreError> {
        let docs = self.docs.read().await;
        docs.get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn put(&self, doc: Value) -> Result<String, StoreError> {
        let id = document_id(&doc)?;
        let requested_rev = document_rev(&doc);

        let mut docs = self.docs.write().await;
        let current_rev = docs.get(&id).and_then(document_rev);

        if requested_rev != current_rev {
            return Err(StoreError::Conflict(id));
        }

        let rev = next_revision(current_rev.as_deref());
        docs.insert(id, with_rev(doc, &rev));
        Ok(rev)
    }

    async fn remove(&self, id: &str, rev: &str) -> Result<(), StoreError> {
        let mut docs = self.docs.write().await;
        let current_rev = match docs.get(id) {
            Some(doc) => document_rev(doc),
            None => return Err(StoreError::NotFound(id.to_string())),
        };

        if current_rev.as_deref() != Some(rev) {
            return Err(StoreError::Conflict(id.to_string()));
        }

        docs.remove(id);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<Value>, StoreError> {
        let docs = self.docs.read().await;
        let mut matching: Vec<(&String, &Value)> = docs
            .iter()
            .filter(|(id, _)| id.starts_with(prefix))
            .collect();
        matching.sort_by(|a, b| a.0.cmp(b.0));
        Ok(matching.into_iter().map(|(_, doc)| doc.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_then_update_with_current_revision() {
        let store = MemoryStore::new();

        let rev1 = store.put(json!({ "_id": "doc", "n": 1 })).await.unwrap();
        let rev2 = store
            .put(json!({ "_id": "doc", "_rev": rev1, "n": 2 }))
            .await
            .unwrap();

        let doc = store.get("doc").await.unwrap();
        assert_eq!(doc["n"], 2);
        assert_eq!(doc["_rev"], rev2.as_str());
    }

    #[tokio::test]
    async fn test_stale_revision_conflicts() {
        let store = MemoryStore::new();
        let rev1 = store.put(json!({ "_id": "doc" })).await.unwrap();
        store.put(json!({ "_id": "doc", "_rev": rev1 })).await.unwrap();

        let stale = store.put(json!({ "_id": "doc", "_rev": rev1 })).await;
        assert!(matches!(stale, Err(StoreError::Conflict(_))));

        let duplicate_create = store.put(json!({ "_id": "doc" })).await;
        assert!(matches!(duplicate_create, Err(StoreError::Conflict(_))));

        let stale_remove = store.remove("doc", &rev1).await;
        assert!(matches!(stale_remove, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_remove_and_list() {
        let store = MemoryStore::new();
        store.put(json!({ "_id": "query_b" })).await.unwrap();
        let rev = store.put(json!({ "_id": "query_a" })).await.unwrap();
        store.put(json!({ "_id": "datasource_1" })).await.unwrap();

        let listed = store.list("query_").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0]["_id"], "query_a");

        store.remove("query_a", &rev).await.unwrap();
        assert!(matches!(store.get("query_a").await, Err(StoreError::NotFound(_))));
        assert!(matches!(
            store.remove("query_a", &rev).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
