//! Revision-stamped document storage.
//!
//! Every document carries `_id` and `_rev`. Writes are optimistic: a `put`
//! without `_rev` creates the document and fails if the id is taken, a `put`
//! with `_rev` only succeeds while that revision is still current. Callers
//! that hit a [`StoreError::Conflict`] must re-fetch and retry themselves.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PgDocumentStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Revision conflict on document {0}")]
    Conflict(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Value, StoreError>;

    /// Returns the new revision.
    async fn put(&self, doc: Value) -> Result<String, StoreError>;

    async fn remove(&self, id: &str, rev: &str) -> Result<(), StoreError>;

    async fn list(&self, prefix: &str) -> Result<Vec<Value>, StoreError>;
}

pub async fn get_doc<T: DeserializeOwned>(store: &dyn DocumentStore, id: &str) -> Result<T, StoreError> {
    let value = store.get(id).await?;
    Ok(serde_json::from_value(value)?)
}

pub async fn put_doc<T: Serialize>(store: &dyn DocumentStore, doc: &T) -> Result<String, StoreError> {
    store.put(serde_json::to_value(doc)?).await
}

pub(crate) fn document_id(doc: &Value) -> Result<String, StoreError> {
    doc.get("_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| StoreError::InvalidDocument("document has no _id".to_string()))
}

pub(crate) fn document_rev(doc: &Value) -> Option<String> {
    doc.get("_rev").and_then(Value::as_str).map(str::to_string)
}

/// `<generation>-<random>`, generation starting at 1.
pub(crate) fn next_revision(current: Option<&str>) -> String {
    let generation = current
        .and_then(|rev| rev.split('-').next())
        .and_then(|g| g.parse::<u64>().ok())
        .unwrap_or(0);
    format!("{}-{}", generation + 1, Uuid::new_v4().simple())
}

pub(crate) fn with_rev(mut doc: Value, rev: &str) -> Value {
    if let Value::Object(map) = &mut doc {
        map.insert("_rev".to_string(), Value::String(rev.to_string()));
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_next_revision_advances_generation() {
        let first = next_revision(None);
        assert!(first.starts_with("1-"));

        let second = next_revision(Some(&first));
        assert!(second.starts_with("2-"));
        assert_ne!(first, second);

        assert!(next_revision(Some("garbage")).starts_with("1-"));
    }

    #[test]
    fn test_document_id_required() {
        assert_eq!(document_id(&json!({ "_id": "a" })).unwrap(), "a");
        assert!(matches!(
            document_id(&json!({ "_id": "" })),
            Err(StoreError::InvalidDocument(_))
        ));
        assert!(document_id(&json!({})).is_err());
    }
}
