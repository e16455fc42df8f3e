use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Row};
use tracing::debug;

use super::{document_id, document_rev, next_revision, with_rev, DocumentStore, StoreError};

/// Documents in the `documents` table created by the migration crate.
/// The revision lives in its own column; the stored body never contains `_rev`.
#[derive(Clone)]
pub struct PgDocumentStore {
    db_pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    async fn exists(&self, id: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 AS found FROM documents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?;
        Ok(row.is_some())
    }
}

fn strip_rev(mut doc: Value) -> Value {
    if let Value::Object(map) = &mut doc {
        map.remove("_rev");
    }
    doc
}

fn escape_like(prefix: &str) -> String {
    prefix
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, id: &str) -> Result<Value, StoreError> {
        let row = sqlx::query("SELECT rev, body FROM documents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let rev: String = row.get("rev");
        let body: Value = row.get("body");
        Ok(with_rev(body, &rev))
    }

    async fn put(&self, doc: Value) -> Result<String, StoreError> {
        let id = document_id(&doc)?;
        let requested_rev = document_rev(&doc);
        let new_rev = next_revision(requested_rev.as_deref());
        let body = strip_rev(doc);

        let affected = match &requested_rev {
            None => sqlx::query(
                r#"
                INSERT INTO documents (id, rev, body)
                VALUES ($1, $2, $3)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(&id)
            .bind(&new_rev)
            .bind(&body)
            .execute(&self.db_pool)
            .await?
            .rows_affected(),
            Some(current) => sqlx::query(
                r#"
                UPDATE documents
                SET rev = $2, body = $3, updated_at = NOW()
                WHERE id = $1 AND rev = $4
                "#,
            )
            .bind(&id)
            .bind(&new_rev)
            .bind(&body)
            .bind(current)
            .execute(&self.db_pool)
            .await?
            .rows_affected(),
        };

        if affected == 0 {
            debug!("Revision check failed for document {}", id);
            return Err(StoreError::Conflict(id));
        }

        Ok(new_rev)
    }

    async fn remove(&self, id: &str, rev: &str) -> Result<(), StoreError> {
        let affected = sqlx::query("DELETE FROM documents WHERE id = $1 AND rev = $2")
            .bind(id)
            .bind(rev)
            .execute(&self.db_pool)
            .await?
            .rows_affected();

        if affected == 0 {
            if self.exists(id).await? {
                return Err(StoreError::Conflict(id.to_string()));
            }
            return Err(StoreError::NotFound(id.to_string()));
        }

        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<Value>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT rev, body FROM documents
            WHERE id LIKE $1 || '%' ESCAPE '\'
            ORDER BY id
            "#,
        )
        .bind(escape_like(prefix))
        .fetch_all(&self.db_pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let rev: String = row.get("rev");
                let body: Value = row.get("body");
                with_rev(body, &rev)
            })
            .collect())
    }
}
