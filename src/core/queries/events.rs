use async_trait::async_trait;
use tracing::info;

use crate::models::{Datasource, PreviewQueryRequest, Query};

/// Fire-and-forget notifications about query lifecycle. The service logs
/// and discards any error a sink returns.
#[async_trait]
pub trait QueryEventSink: Send + Sync {
    async fn created(&self, datasource: &Datasource, query: &Query) -> anyhow::Result<()>;

    async fn updated(&self, datasource: &Datasource, query: &Query) -> anyhow::Result<()>;

    async fn deleted(&self, datasource: &Datasource, query: &Query) -> anyhow::Result<()>;

    /// `datasource` arrives with its config already stripped.
    async fn previewed(&self, datasource: &Datasource, request: &PreviewQueryRequest) -> anyhow::Result<()>;
}

/// Default sink: one structured log line per event.
pub struct TracingEventSink;

#[async_trait]
impl QueryEventSink for TracingEventSink {
    async fn created(&self, datasource: &Datasource, query: &Query) -> anyhow::Result<()> {
        info!(
            datasource_id = ?datasource.id,
            query_id = ?query.id,
            source = %datasource.source,
            "query:created"
        );
        Ok(())
    }

    async fn updated(&self, datasource: &Datasource, query: &Query) -> anyhow::Result<()> {
        info!(datasource_id = ?datasource.id, query_id = ?query.id, "query:updated");
        Ok(())
    }

    async fn deleted(&self, datasource: &Datasource, query: &Query) -> anyhow::Result<()> {
        info!(datasource_id = ?datasource.id, query_id = ?query.id, "query:deleted");
        Ok(())
    }

    async fn previewed(&self, datasource: &Datasource, request: &PreviewQueryRequest) -> anyhow::Result<()> {
        info!(
            datasource_id = ?datasource.id,
            query_id = ?request.query_id,
            verb = ?request.query_verb,
            "query:previewed"
        );
        Ok(())
    }
}
