//! Isolated, time-bounded query execution.
//!
//! Every invocation is serialized into a JSON envelope and handed to its own
//! worker task, which builds a fresh integration client, runs the query and
//! serializes the response back. The deadline is enforced inside the worker,
//! so an invocation is bounded even when the caller stops waiting for it.
//! An integration that blocks its thread instead of yielding cannot be
//! preempted; integrations must use async I/O.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::integration::{IntegrationError, IntegrationRegistry, IntegrationRequest};
use super::schema::collect_keys;
use crate::models::{QueryEvent, QueryResponse};

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Query timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("{0}")]
    Configuration(String),

    #[error("{0}")]
    Integration(String),

    #[error("Query worker failed: {0}")]
    Worker(String),

    #[error("Invalid query envelope: {0}")]
    Envelope(#[from] serde_json::Error),
}

impl From<IntegrationError> for RunnerError {
    fn from(err: IntegrationError) -> Self {
        match err {
            IntegrationError::Configuration(msg) => RunnerError::Configuration(msg),
            IntegrationError::Execution(msg) => RunnerError::Integration(msg),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InvocationHandle {
    pub invocation_id: Uuid,
    pub datasource_id: Option<String>,
    pub query_id: Option<String>,
    pub started_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct QueryRunner {
    registry: Arc<IntegrationRegistry>,
    timeout: Duration,
    in_flight: Arc<RwLock<HashMap<Uuid, InvocationHandle>>>,
}

impl QueryRunner {
    pub fn new(registry: IntegrationRegistry, timeout: Duration) -> Self {
        Self {
            registry: Arc::new(registry),
            timeout,
            in_flight: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn active_count(&self) -> usize {
        self.in_flight.read().await.len()
    }

    pub async fn in_flight(&self) -> Vec<InvocationHandle> {
        self.in_flight.read().await.values().cloned().collect()
    }

    pub async fn run(&self, event: &QueryEvent) -> Result<QueryResponse, RunnerError> {
        let invocation_id = Uuid::new_v4();
        let envelope = serde_json::to_vec(event)?;
        let started = Instant::now();

        {
            let mut in_flight = self.in_flight.write().await;
            in_flight.insert(
                invocation_id,
                InvocationHandle {
                    invocation_id,
                    datasource_id: event.datasource.id.clone(),
                    query_id: event.query_id.clone(),
                    started_at: Utc::now(),
                },
            );
        }

        debug!(
            %invocation_id,
            datasource_id = ?event.datasource.id,
            query_id = ?event.query_id,
            "Dispatching query to worker"
        );

        let registry = Arc::clone(&self.registry);
        let in_flight = Arc::clone(&self.in_flight);
        let timeout = self.timeout;

        let worker = tokio::spawn(async move {
            let outcome = match tokio::time::timeout(timeout, execute_envelope(registry, envelope)).await {
                Ok(result) => result,
                // dropping the inner future cancels the integration call
                Err(_) => Err(RunnerError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                }),
            };
            in_flight.write().await.remove(&invocation_id);
            outcome
        });

        let joined = worker.await;
        self.in_flight.write().await.remove(&invocation_id);

        let payload = match joined {
            Ok(Ok(payload)) => payload,
            Ok(Err(err)) => {
                match &err {
                    RunnerError::Timeout { timeout_ms } => {
                        warn!(%invocation_id, timeout_ms, "Query invocation timed out");
                    }
                    RunnerError::Configuration(msg) => {
                        warn!(%invocation_id, "Query invocation misconfigured: {}", msg);
                    }
                    other => {
                        error!(%invocation_id, "Query invocation failed: {}", other);
                    }
                }
                return Err(err);
            }
            Err(join_err) => {
                let reason = if join_err.is_panic() {
                    "worker panicked"
                } else {
                    "worker was cancelled"
                };
                error!(%invocation_id, "Query invocation failed: {}", reason);
                return Err(RunnerError::Worker(reason.to_string()));
            }
        };

        let response: QueryResponse = serde_json::from_slice(&payload)?;
        info!(
            %invocation_id,
            rows = response.rows.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Query invocation completed"
        );
        Ok(response)
    }
}

/// Worker side of the boundary: only the serialized envelope crosses in and
/// only the serialized response crosses out.
async fn execute_envelope(registry: Arc<IntegrationRegistry>, envelope: Vec<u8>) -> Result<Vec<u8>, RunnerError> {
    let event: QueryEvent = serde_json::from_slice(&envelope)?;
    let mut integration = registry.connect(&event.datasource)?;

    let request = IntegrationRequest {
        query_verb: event.query_verb,
        fields: event.fields,
        parameters: event.parameters,
        pagination: event.pagination,
        transformer: event.transformer,
        environment_variables: event.environment_variables,
        auth: event.ctx.auth,
        query_id: event.query_id,
    };

    let result = integration.execute(request).await?;
    let keys = collect_keys(&result.rows);

    let response = QueryResponse {
        rows: result.rows,
        keys,
        info: result.info,
        extra: result.extra,
        pagination: result.pagination,
    };
    Ok(serde_json::to_vec(&response)?)
}
