use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::dynamic_variables::{extract_value, used_variables, DynamicVariableManager, VariableCache};
use super::events::QueryEventSink;
use super::parameters::enrich_parameters;
use super::runner::QueryRunner;
use super::schema::SchemaInferencer;
use crate::core::datasources::{DatasourceResolver, ResolvedDatasource};
use crate::core::storage::{get_doc, put_doc, DocumentStore, StoreError};
use crate::models::query::{is_valid_query_name, QUERY_ID_PREFIX};
use crate::models::{
    AuthContext, Datasource, DynamicVariable, ExecuteOptions, ExecuteQueryRequest, ExecuteQueryResponse,
    InvocationContext, PreviewQueryRequest, PreviewQueryResponse, Query, QueryEvent, SchemaMap,
};
use crate::utils::AppError;

/// Orchestrates the preview and execute flows plus query persistence.
///
/// Every call is request scoped. Nothing here retries: timeouts and
/// revision conflicts go straight back to the caller.
pub struct QueryService {
    store: Arc<dyn DocumentStore>,
    resolver: Arc<dyn DatasourceResolver>,
    runner: QueryRunner,
    events: Arc<dyn QueryEventSink>,
    variables: DynamicVariableManager,
}

impl QueryService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        resolver: Arc<dyn DatasourceResolver>,
        runner: QueryRunner,
        events: Arc<dyn QueryEventSink>,
        variables: DynamicVariableManager,
    ) -> Self {
        Self {
            store,
            resolver,
            runner,
            events,
            variables,
        }
    }

    pub fn runner(&self) -> &QueryRunner {
        &self.runner
    }

    pub fn variables(&self) -> &DynamicVariableManager {
        &self.variables
    }

    pub async fn fetch(&self) -> Result<Vec<Query>, AppError> {
        let docs = self.store.list(&format!("{}_", QUERY_ID_PREFIX)).await?;
        docs.into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(AppError::from))
            .collect()
    }

    pub async fn find(&self, query_id: &str) -> Result<Query, AppError> {
        Ok(get_doc(self.store.as_ref(), query_id).await?)
    }

    pub async fn save(&self, mut query: Query) -> Result<Query, AppError> {
        validate_name(&query.name)?;
        let datasource = self.resolver.get(&query.datasource_id).await?;

        let is_new = query.id.is_none();
        if is_new {
            query.id = Some(Query::generate_id(&query.datasource_id));
            query.rev = None;
        }

        let rev = put_doc(self.store.as_ref(), &query).await?;
        query.rev = Some(rev);

        let emitted = if is_new {
            self.events.created(&datasource, &query).await
        } else {
            self.events.updated(&datasource, &query).await
        };
        log_event_failure(if is_new { "created" } else { "updated" }, emitted);

        info!(query_id = ?query.id, datasource_id = %query.datasource_id, "Saved query");
        Ok(query)
    }

    pub async fn preview(
        &self,
        request: PreviewQueryRequest,
        ctx: InvocationContext,
    ) -> Result<PreviewQueryResponse, AppError> {
        if let Some(name) = &request.name {
            validate_name(name)?;
        }

        let ResolvedDatasource { datasource, env_vars } =
            self.resolver.get_with_env_vars(&request.datasource_id).await?;

        let existing_schema = match (&request.schema, &request.query_id) {
            (Some(schema), _) => Some(schema.clone()),
            (None, Some(query_id)) => self.existing_schema(query_id).await?,
            (None, None) => None,
        };

        let mut parameters = enrich_parameters(&request.parameters, HashMap::new());
        self.resolve_dynamic_variables(
            &datasource,
            &env_vars,
            &request.fields,
            request.query_id.as_deref(),
            &mut parameters,
            &ctx,
        )
        .await?;

        let event = QueryEvent {
            datasource: datasource.clone(),
            query_verb: request.query_verb,
            fields: request.fields.clone(),
            parameters,
            transformer: request.transformer.clone(),
            query_id: request.query_id.clone(),
            schema: request.schema.clone(),
            pagination: None,
            environment_variables: env_vars,
            ctx,
        };

        let response = self.runner.run(&event).await?;
        let mut inferred = SchemaInferencer::infer(&response.rows, &response.keys);
        if let Some(existing) = &existing_schema {
            inferred.reconcile(existing);
        }

        let public = datasource.without_config();
        log_event_failure("previewed", self.events.previewed(&public, &request).await);

        debug!(
            datasource_id = %request.datasource_id,
            rows = response.rows.len(),
            fields = inferred.schema.len(),
            "Previewed query"
        );

        Ok(PreviewQueryResponse {
            rows: response.rows,
            nested_schema_fields: inferred.nested_schema_fields,
            schema: inferred.schema,
            info: response.info,
            extra: response.extra,
        })
    }

    pub async fn execute(
        &self,
        query_id: &str,
        request: ExecuteQueryRequest,
        ctx: InvocationContext,
        opts: ExecuteOptions,
    ) -> Result<ExecuteQueryResponse, AppError> {
        let query = self.find(query_id).await?;
        let ResolvedDatasource { datasource, env_vars } =
            self.resolver.get_with_env_vars(&query.datasource_id).await?;

        let ctx = if opts.is_automation {
            InvocationContext {
                user: ctx.user,
                auth: AuthContext::default(),
            }
        } else {
            ctx
        };

        let mut parameters = enrich_parameters(&query.parameters, request.parameters);
        self.resolve_dynamic_variables(
            &datasource,
            &env_vars,
            &query.fields,
            Some(query_id),
            &mut parameters,
            &ctx,
        )
        .await?;

        let event = QueryEvent {
            datasource,
            query_verb: query.query_verb,
            fields: query.fields,
            parameters,
            transformer: query.transformer,
            query_id: Some(query_id.to_string()),
            schema: query.schema,
            pagination: request.pagination,
            environment_variables: env_vars,
            ctx,
        };

        let mut response = self.runner.run(&event).await?;
        response.strip_raw();

        if opts.rows_only {
            return Ok(ExecuteQueryResponse::Rows(response.rows));
        }

        let mut envelope = Map::new();
        envelope.insert(
            "data".to_string(),
            Value::Array(response.rows.into_iter().map(Value::Object).collect()),
        );
        if let Some(pagination) = response.pagination {
            envelope.insert("pagination".to_string(), pagination);
        }
        envelope.extend(response.extra);
        envelope.extend(response.info);
        Ok(ExecuteQueryResponse::Envelope(envelope))
    }

    pub async fn execute_v1(
        &self,
        query_id: &str,
        request: ExecuteQueryRequest,
        ctx: InvocationContext,
    ) -> Result<ExecuteQueryResponse, AppError> {
        let opts = ExecuteOptions {
            rows_only: true,
            is_automation: false,
        };
        self.execute(query_id, request, ctx, opts).await
    }

    pub async fn execute_v2(
        &self,
        query_id: &str,
        request: ExecuteQueryRequest,
        ctx: InvocationContext,
    ) -> Result<ExecuteQueryResponse, AppError> {
        self.execute(query_id, request, ctx, ExecuteOptions::default()).await
    }

    /// Variables sourced from the query are dropped before the query
    /// itself, so a failed cleanup leaves the query in place.
    pub async fn destroy(&self, query_id: &str, rev: &str) -> Result<(), AppError> {
        let query = self.find(query_id).await?;
        let datasource = self.resolver.get(&query.datasource_id).await?;

        self.variables.remove_for_query(&query).await?;
        self.store.remove(query_id, rev).await?;

        log_event_failure("deleted", self.events.deleted(&datasource, &query).await);
        info!(query_id, "Deleted query");
        Ok(())
    }

    async fn existing_schema(&self, query_id: &str) -> Result<Option<SchemaMap>, AppError> {
        match get_doc::<Query>(self.store.as_ref(), query_id).await {
            Ok(query) => Ok(query.schema),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Fill parameters bound to the datasource's dynamic variables. A value
    /// the caller supplied is never replaced.
    async fn resolve_dynamic_variables(
        &self,
        datasource: &Datasource,
        env_vars: &HashMap<String, String>,
        fields: &Value,
        current_query_id: Option<&str>,
        parameters: &mut HashMap<String, String>,
        ctx: &InvocationContext,
    ) -> Result<(), AppError> {
        let Some(datasource_id) = datasource.id.as_deref() else {
            return Ok(());
        };

        for variable in used_variables(datasource, fields, current_query_id) {
            let supplied = parameters
                .get(&variable.name)
                .map_or(false, |value| !value.is_empty());
            if supplied {
                continue;
            }

            let cache = self.variables.cache();
            let value = match cache.get(datasource_id, &variable.name).await {
                Some(value) => Some(value),
                None => {
                    let computed = self.compute_variable(datasource, env_vars, &variable, ctx).await?;
                    if let Some(value) = &computed {
                        cache.set(datasource_id, &variable.name, value.clone()).await;
                    }
                    computed
                }
            };

            match value {
                Some(value) => {
                    parameters.insert(variable.name, value);
                }
                None => warn!(
                    datasource_id,
                    variable = %variable.name,
                    "Dynamic variable resolved to no value"
                ),
            }
        }
        Ok(())
    }

    /// Runs the variable's source query with its declared defaults. The
    /// source query's own variables are not resolved.
    async fn compute_variable(
        &self,
        datasource: &Datasource,
        env_vars: &HashMap<String, String>,
        variable: &DynamicVariable,
        ctx: &InvocationContext,
    ) -> Result<Option<String>, AppError> {
        let source = self.find(&variable.query_id).await?;
        debug!(
            variable = %variable.name,
            source_query_id = %variable.query_id,
            "Computing dynamic variable"
        );

        let event = QueryEvent {
            datasource: datasource.clone(),
            query_verb: source.query_verb,
            fields: source.fields,
            parameters: enrich_parameters(&source.parameters, HashMap::new()),
            transformer: source.transformer,
            query_id: source.id,
            schema: source.schema,
            pagination: None,
            environment_variables: env_vars.clone(),
            ctx: ctx.clone(),
        };

        let response = self.runner.run(&event).await?;
        let result = json!({ "data": response.rows, "info": response.info });
        Ok(extract_value(&variable.value, &result))
    }
}

fn validate_name(name: &str) -> Result<(), AppError> {
    if is_valid_query_name(name) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Invalid query name {:?}: must be non-empty and contain no parentheses",
            name
        )))
    }
}

fn log_event_failure(event: &str, result: anyhow::Result<()>) {
    if let Err(err) = result {
        warn!("Failed to emit query:{} event: {:#}", event, err);
    }
}
