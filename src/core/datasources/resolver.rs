use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::core::storage::{get_doc, DocumentStore};
use crate::models::Datasource;
use crate::utils::AppError;

lazy_static! {
    static ref ENV_BINDING: Regex =
        Regex::new(r"\{\{\s*env\.([A-Za-z0-9_]+)\s*\}\}").expect("valid env binding regex");
}

#[derive(Debug, Clone)]
pub struct ResolvedDatasource {
    pub datasource: Datasource,
    pub env_vars: HashMap<String, String>,
}

#[async_trait]
pub trait DatasourceResolver: Send + Sync {
    async fn get(&self, datasource_id: &str) -> Result<Datasource, AppError>;

    /// The datasource with `{{ env.NAME }}` bindings in its config filled
    /// in, plus the variables used to fill them.
    async fn get_with_env_vars(&self, datasource_id: &str) -> Result<ResolvedDatasource, AppError>;
}

pub struct StoreDatasourceResolver {
    store: Arc<dyn DocumentStore>,
    env_vars: HashMap<String, String>,
}

impl StoreDatasourceResolver {
    pub fn new(store: Arc<dyn DocumentStore>, env_vars: HashMap<String, String>) -> Self {
        Self { store, env_vars }
    }
}

#[async_trait]
impl DatasourceResolver for StoreDatasourceResolver {
    async fn get(&self, datasource_id: &str) -> Result<Datasource, AppError> {
        Ok(get_doc(self.store.as_ref(), datasource_id).await?)
    }

    async fn get_with_env_vars(&self, datasource_id: &str) -> Result<ResolvedDatasource, AppError> {
        let mut datasource = self.get(datasource_id).await?;

        if let Some(config) = datasource.config.as_mut() {
            for value in config.settings.values_mut() {
                bind_env_vars(value, &self.env_vars);
            }
        }

        debug!(
            "Resolved datasource {} with {} environment variables",
            datasource_id,
            self.env_vars.len()
        );

        Ok(ResolvedDatasource {
            datasource,
            env_vars: self.env_vars.clone(),
        })
    }
}

/// Replace `{{ env.NAME }}` in every string below `value`. Unknown names
/// are left as written.
pub fn bind_env_vars(value: &mut Value, env_vars: &HashMap<String, String>) {
    match value {
        Value::String(text) => {
            if ENV_BINDING.is_match(text) {
                let bound = ENV_BINDING.replace_all(text, |caps: &Captures| {
                    env_vars
                        .get(&caps[1])
                        .cloned()
                        .unwrap_or_else(|| caps[0].to_string())
                });
                *text = bound.into_owned();
            }
        }
        Value::Array(items) => items.iter_mut().for_each(|item| bind_env_vars(item, env_vars)),
        Value::Object(map) => map.values_mut().for_each(|item| bind_env_vars(item, env_vars)),
        _ => {}
    }
}
