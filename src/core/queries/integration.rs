//! Contract a datasource integration (SQL driver, REST client...) must
//! satisfy to be driven by the query runner.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::models::{AuthContext, Datasource, QueryVerb, Row};

#[derive(Debug, Error)]
pub enum IntegrationError {
    /// The datasource lacks what is needed to build a client
    #[error("{0}")]
    Configuration(String),

    /// The external system rejected or failed the call
    #[error("{0}")]
    Execution(String),
}

#[derive(Debug, Clone)]
pub struct IntegrationRequest {
    pub query_verb: QueryVerb,
    pub fields: Value,
    pub parameters: HashMap<String, String>,
    pub pagination: Option<Value>,
    pub transformer: Option<String>,
    pub environment_variables: HashMap<String, String>,
    pub auth: AuthContext,
    pub query_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct IntegrationResponse {
    pub rows: Vec<Row>,
    pub info: Map<String, Value>,
    /// May carry `raw`, the captured request/response
    pub extra: Map<String, Value>,
    pub pagination: Option<Value>,
}

#[async_trait]
pub trait Integration: Send {
    async fn execute(&mut self, request: IntegrationRequest) -> Result<IntegrationResponse, IntegrationError>;
}

/// Builds a fresh client per invocation; clients are never shared
/// between concurrent invocations.
pub trait IntegrationFactory: Send + Sync {
    fn create(&self, datasource: &Datasource) -> Result<Box<dyn Integration>, IntegrationError>;
}

#[derive(Clone, Default)]
pub struct IntegrationRegistry {
    factories: HashMap<String, Arc<dyn IntegrationFactory>>,
}

impl IntegrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, source: &str, factory: Arc<dyn IntegrationFactory>) {
        self.factories.insert(source.to_uppercase(), factory);
    }

    pub fn with(mut self, source: &str, factory: Arc<dyn IntegrationFactory>) -> Self {
        self.register(source, factory);
        self
    }

    pub fn sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = self.factories.keys().cloned().collect();
        sources.sort();
        sources
    }

    pub fn connect(&self, datasource: &Datasource) -> Result<Box<dyn Integration>, IntegrationError> {
        let factory = self
            .factories
            .get(&datasource.source.to_uppercase())
            .ok_or_else(|| {
                IntegrationError::Configuration(format!(
                    "No integration registered for datasource type {}",
                    datasource.source
                ))
            })?;
        factory.create(datasource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Integration for Echo {
        async fn execute(&mut self, request: IntegrationRequest) -> Result<IntegrationResponse, IntegrationError> {
            let mut row = Row::new();
            row.insert("verb".into(), serde_json::to_value(request.query_verb).unwrap_or_default());
            Ok(IntegrationResponse {
                rows: vec![row],
                ..Default::default()
            })
        }
    }

    struct EchoFactory;

    impl IntegrationFactory for EchoFactory {
        fn create(&self, _datasource: &Datasource) -> Result<Box<dyn Integration>, IntegrationError> {
            Ok(Box::new(Echo))
        }
    }

    fn datasource(source: &str) -> Datasource {
        Datasource {
            id: Some("datasource_1".into()),
            rev: None,
            name: None,
            source: source.into(),
            config: None,
            extra: Default::default(),
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = IntegrationRegistry::new().with("rest", Arc::new(EchoFactory));

        assert_eq!(registry.sources(), vec!["REST".to_string()]);
        assert!(registry.connect(&datasource("REST")).is_ok());
        assert!(registry.connect(&datasource("Rest")).is_ok());
    }

    #[test]
    fn test_unknown_source_is_configuration_error() {
        let registry = IntegrationRegistry::new();
        match registry.connect(&datasource("MONGODB")) {
            Err(IntegrationError::Configuration(msg)) => assert!(msg.contains("MONGODB")),
            _ => panic!("expected configuration error"),
        }
    }
}
