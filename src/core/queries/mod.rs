pub mod dynamic_variables;
pub mod events;
pub mod integration;
pub mod parameters;
pub mod runner;
pub mod schema;
pub mod service;

pub use dynamic_variables::{DynamicVariableManager, MemoryVariableCache, VariableCache, VariableCacheStats};
pub use events::{QueryEventSink, TracingEventSink};
pub use integration::{
    Integration, IntegrationError, IntegrationFactory, IntegrationRegistry, IntegrationRequest, IntegrationResponse,
};
pub use parameters::enrich_parameters;
pub use runner::{QueryRunner, RunnerError};
pub use schema::{FieldValue, InferredSchema, SchemaInferencer};
pub use service::QueryService;
