pub mod datasource;
pub mod event;
pub mod query;
pub mod requests;
pub mod schema;

pub use datasource::{Datasource, DatasourceConfig, DynamicVariable};
pub use event::{AuthContext, InvocationContext, QueryEvent, QueryResponse, QueryUser, Row};
pub use query::{Query, QueryParameter, QueryVerb};
pub use requests::{
    ExecuteOptions, ExecuteQueryRequest, ExecuteQueryResponse, PreviewQueryRequest,
    PreviewQueryResponse,
};
pub use schema::{FieldType, JsonFieldSubType, NestedSchemaFields, QuerySchema, SchemaEntry, SchemaMap};
