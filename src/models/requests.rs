use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use super::event::Row;
use super::query::{QueryParameter, QueryVerb};
use super::schema::{NestedSchemaFields, SchemaMap};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewQueryRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub datasource_id: String,
    pub query_verb: QueryVerb,
    #[serde(default)]
    pub fields: Value,
    #[serde(default)]
    pub parameters: Vec<QueryParameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformer: Option<String>,
    /// Set when previewing a query that has already been saved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaMap>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewQueryResponse {
    pub rows: Vec<Row>,
    pub nested_schema_fields: NestedSchemaFields,
    pub schema: SchemaMap,
    pub info: Map<String, Value>,
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecuteQueryRequest {
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Value>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteOptions {
    pub rows_only: bool,
    pub is_automation: bool,
}

/// v1 callers get the bare rows, v2 callers the full envelope
/// `{ data, pagination, ...extra, ...info }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExecuteQueryResponse {
    Rows(Vec<Row>),
    Envelope(Map<String, Value>),
}
