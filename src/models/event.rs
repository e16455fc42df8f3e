use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use super::datasource::Datasource;
use super::query::QueryVerb;
use super::schema::SchemaMap;

/// One result row as returned by an integration.
pub type Row = Map<String, Value>;

/// Identifiers an integration may use to look up per-session secrets.
/// Never carries credentials themselves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryUser {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvocationContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<QueryUser>,
    #[serde(default)]
    pub auth: AuthContext,
}

/// The envelope handed across the worker boundary for one invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryEvent {
    pub datasource: Datasource,
    pub query_verb: QueryVerb,
    pub fields: Value,
    pub parameters: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Value>,
    #[serde(default)]
    pub environment_variables: HashMap<String, String>,
    pub ctx: InvocationContext,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub rows: Vec<Row>,
    /// Distinct field names across all rows, in first-seen order
    pub keys: Vec<String>,
    #[serde(default)]
    pub info: Map<String, Value>,
    #[serde(default)]
    pub extra: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Value>,
}

impl QueryResponse {
    /// Drop the raw request/response capture, which may expose data a
    /// transformer was meant to hide.
    pub fn strip_raw(&mut self) {
        self.extra.remove("raw");
    }
}
