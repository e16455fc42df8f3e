use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::schema::SchemaMap;

pub const QUERY_ID_PREFIX: &str = "query";

lazy_static! {
    static ref VALID_QUERY_NAME: Regex = Regex::new(r"^[^()]+$").expect("valid query name regex");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryVerb {
    Create,
    Read,
    Update,
    Delete,
}

/// A declared query parameter and the value used when the caller omits it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryParameter {
    pub name: String,
    #[serde(default)]
    pub default: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub name: String,
    pub datasource_id: String,
    pub query_verb: QueryVerb,
    /// Integration specific request shape (SQL text, REST path/headers/body...)
    #[serde(default)]
    pub fields: Value,
    #[serde(default)]
    pub parameters: Vec<QueryParameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaMap>,
    /// Fields this service does not model (readable, timestamps...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Query {
    pub fn generate_id(datasource_id: &str) -> String {
        format!("{}_{}_{}", QUERY_ID_PREFIX, datasource_id, Uuid::new_v4().simple())
    }
}

pub fn is_valid_query_name(name: &str) -> bool {
    VALID_QUERY_NAME.is_match(name)
}
