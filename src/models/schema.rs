use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Column types a query schema entry can carry.
///
/// Inference only ever produces string, boolean, number, datetime, array
/// and json. The remaining variants exist because users may re-type a
/// column after a preview and the stored schema must round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    #[serde(rename = "longform")]
    LongForm,
    Options,
    Number,
    #[serde(rename = "bigint")]
    BigInt,
    Boolean,
    Array,
    #[serde(rename = "datetime")]
    DateTime,
    Attachment,
    Link,
    Formula,
    Auto,
    Json,
    #[serde(rename = "barcodeqr")]
    BarcodeQr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonFieldSubType {
    Array,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySchema {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<JsonFieldSubType>,
}

impl QuerySchema {
    pub fn new(field_type: FieldType, name: impl Into<String>) -> Self {
        Self {
            field_type,
            name: name.into(),
            subtype: None,
        }
    }

    pub fn json_array(name: impl Into<String>) -> Self {
        Self {
            field_type: FieldType::Json,
            name: name.into(),
            subtype: Some(JsonFieldSubType::Array),
        }
    }

    pub fn is_json_array(&self) -> bool {
        self.field_type == FieldType::Json && self.subtype == Some(JsonFieldSubType::Array)
    }
}

/// A stored schema entry. Older saved queries keep a bare type string
/// instead of the full descriptor, so both shapes are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaEntry {
    Field(QuerySchema),
    Type(FieldType),
}

impl From<QuerySchema> for SchemaEntry {
    fn from(schema: QuerySchema) -> Self {
        SchemaEntry::Field(schema)
    }
}

/// Field name -> schema entry, in column order.
pub type SchemaMap = IndexMap<String, SchemaEntry>;

/// Array field name -> schema of the records inside that array.
pub type NestedSchemaFields = IndexMap<String, IndexMap<String, QuerySchema>>;
