//! Schema inference for ad hoc query results.
//!
//! Custom queries have no fixed schema, so one is derived from the first
//! returned row. Arrays of records additionally get a nested schema built
//! from every record in the array.

use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::models::{FieldType, NestedSchemaFields, QuerySchema, Row, SchemaEntry, SchemaMap};

/// Row data converted into a closed set of shapes before inference.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    String(String),
    Number(f64),
    Bool(bool),
    Date(DateTime<FixedOffset>),
    Array(Vec<FieldValue>),
    Object(IndexMap<String, FieldValue>),
}

impl FieldValue {
    /// Strings that are full RFC 3339 timestamps are treated as dates;
    /// that is how integrations hand over native temporal values.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(*b),
            Value::Number(n) => FieldValue::Number(n.as_f64().unwrap_or_default()),
            Value::String(s) => match DateTime::parse_from_rfc3339(s) {
                Ok(date) => FieldValue::Date(date),
                Err(_) => FieldValue::String(s.clone()),
            },
            Value::Array(items) => FieldValue::Array(items.iter().map(FieldValue::from_json).collect()),
            Value::Object(map) => FieldValue::Object(object_fields(map)),
        }
    }

    /// A plain record, whose shape can itself be described field by field.
    pub fn has_schema(&self) -> bool {
        matches!(self, FieldValue::Object(_))
    }
}

fn object_fields(map: &Map<String, Value>) -> IndexMap<String, FieldValue> {
    map.iter()
        .map(|(key, value)| (key.clone(), FieldValue::from_json(value)))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InferredSchema {
    pub schema: SchemaMap,
    pub nested_schema_fields: NestedSchemaFields,
}

impl InferredSchema {
    /// Entries the user already has for a key replace the inferred ones, so
    /// edited labels and types survive a re-preview. Keys never seen before
    /// keep their inferred entry.
    pub fn reconcile(&mut self, existing: &SchemaMap) {
        for (key, entry) in self.schema.iter_mut() {
            if let Some(previous) = existing.get(key) {
                *entry = previous.clone();
            }
        }
    }
}

pub struct SchemaInferencer;

impl SchemaInferencer {
    pub fn infer(rows: &[Row], keys: &[String]) -> InferredSchema {
        let mut inferred = InferredSchema::default();
        let Some(first) = rows.first() else {
            return inferred;
        };

        let mut seen = HashSet::new();
        for key in keys {
            if !seen.insert(key.as_str()) {
                continue;
            }

            let sample = first.get(key).map(FieldValue::from_json);
            let metadata = Self::field_metadata(sample.as_ref(), key);

            if metadata.is_json_array() {
                if let Some(FieldValue::Array(items)) = &sample {
                    inferred
                        .nested_schema_fields
                        .insert(key.clone(), Self::nested_schema(items));
                }
            }
            inferred.schema.insert(key.clone(), SchemaEntry::Field(metadata));
        }

        inferred
    }

    /// Type for one sampled value. Null carries no type information and
    /// there is no "unknown" type, so it defaults to string.
    pub fn field_metadata(value: Option<&FieldValue>, key: &str) -> QuerySchema {
        match value {
            None | Some(FieldValue::Null) | Some(FieldValue::String(_)) => {
                QuerySchema::new(FieldType::String, key)
            }
            Some(FieldValue::Bool(_)) => QuerySchema::new(FieldType::Boolean, key),
            Some(FieldValue::Number(_)) => QuerySchema::new(FieldType::Number, key),
            Some(FieldValue::Date(_)) => QuerySchema::new(FieldType::DateTime, key),
            Some(FieldValue::Array(items)) => {
                if items.iter().any(FieldValue::has_schema) {
                    QuerySchema::json_array(key)
                } else {
                    QuerySchema::new(FieldType::Array, key)
                }
            }
            Some(FieldValue::Object(_)) => QuerySchema::new(FieldType::Json, key),
        }
    }

    /// Union of the keys of every record in the array, in first-seen order.
    /// When a key shows up in several records the last one decides its type.
    fn nested_schema(items: &[FieldValue]) -> IndexMap<String, QuerySchema> {
        let mut schema = IndexMap::new();
        for item in items {
            if let FieldValue::Object(fields) = item {
                for (key, value) in fields {
                    schema.insert(key.clone(), Self::field_metadata(Some(value), key));
                }
            }
        }
        schema
    }
}

/// Distinct field names across all rows, in first-seen order.
pub fn collect_keys(rows: &[Row]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    for row in rows {
        for key in row.keys() {
            if seen.insert(key.as_str()) {
                keys.push(key.clone());
            }
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JsonFieldSubType;
    use serde_json::json;

    fn rows(value: Value) -> Vec<Row> {
        serde_json::from_value(value).unwrap()
    }

    fn field(inferred: &InferredSchema, key: &str) -> QuerySchema {
        match &inferred.schema[key] {
            SchemaEntry::Field(schema) => schema.clone(),
            other => panic!("expected full schema entry, got {:?}", other),
        }
    }

    #[test]
    fn test_scalar_types() {
        let rows = rows(json!([{
            "s": "text",
            "n": 4.5,
            "b": false,
            "d": "2024-03-01T10:00:00Z",
            "plain_date": "2024-03-01",
            "o": { "x": 1 },
            "z": null
        }]));
        let keys = collect_keys(&rows);
        let inferred = SchemaInferencer::infer(&rows, &keys);

        assert_eq!(field(&inferred, "s").field_type, FieldType::String);
        assert_eq!(field(&inferred, "n").field_type, FieldType::Number);
        assert_eq!(field(&inferred, "b").field_type, FieldType::Boolean);
        assert_eq!(field(&inferred, "d").field_type, FieldType::DateTime);
        assert_eq!(field(&inferred, "plain_date").field_type, FieldType::String);
        assert_eq!(field(&inferred, "o").field_type, FieldType::Json);
        assert_eq!(field(&inferred, "z"), QuerySchema::new(FieldType::String, "z"));
        assert!(inferred.nested_schema_fields.is_empty());
    }

    #[test]
    fn test_nested_array_schema_is_union_of_elements() {
        let rows = rows(json!([{ "a": [{ "x": 1 }, { "y": "s" }] }]));
        let inferred = SchemaInferencer::infer(&rows, &["a".to_string()]);

        let a = field(&inferred, "a");
        assert_eq!(a.field_type, FieldType::Json);
        assert_eq!(a.subtype, Some(JsonFieldSubType::Array));

        let nested = &inferred.nested_schema_fields["a"];
        assert_eq!(nested.len(), 2);
        assert_eq!(nested["x"], QuerySchema::new(FieldType::Number, "x"));
        assert_eq!(nested["y"], QuerySchema::new(FieldType::String, "y"));
    }

    #[test]
    fn test_nested_last_seen_value_wins_and_primitives_skipped() {
        let rows = rows(json!([{ "a": [1, { "v": 1 }, "x", { "v": true }] }]));
        let inferred = SchemaInferencer::infer(&rows, &["a".to_string()]);

        let nested = &inferred.nested_schema_fields["a"];
        assert_eq!(nested.len(), 1);
        assert_eq!(nested["v"].field_type, FieldType::Boolean);
    }

    #[test]
    fn test_scalar_array_has_no_nested_schema() {
        let rows = rows(json!([{ "a": [1, 2, 3] }]));
        let inferred = SchemaInferencer::infer(&rows, &["a".to_string()]);

        assert_eq!(field(&inferred, "a"), QuerySchema::new(FieldType::Array, "a"));
        assert!(!inferred.nested_schema_fields.contains_key("a"));
    }

    #[test]
    fn test_only_first_row_is_sampled() {
        let rows = rows(json!([{ "a": null }, { "a": 5, "b": true }]));
        let keys = collect_keys(&rows);
        let inferred = SchemaInferencer::infer(&rows, &keys);

        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(field(&inferred, "a").field_type, FieldType::String);
        // absent from the sampled row
        assert_eq!(field(&inferred, "b").field_type, FieldType::String);
    }

    #[test]
    fn test_every_key_appears_once() {
        let rows = rows(json!([{ "a": 1, "b": 2 }]));
        let keys = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        let inferred = SchemaInferencer::infer(&rows, &keys);

        assert_eq!(inferred.schema.len(), 2);
        assert!(inferred.schema.contains_key("a"));
        assert!(inferred.schema.contains_key("b"));
    }

    #[test]
    fn test_schema_follows_key_order() {
        let rows = rows(json!([{ "alpha": 1, "zeta": "z", "list": [{ "b": 1 }, { "a": 2, "b": 3 }] }]));
        let keys = vec!["zeta".to_string(), "list".to_string(), "alpha".to_string()];
        let inferred = SchemaInferencer::infer(&rows, &keys);

        let order: Vec<_> = inferred.schema.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["zeta", "list", "alpha"]);

        let nested: Vec<_> = inferred.nested_schema_fields["list"].keys().map(String::as_str).collect();
        assert_eq!(nested, vec!["b", "a"]);
    }

    #[test]
    fn test_empty_sample() {
        let inferred = SchemaInferencer::infer(&[], &["a".to_string()]);
        assert!(inferred.schema.is_empty());
        assert!(inferred.nested_schema_fields.is_empty());
    }

    #[test]
    fn test_inference_is_deterministic() {
        let rows = rows(json!([{ "a": [{ "x": 1 }], "b": "s", "c": [true] }]));
        let keys = collect_keys(&rows);
        assert_eq!(
            SchemaInferencer::infer(&rows, &keys),
            SchemaInferencer::infer(&rows, &keys)
        );
    }

    #[test]
    fn test_reconcile_prefers_existing_entries() {
        let rows = rows(json!([{ "a": 1, "b": "x" }]));
        let keys = collect_keys(&rows);
        let mut inferred = SchemaInferencer::infer(&rows, &keys);

        let existing: SchemaMap = serde_json::from_value(json!({
            "a": { "type": "string", "name": "Amount" },
            "gone": { "type": "number", "name": "gone" }
        }))
        .unwrap();
        inferred.reconcile(&existing);

        assert_eq!(inferred.schema["a"], existing["a"]);
        assert_eq!(field(&inferred, "b"), QuerySchema::new(FieldType::String, "b"));
        assert!(!inferred.schema.contains_key("gone"));
    }
}
