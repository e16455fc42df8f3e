use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A value cached from a previous query result, reused as an input by
/// later queries on the same datasource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicVariable {
    pub name: String,
    pub query_id: String,
    /// Path into the source query's result, e.g. `{{ data[0].token }}`
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasourceConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dynamic_variables: Vec<DynamicVariable>,
    /// Integration specific settings (host, url, credentials...)
    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Datasource {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Integration type, e.g. `POSTGRES` or `REST`
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<DatasourceConfig>,
    /// Top level fields owned by other writers (type, plus, entities...).
    /// Kept so a read-modify-write does not drop them.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Datasource {
    pub fn dynamic_variables(&self) -> &[DynamicVariable] {
        self.config
            .as_ref()
            .map(|config| config.dynamic_variables.as_slice())
            .unwrap_or_default()
    }

    /// Copy without `config`, safe to hand to anything outside the request.
    pub fn without_config(&self) -> Datasource {
        Datasource {
            config: None,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_keeps_integration_settings() {
        let datasource: Datasource = serde_json::from_value(json!({
            "_id": "datasource_1",
            "source": "REST",
            "config": {
                "url": "https://api.example.com",
                "dynamicVariables": [
                    { "name": "token", "queryId": "query_1", "value": "{{ data[0].token }}" }
                ]
            }
        }))
        .unwrap();

        assert_eq!(datasource.dynamic_variables().len(), 1);
        assert_eq!(datasource.dynamic_variables()[0].query_id, "query_1");

        let value = serde_json::to_value(&datasource).unwrap();
        assert_eq!(value["config"]["url"], "https://api.example.com");
        assert_eq!(value["config"]["dynamicVariables"][0]["name"], "token");
    }

    #[test]
    fn test_without_config_strips_settings() {
        let datasource: Datasource = serde_json::from_value(json!({
            "_id": "datasource_1",
            "source": "POSTGRES",
            "config": { "password": "secret" }
        }))
        .unwrap();

        let stripped = datasource.without_config();
        assert!(stripped.config.is_none());
        assert_eq!(stripped.id, datasource.id);
        assert!(datasource.without_config().dynamic_variables().is_empty());
    }

    #[test]
    fn test_unknown_top_level_fields_are_kept() {
        let doc = json!({
            "_id": "datasource_1",
            "_rev": "3-abc",
            "type": "datasource",
            "source": "POSTGRES",
            "plus": true,
            "entities": { "users": { "primary": ["id"] } },
            "createdAt": "2024-01-01T00:00:00Z",
            "config": { "host": "h" }
        });

        let datasource: Datasource = serde_json::from_value(doc.clone()).unwrap();
        assert_eq!(datasource.extra["plus"], true);
        assert!(!datasource.extra.contains_key("_id"));

        assert_eq!(serde_json::to_value(&datasource).unwrap(), doc);
    }
}
