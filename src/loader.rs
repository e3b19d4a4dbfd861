use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::types::{McpError, PropertyRule, SchemaMeta, Tool};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolDefinition {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default = "empty_object_schema")]
    input_schema: Value,
}

fn empty_object_schema() -> Value {
    serde_json::json!({"type": "object", "properties": {}})
}

/// Parse tool definitions from raw JSON bytes.
pub fn parse_tools(data: &[u8]) -> Result<Vec<Tool>, McpError> {
    let defs: Vec<ToolDefinition> = serde_json::from_slice(data)?;

    Ok(defs
        .into_iter()
        .map(|def| {
            let schema_meta = parse_schema_meta(&def.input_schema);
            Tool {
                name: def.name,
                description: def.description,
                input_schema: def.input_schema,
                schema_meta,
            }
        })
        .collect())
}

/// Extract validation metadata from a JSON Schema object.
fn parse_schema_meta(schema: &Value) -> SchemaMeta {
    let mut meta = SchemaMeta::default();

    if let Some(arr) = schema.get("required").and_then(|v| v.as_array()) {
        meta.required = arr
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect();
    }

    if let Some(obj) = schema.get("properties").and_then(|v| v.as_object()) {
        let mut props = HashMap::with_capacity(obj.len());
        for (key, prop) in obj {
            props.insert(
                key.clone(),
                PropertyRule {
                    kind: prop.get("type").and_then(|v| v.as_str()).map(String::from),
                    min_length: length_bound(prop, "minLength"),
                    max_length: length_bound(prop, "maxLength"),
                },
            );
        }
        meta.properties = props;
    }

    meta
}

fn length_bound(prop: &Value, key: &str) -> Option<usize> {
    prop.get(key)
        .and_then(|v| v.as_u64())
        .and_then(|n| usize::try_from(n).ok())
}
