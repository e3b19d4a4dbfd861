use serde_json::Value;

use crate::types::{McpError, PropertyRule, Tool};

impl Tool {
    /// Validate arguments against the tool's input schema metadata.
    ///
    /// String lengths are counted in characters, not bytes.
    pub fn validate_arguments(&self, args: &Value) -> Result<(), McpError> {
        let empty = serde_json::Map::new();
        let obj = match args {
            Value::Object(map) => map,
            Value::Null => &empty,
            _ => return Err(McpError::Validation("arguments must be an object".into())),
        };
        let meta = &self.schema_meta;

        for field in &meta.required {
            if !obj.contains_key(field) {
                return Err(McpError::Validation(format!(
                    "missing required field \"{}\"",
                    field
                )));
            }
        }

        for (field, value) in obj {
            if let Some(rule) = meta.properties.get(field) {
                check_property(field, rule, value)?;
            }
        }

        Ok(())
    }
}

fn check_property(field: &str, rule: &PropertyRule, value: &Value) -> Result<(), McpError> {
    if rule.kind.as_deref() != Some("string") {
        return Ok(());
    }

    let Some(s) = value.as_str() else {
        return Err(McpError::Validation(format!(
            "field \"{}\" must be a string",
            field
        )));
    };

    let len = s.chars().count();
    if let Some(min) = rule.min_length {
        if len < min {
            return Err(McpError::Validation(format!(
                "field \"{}\" must contain at least {} character(s)",
                field, min
            )));
        }
    }
    if let Some(max) = rule.max_length {
        if len > max {
            return Err(McpError::Validation(format!(
                "field \"{}\" must contain at most {} character(s)",
                field, max
            )));
        }
    }

    Ok(())
}
