use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Flattened JSON-schema surface advertised to the reasoning service.
///
/// Capability parameters are plain structs, so the derived schema is reduced
/// to the `properties` / `required` / `type` triple the chat-completions
/// function-call format expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSchema {
    pub properties: serde_json::Map<String, Value>,
    pub required: Vec<String>,
    #[serde(rename = "type")]
    pub schema_type: String,
}

impl From<schemars::Schema> for InputSchema {
    fn from(schema: schemars::Schema) -> Self {
        let value = serde_json::to_value(&schema).unwrap_or(Value::Null);
        let obj = value.as_object();

        let properties = obj
            .and_then(|o| o.get("properties"))
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default();

        let required = obj
            .and_then(|o| o.get("required"))
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let schema_type = obj
            .and_then(|o| o.get("type"))
            .and_then(|v| v.as_str())
            .unwrap_or("object")
            .to_string();

        Self {
            properties,
            required,
            schema_type,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
}

/// One capability invocation requested by the reasoning service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub parameters: Value,
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::InputSchema;
    use schemars::{JsonSchema, schema_for};
    use serde::Deserialize;

    #[derive(Debug, Deserialize, JsonSchema)]
    #[allow(dead_code)]
    struct AssignParams {
        trip_id: String,
        vehicle_id: String,
        driver_id: Option<String>,
    }

    #[test]
    fn derived_schema_flattens_properties_and_required() {
        let schema = schema_for!(AssignParams);
        let input: InputSchema = schema.into();

        assert_eq!(input.schema_type, "object");
        assert!(input.properties.contains_key("trip_id"));
        assert!(input.properties.contains_key("vehicle_id"));
        assert!(input.properties.contains_key("driver_id"));
        assert!(input.required.contains(&"trip_id".to_string()));
        assert!(input.required.contains(&"vehicle_id".to_string()));
        assert!(!input.required.contains(&"driver_id".to_string()));
    }
}
