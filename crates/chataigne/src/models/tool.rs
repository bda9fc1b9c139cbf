use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::errors::{ToolError, ToolResult};

/// One declared parameter of a tool.
///
/// `schema` is the JSON-schema fragment for the parameter type, e.g.
/// `{"type": "integer"}`. A parameter with a default value is optional;
/// all others are required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParam {
    pub name: String,
    pub schema: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ToolParam {
    pub fn required<S: Into<String>>(name: S, schema: Value) -> Self {
        ToolParam {
            name: name.into(),
            schema,
            default: None,
        }
    }

    pub fn optional<S: Into<String>>(name: S, schema: Value, default: Value) -> Self {
        ToolParam {
            name: name.into(),
            schema,
            default: Some(default),
        }
    }
}

/// A named, schema-described callable exposable to an LLM for function
/// calling. Immutable after construction except for `enabled`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParam>,
    pub enabled: bool,
}

impl Tool {
    /// Create a new tool, validating its declaration. The description is
    /// shown to the LLM and must not be empty; every parameter must carry a
    /// typed schema and a unique name.
    pub fn new<N, D>(name: N, description: D, parameters: Vec<ToolParam>) -> ToolResult<Self>
    where
        N: Into<String>,
        D: Into<String>,
    {
        let name = name.into();
        let description = description.into();

        if description.trim().is_empty() {
            return Err(ToolError::Schema(format!(
                "Tool '{}' must have a description explaining how to use it",
                name
            )));
        }

        {
            let mut seen = std::collections::HashSet::new();
            for param in &parameters {
                if !seen.insert(param.name.as_str()) {
                    return Err(ToolError::Schema(format!(
                        "Parameter '{}' of tool '{}' is declared twice",
                        param.name, name
                    )));
                }
                let typed = param
                    .schema
                    .as_object()
                    .is_some_and(|schema| schema.contains_key("type"));
                if !typed {
                    return Err(ToolError::Schema(format!(
                        "Parameter '{}' of tool '{}' has no type",
                        param.name, name
                    )));
                }
            }
        }

        Ok(Tool {
            name,
            description,
            parameters,
            enabled: true,
        })
    }

    /// Names of the parameters without a default, in declaration order.
    pub fn required(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|param| param.default.is_none())
            .map(|param| param.name.as_str())
            .collect()
    }

    /// The `{"type": "object", ...}` schema sent to both providers.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.parameters {
            properties.insert(param.name.clone(), param.schema.clone());
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": self.required(),
        })
    }

    /// Validate call arguments against the declaration: every required
    /// parameter must be supplied, declared defaults fill in for absent
    /// optional ones, and unknown keys are rejected.
    pub fn resolve_arguments(&self, arguments: &Map<String, Value>) -> ToolResult<Map<String, Value>> {
        for key in arguments.keys() {
            if !self.parameters.iter().any(|param| &param.name == key) {
                return Err(ToolError::InvalidParameters(format!(
                    "Tool '{}' has no parameter '{}'",
                    self.name, key
                )));
            }
        }

        let mut resolved = Map::new();
        for param in &self.parameters {
            match arguments.get(&param.name) {
                Some(value) => {
                    resolved.insert(param.name.clone(), value.clone());
                }
                None => match &param.default {
                    Some(default) => {
                        resolved.insert(param.name.clone(), default.clone());
                    }
                    None => {
                        return Err(ToolError::InvalidParameters(format!(
                            "Missing required parameter '{}' of tool '{}'",
                            param.name, self.name
                        )));
                    }
                },
            }
        }

        Ok(resolved)
    }

    pub fn to_openai(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.input_schema(),
            },
            "strict": true,
        })
    }

    pub fn to_anthropic(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "input_schema": self.input_schema(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_tool() -> Tool {
        Tool::new(
            "custom_add",
            "Add two numbers",
            vec![
                ToolParam::required("a", json!({"type": "integer"})),
                ToolParam::optional("b", json!({"type": "number"}), json!(2)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_schema_from_declaration() {
        let tool = add_tool();
        let schema = tool.input_schema();

        assert_eq!(schema["required"], json!(["a"]));
        let properties: Vec<&String> = schema["properties"].as_object().unwrap().keys().collect();
        assert_eq!(properties, ["a", "b"]);
    }

    #[test]
    fn test_resolve_arguments_fills_defaults() {
        let tool = add_tool();
        let mut args = Map::new();
        args.insert("a".to_string(), json!(1));

        let resolved = tool.resolve_arguments(&args).unwrap();
        assert_eq!(resolved["a"], json!(1));
        assert_eq!(resolved["b"], json!(2));
    }

    #[test]
    fn test_resolve_arguments_missing_required() {
        let tool = add_tool();
        let result = tool.resolve_arguments(&Map::new());
        assert!(matches!(result, Err(ToolError::InvalidParameters(_))));
    }

    #[test]
    fn test_resolve_arguments_unknown_key() {
        let tool = add_tool();
        let mut args = Map::new();
        args.insert("a".to_string(), json!(1));
        args.insert("c".to_string(), json!(3));

        let result = tool.resolve_arguments(&args);
        assert!(matches!(result, Err(ToolError::InvalidParameters(_))));
    }

    #[test]
    fn test_empty_description_is_rejected() {
        let result = Tool::new("nameless", "  ", vec![]);
        assert!(matches!(result, Err(ToolError::Schema(_))));
    }

    #[test]
    fn test_untyped_parameter_is_rejected() {
        let result = Tool::new(
            "untyped",
            "A tool with a bad parameter",
            vec![ToolParam::required("a", json!({}))],
        );
        assert!(matches!(result, Err(ToolError::Schema(_))));
    }

    #[test]
    fn test_duplicate_parameter_is_rejected() {
        let result = Tool::new(
            "doubled",
            "A tool with a repeated parameter",
            vec![
                ToolParam::required("a", json!({"type": "integer"})),
                ToolParam::required("a", json!({"type": "string"})),
            ],
        );
        assert!(matches!(result, Err(ToolError::Schema(_))));
    }

    #[test]
    fn test_to_openai_shape() {
        let tool = add_tool();
        let spec = tool.to_openai();
        assert_eq!(spec["type"], "function");
        assert_eq!(spec["function"]["name"], "custom_add");
        assert_eq!(spec["function"]["parameters"]["required"], json!(["a"]));
    }

    #[test]
    fn test_to_anthropic_shape() {
        let tool = add_tool();
        let spec = tool.to_anthropic();
        assert_eq!(spec["name"], "custom_add");
        assert_eq!(spec["input_schema"]["type"], "object");
    }
}
