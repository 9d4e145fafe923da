use serde_json::{Map, Value, json};

/// JSON schema types supported for tool parameters.
#[derive(Debug, Clone)]
pub enum ToolParamType {
    Integer,
    Number,
    String,
    Boolean,
    /// Nested object; unknown properties are rejected.
    Object(Vec<ToolParam>),
    /// Homogeneous array with an optional description for its items.
    Array {
        items: Box<ToolParamType>,
        item_description: Option<String>,
    },
}

impl ToolParamType {
    pub fn array_of(items: ToolParamType, item_description: Option<&str>) -> Self {
        Self::Array {
            items: Box::new(items),
            item_description: item_description.map(str::to_string),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            ToolParamType::Integer => "integer",
            ToolParamType::Number => "number",
            ToolParamType::String => "string",
            ToolParamType::Boolean => "boolean",
            ToolParamType::Object(_) => "object",
            ToolParamType::Array { .. } => "array",
        }
    }

    fn to_schema(&self, description: Option<&str>) -> Value {
        let mut schema = match self {
            ToolParamType::Object(params) => object_schema(params),
            ToolParamType::Array {
                items,
                item_description,
            } => {
                let mut map = Map::new();
                map.insert("type".to_string(), json!("array"));
                map.insert(
                    "items".to_string(),
                    items.to_schema(item_description.as_deref()),
                );
                map
            }
            scalar => {
                let mut map = Map::new();
                map.insert("type".to_string(), json!(scalar.type_name()));
                map
            }
        };
        if let Some(description) = description {
            schema.insert("description".to_string(), json!(description));
        }
        Value::Object(schema)
    }
}

/// One named parameter inside an object schema.
#[derive(Debug, Clone)]
pub struct ToolParam {
    pub name: String,
    pub description: Option<String>,
    pub kind: ToolParamType,
    pub required: bool,
}

impl ToolParam {
    pub fn new(
        name: impl Into<String>,
        kind: ToolParamType,
        required: bool,
        description: Option<&str>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.map(str::to_string),
            kind,
            required,
        }
    }

    /// Shorthand for a required parameter.
    pub fn required(name: impl Into<String>, kind: ToolParamType, description: &str) -> Self {
        Self::new(name, kind, true, Some(description))
    }
}

fn object_schema(params: &[ToolParam]) -> Map<String, Value> {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for param in params {
        properties.insert(
            param.name.clone(),
            param.kind.to_schema(param.description.as_deref()),
        );
        if param.required {
            required.push(Value::String(param.name.clone()));
        }
    }

    let mut schema = Map::new();
    schema.insert("type".to_string(), json!("object"));
    schema.insert("properties".to_string(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".to_string(), Value::Array(required));
    }
    schema.insert("additionalProperties".to_string(), Value::Bool(false));
    schema
}

/// Declaration of a tool the model may call.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub params: Vec<ToolParam>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, param: ToolParam) -> Self {
        self.params.push(param);
        self
    }

    /// JSON schema of the tool input; the root is always an object.
    pub fn input_schema(&self) -> Value {
        Value::Object(object_schema(&self.params))
    }
}

/// How the model is allowed to pick among declared tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolChoice {
    Auto,
    Any,
    /// Force one named tool.
    Tool(String),
}

/// Tools offered with a request.
#[derive(Debug, Clone)]
pub struct ToolConfig {
    /// Declared tools, in request order.
    pub tools: Vec<ToolSpec>,
    /// How the model may pick among `tools`.
    pub choice: ToolChoice,
}

impl ToolConfig {
    /// Declares a single tool and forces the model to call it.
    pub fn forced(tool: ToolSpec) -> Self {
        let choice = ToolChoice::Tool(tool.name.clone());
        Self {
            tools: vec![tool],
            choice,
        }
    }

    pub fn forced_tool(&self) -> Option<&str> {
        match &self.choice {
            ToolChoice::Tool(name) => Some(name),
            ToolChoice::Auto | ToolChoice::Any => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_schema_rejects_unknown_properties() {
        let spec = ToolSpec::new("lookup", "Look something up").with_param(ToolParam::required(
            "items",
            ToolParamType::array_of(
                ToolParamType::Object(vec![ToolParam::required(
                    "name",
                    ToolParamType::String,
                    "Item name",
                )]),
                None,
            ),
            "Matching items",
        ));

        let schema = spec.input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["items"]));
        assert_eq!(schema["additionalProperties"], json!(false));
        let items = &schema["properties"]["items"];
        assert_eq!(items["type"], "array");
        assert_eq!(items["description"], "Matching items");
        assert_eq!(items["items"]["additionalProperties"], json!(false));
        assert_eq!(items["items"]["properties"]["name"]["type"], "string");
    }

    #[test]
    fn optional_params_are_not_required() {
        let spec = ToolSpec::new("t", "d").with_param(ToolParam::new(
            "limit",
            ToolParamType::Integer,
            false,
            None,
        ));
        let schema = spec.input_schema();
        assert!(schema.get("required").is_none());
        assert!(schema["properties"]["limit"].get("description").is_none());
    }

    #[test]
    fn forced_config_names_the_tool() {
        let config = ToolConfig::forced(ToolSpec::new("return_x", "d"));
        assert_eq!(config.choice, ToolChoice::Tool("return_x".to_string()));
        assert_eq!(config.forced_tool(), Some("return_x"));
    }
}
