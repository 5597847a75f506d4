// Tool definitions and the registry that serves them

use crate::protocol::ToolSchema;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fmt;
use xbridge_core::{
    ArgValue, ArgumentSchema, Arguments, Category, Operation, ParamKind, ParamSpec, ToolError,
    ToolTier,
};

/// Turns validated arguments into the upstream operation to run
pub type BuildFn = fn(&Arguments) -> Result<Operation, ToolError>;

/// Turns an upstream payload into the fields the tool documents
pub type ShapeFn = fn(&Value, &Arguments) -> Value;

/// Static description of one tool
#[derive(Clone)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub schema: ArgumentSchema,
    /// Rate-limit bucket the tool draws from
    pub category: Category,
    pub tier: ToolTier,
    pub build: BuildFn,
    pub shape: ShapeFn,
}

impl fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("tier", &self.tier)
            .finish_non_exhaustive()
    }
}

impl ToolDefinition {
    /// JSON Schema of the arguments, as advertised by `tools/list`.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in self.schema.params() {
            properties.insert(param.name.to_string(), param_schema(param));
            if param.required {
                required.push(param.name);
            }
        }
        json_schema_object(Value::Object(properties), required)
    }

    pub fn to_schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name.to_string(),
            description: self.description.to_string(),
            input_schema: self.input_schema(),
        }
    }
}

fn param_schema(param: &ParamSpec) -> Value {
    let mut schema = match &param.kind {
        ParamKind::Id | ParamKind::Text { max_chars: None } => {
            json_schema_string(param.description)
        }
        ParamKind::Text {
            max_chars: Some(max),
        } => with(json_schema_string(param.description), "maxLength", json!(max)),
        ParamKind::Integer { min, max, .. } => {
            let schema = with(json_schema_integer(param.description), "minimum", json!(min));
            with(schema, "maximum", json!(max))
        }
        ParamKind::Enum(options) => with(json_schema_string(param.description), "enum", json!(options)),
        ParamKind::StringList {
            min_items,
            max_items,
            max_chars,
        } => {
            let items = match max_chars {
                Some(max) => json!({"type": "string", "maxLength": max}),
                None => json!({"type": "string"}),
            };
            let schema = with(json_schema_array(items, param.description), "minItems", json!(min_items));
            with(schema, "maxItems", json!(max_items))
        }
    };
    if let Some(default) = &param.default {
        schema = with(schema, "default", default.to_json());
    }
    schema
}

fn with(mut schema: Value, key: &str, value: Value) -> Value {
    if let Value::Object(map) = &mut schema {
        map.insert(key.to_string(), value);
    }
    schema
}

/// Fixed catalog of tools, keyed by name
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDefinition>,
    index: HashMap<&'static str, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every tool this server offers.
    pub fn with_catalog() -> Self {
        let mut registry = Self::new();
        for tool in super::catalog::tools() {
            registry.register(tool);
        }
        registry
    }

    /// Register a tool. A later definition with the same name replaces the
    /// earlier one.
    pub fn register(&mut self, tool: ToolDefinition) {
        match self.index.get(tool.name) {
            Some(&slot) => {
                tracing::warn!(tool = tool.name, "Replacing tool definition");
                self.tools[slot] = tool;
            }
            None => {
                self.index.insert(tool.name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    pub fn lookup(&self, name: &str) -> Result<&ToolDefinition, ToolError> {
        self.index
            .get(name)
            .map(|&slot| &self.tools[slot])
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }

    /// Tool schemas in registration order
    pub fn list(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(ToolDefinition::to_schema).collect()
    }

    pub fn definitions(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

// Helper functions for creating tool schemas

pub fn json_schema_object(properties: Value, required: Vec<&str>) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

pub fn json_schema_string(description: &str) -> Value {
    json!({
        "type": "string",
        "description": description
    })
}

pub fn json_schema_integer(description: &str) -> Value {
    json!({
        "type": "integer",
        "description": description
    })
}

pub fn json_schema_array(items: Value, description: &str) -> Value {
    json!({
        "type": "array",
        "items": items,
        "description": description
    })
}

/// Arguments as seen in logs; free text is reduced to its length.
pub fn redacted_arguments(args: &Arguments, schema: &ArgumentSchema) -> Value {
    let mut out = Map::new();
    for param in schema.params() {
        let Some(value) = args.get(param.name) else {
            continue;
        };
        let shown = match (&param.kind, value) {
            (ParamKind::Text { .. }, ArgValue::Str(s)) => json!(format!("<{} chars>", s.chars().count())),
            _ => value.to_json(),
        };
        out.insert(param.name.to_string(), shown);
    }
    Value::Object(out)
}
