// Per-tool argument schemas and validation

use crate::error::{FieldError, ToolError};
use serde_json::Value;
use std::collections::BTreeMap;

/// Longest identifier accepted (user ids, tweet ids, screen names)
pub const MAX_ID_CHARS: usize = 64;

/// Shape and constraints of a single parameter
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    /// Non-empty identifier made of ASCII letters, digits and underscores
    Id,
    /// Free text, non-empty after trimming
    Text { max_chars: Option<usize> },
    /// Integer within an inclusive range; out-of-range values are rejected
    /// unless `clamp` is set
    Integer { min: i64, max: i64, clamp: bool },
    /// One of a fixed set of strings (matched case-insensitively)
    Enum(&'static [&'static str]),
    /// List of non-empty strings
    StringList {
        min_items: usize,
        max_items: usize,
        max_chars: Option<usize>,
    },
}

impl ParamKind {
    pub fn json_type(&self) -> &'static str {
        match self {
            ParamKind::Id | ParamKind::Text { .. } | ParamKind::Enum(_) => "string",
            ParamKind::Integer { .. } => "integer",
            ParamKind::StringList { .. } => "array",
        }
    }
}

/// A validated argument value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Str(String),
    Int(i64),
    List(Vec<String>),
}

impl ArgValue {
    pub fn to_json(&self) -> Value {
        match self {
            ArgValue::Str(s) => Value::from(s.as_str()),
            ArgValue::Int(i) => Value::from(*i),
            ArgValue::List(items) => Value::from(items.clone()),
        }
    }
}

/// Declaration of one tool parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<ArgValue>,
    pub aliases: &'static [&'static str],
}

impl ParamSpec {
    fn new(name: &'static str, description: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            description,
            kind,
            required: true,
            default: None,
            aliases: &[],
        }
    }

    pub fn id(name: &'static str, description: &'static str) -> Self {
        Self::new(name, description, ParamKind::Id)
    }

    pub fn text(name: &'static str, description: &'static str, max_chars: Option<usize>) -> Self {
        Self::new(name, description, ParamKind::Text { max_chars })
    }

    pub fn integer(name: &'static str, description: &'static str, min: i64, max: i64) -> Self {
        Self::new(
            name,
            description,
            ParamKind::Integer {
                min,
                max,
                clamp: false,
            },
        )
    }

    pub fn choice(
        name: &'static str,
        description: &'static str,
        options: &'static [&'static str],
    ) -> Self {
        Self::new(name, description, ParamKind::Enum(options))
    }

    pub fn list(
        name: &'static str,
        description: &'static str,
        min_items: usize,
        max_items: usize,
        max_chars: Option<usize>,
    ) -> Self {
        Self::new(
            name,
            description,
            ParamKind::StringList {
                min_items,
                max_items,
                max_chars,
            },
        )
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn default_int(mut self, value: i64) -> Self {
        self.required = false;
        self.default = Some(ArgValue::Int(value));
        self
    }

    pub fn default_str(mut self, value: &str) -> Self {
        self.required = false;
        self.default = Some(ArgValue::Str(value.to_string()));
        self
    }

    /// Pull out-of-range integers back into range instead of rejecting them
    pub fn clamped(mut self) -> Self {
        if let ParamKind::Integer { clamp, .. } = &mut self.kind {
            *clamp = true;
        }
        self
    }

    pub fn aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }

    fn lookup<'v>(&self, args: &'v serde_json::Map<String, Value>) -> Option<&'v Value> {
        std::iter::once(self.name)
            .chain(self.aliases.iter().copied())
            .filter_map(|key| args.get(key))
            .find(|v| !v.is_null())
    }

    fn check(&self, value: &Value) -> Result<ArgValue, String> {
        match &self.kind {
            ParamKind::Id => check_id(value),
            ParamKind::Text { max_chars } => {
                let text = value.as_str().ok_or("must be a string")?;
                if text.trim().is_empty() {
                    return Err("must not be empty".into());
                }
                check_length(text, *max_chars)?;
                Ok(ArgValue::Str(text.to_string()))
            }
            ParamKind::Integer { min, max, clamp } => {
                let n = as_integer(value).ok_or("must be an integer")?;
                if n < *min || n > *max {
                    if *clamp {
                        let clamped = n.clamp(*min, *max);
                        tracing::info!(
                            param = self.name,
                            requested = n,
                            used = clamped,
                            "Clamped out-of-range argument"
                        );
                        return Ok(ArgValue::Int(clamped));
                    }
                    return Err(format!("must be between {} and {}", min, max));
                }
                Ok(ArgValue::Int(n))
            }
            ParamKind::Enum(options) => {
                let raw = value.as_str().ok_or("must be a string")?;
                options
                    .iter()
                    .find(|o| o.eq_ignore_ascii_case(raw.trim()))
                    .map(|o| ArgValue::Str(o.to_string()))
                    .ok_or_else(|| format!("must be one of: {}", options.join(", ")))
            }
            ParamKind::StringList {
                min_items,
                max_items,
                max_chars,
            } => {
                let items = value.as_array().ok_or("must be an array of strings")?;
                if items.len() < *min_items || items.len() > *max_items {
                    return Err(format!(
                        "must contain between {} and {} items",
                        min_items, max_items
                    ));
                }
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let s = item
                        .as_str()
                        .ok_or_else(|| format!("item {} must be a string", i))?;
                    if s.trim().is_empty() {
                        return Err(format!("item {} must not be empty", i));
                    }
                    check_length(s, *max_chars).map_err(|e| format!("item {} {}", i, e))?;
                    out.push(s.to_string());
                }
                Ok(ArgValue::List(out))
            }
        }
    }
}

fn check_id(value: &Value) -> Result<ArgValue, String> {
    let id = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n
            .as_u64()
            .map(|n| n.to_string())
            .ok_or("must be a non-negative integer or string identifier")?,
        _ => return Err("must be a string identifier".into()),
    };
    if id.is_empty() {
        return Err("must not be empty".into());
    }
    if id.chars().count() > MAX_ID_CHARS {
        return Err(format!("must be at most {} characters", MAX_ID_CHARS));
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err("may only contain letters, digits and underscores".into());
    }
    Ok(ArgValue::Str(id))
}

fn check_length(text: &str, max_chars: Option<usize>) -> Result<(), String> {
    match max_chars {
        Some(max) if text.chars().count() > max => {
            Err(format!("must be at most {} characters", max))
        }
        _ => Ok(()),
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Ordered parameter list for one tool
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgumentSchema {
    params: Vec<ParamSpec>,
}

impl ArgumentSchema {
    pub fn new(params: Vec<ParamSpec>) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Validate raw JSON arguments; `null` counts as an empty object.
    pub fn validate(&self, raw: &Value) -> Result<Arguments, ToolError> {
        let empty = serde_json::Map::new();
        let args = match raw {
            Value::Object(map) => map,
            Value::Null => &empty,
            _ => return Err(ToolError::invalid("arguments", "must be a JSON object")),
        };

        let mut values = BTreeMap::new();
        let mut errors = Vec::new();

        for spec in &self.params {
            match spec.lookup(args) {
                Some(value) => match spec.check(value) {
                    Ok(v) => {
                        values.insert(spec.name, v);
                    }
                    Err(problem) => errors.push(FieldError::new(spec.name, problem)),
                },
                None if spec.required => {
                    errors.push(FieldError::new(spec.name, "is required"));
                }
                None => {
                    if let Some(default) = &spec.default {
                        values.insert(spec.name, default.clone());
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(Arguments { values })
        } else {
            Err(ToolError::InvalidArguments(errors))
        }
    }
}

/// Arguments that passed validation, keyed by canonical parameter name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Arguments {
    values: BTreeMap<&'static str, ArgValue>,
}

impl Arguments {
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ArgValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ArgValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn list(&self, name: &str) -> Option<&[String]> {
        match self.values.get(name) {
            Some(ArgValue::List(items)) => Some(items),
            _ => None,
        }
    }

    pub fn required_str(&self, name: &str) -> Result<&str, ToolError> {
        self.str(name)
            .ok_or_else(|| ToolError::invalid(name, "is required"))
    }

    /// Integer argument as a page size; non-positive values read as absent
    pub fn count(&self, name: &str) -> Option<u32> {
        self.int(name).and_then(|i| u32::try_from(i).ok()).filter(|n| *n > 0)
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_json()))
                .collect(),
        )
    }
}
