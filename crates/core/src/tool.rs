//! Tool trait and registry: the abstraction over agent capabilities.
//!
//! A tool declares a fixed parameter schema ([`ToolSpec`]) and an async
//! handler. The registry keeps tools in registration order so prompts and
//! function-calling definitions are deterministic.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{RegistryError, ToolError};
use crate::provider::ToolDefinition;

/// Decoded tool arguments: a JSON object with string keys.
pub type Arguments = serde_json::Map<String, serde_json::Value>;

/// Primitive parameter types a tool can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Integer,
    Number,
    String,
    Boolean,
}

impl ParamType {
    /// JSON Schema type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Number => "number",
            Self::String => "string",
            Self::Boolean => "boolean",
        }
    }

    /// Whether a decoded JSON value has this type. No coercion:
    /// `"5"` is not an integer, `5.5` is not an integer.
    pub fn accepts(&self, value: &serde_json::Value) -> bool {
        match self {
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::String => value.is_string(),
            Self::Boolean => value.is_boolean(),
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ParamType,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

fn default_required() -> bool {
    true
}

impl ParamSpec {
    /// A required parameter.
    pub fn required(
        name: impl Into<String>,
        ty: ParamType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
            description: description.into(),
        }
    }

    /// An optional parameter.
    pub fn optional(
        name: impl Into<String>,
        ty: ParamType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, ty, description)
        }
    }
}

/// Name, description and parameter schema of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
}

impl ToolSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        params: Vec<ParamSpec>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params,
        }
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// JSON Schema describing the parameters (for native function calling).
    pub fn json_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        for p in &self.params {
            properties.insert(
                p.name.clone(),
                serde_json::json!({ "type": p.ty.as_str(), "description": p.description }),
            );
        }
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// Compact signature for text prompts, e.g. `add(x: integer, y: integer)`.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| {
                let opt = if p.required { "" } else { "?" };
                format!("{}{}: {}", p.name, opt, p.ty)
            })
            .collect();
        format!("{}({})", self.name, params.join(", "))
    }
}

/// What a tool handler produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "output", rename_all = "snake_case")]
pub enum ToolOutput {
    /// The operation succeeded with this result.
    Value(String),
    /// The operation ran but nothing matched. A valid outcome, not a fault.
    NotFound(String),
}

impl ToolOutput {
    pub fn text(&self) -> &str {
        match self {
            Self::Value(s) | Self::NotFound(s) => s,
        }
    }
}

/// The core Tool trait.
///
/// Handlers receive arguments already validated against [`Tool::spec`],
/// so they may index required parameters without re-checking types.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name, description and parameter schema.
    fn spec(&self) -> &ToolSpec;

    /// Execute the tool with validated arguments.
    async fn execute(&self, arguments: &Arguments) -> std::result::Result<ToolOutput, ToolError>;

    fn name(&self) -> &str {
        &self.spec().name
    }

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        let spec = self.spec();
        ToolDefinition {
            name: spec.name.clone(),
            description: spec.description.clone(),
            parameters: spec.json_schema(),
        }
    }
}

/// Result of a case-insensitive name lookup.
pub enum Resolution<'a> {
    Unique(&'a dyn Tool),
    /// More than one registered name differs only by case.
    Ambiguous,
    Missing,
}

/// A registry of available tools, in registration order.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a tool. Fails if the name is already taken.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> std::result::Result<(), RegistryError> {
        let name = tool.name().to_string();
        let valid = |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-';
        if name.is_empty() || !name.chars().all(valid) {
            return Err(RegistryError::InvalidName(name));
        }
        if self.index.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        tracing::debug!(tool = %name, "Registered tool");
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Get a tool by exact, case-sensitive name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.index.get(name).map(|&i| self.tools[i].as_ref())
    }

    /// Look a name up ignoring ASCII case.
    pub fn resolve_ignore_case(&self, name: &str) -> Resolution<'_> {
        let mut found = self
            .tools
            .iter()
            .filter(|t| t.name().eq_ignore_ascii_case(name));
        match (found.next(), found.next()) {
            (Some(tool), None) => Resolution::Unique(tool.as_ref()),
            (Some(_), Some(_)) => Resolution::Ambiguous,
            (None, _) => Resolution::Missing,
        }
    }

    /// Iterate tools in registration order.
    pub fn tools(&self) -> impl Iterator<Item = &dyn Tool> {
        self.tools.iter().map(|t| t.as_ref())
    }

    /// Get all tool definitions (for sending to the LLM).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
